use std::error::Error as StdError;

use thiserror::Error;

/// Errors raised by gridsim components.
///
/// Construction and initialization failures (`InvalidGrid`, `SchemaMismatch`)
/// surface before any numerical work happens. Numerical failures from a
/// backend propagate unchanged and abort the current run.
#[derive(Debug, Error)]
pub enum Error {
    /// The time grid is not a dense column of non-decreasing values.
    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

    /// Declared shapes or sparsity patterns are structurally incompatible.
    #[error("schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    /// No plugin is registered under the requested name.
    #[error("no {family} plugin registered under \"{name}\"")]
    PluginNotFound { family: &'static str, name: String },

    /// A registered plugin could not be resolved.
    #[error("failed to load {family} plugin \"{name}\": {reason}")]
    PluginLoad {
        family: &'static str,
        name: String,
        reason: String,
    },

    /// A backend-specific numerical failure.
    #[error("numerical error: {reason}")]
    Numerical { reason: String },

    /// A post-condition inside gridsim itself failed.
    ///
    /// This signals a defect, not a user input problem, and is never retried.
    #[error("internal invariant violated: {reason}")]
    InternalInvariantViolation { reason: String },

    /// Slot buffers were accessed before `init()`.
    #[error("{what} is not initialized")]
    NotInitialized { what: String },

    /// An operation was requested in a phase that does not permit it.
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    /// An integrator was asked to step to a time earlier than its clock.
    #[error("cannot integrate backward from t = {current} to t = {target}")]
    BackwardStep { current: f64, target: f64 },

    /// An option is unknown, has the wrong type, or an invalid value.
    #[error("invalid option \"{name}\": {reason}")]
    InvalidOption { name: String, reason: String },

    /// A slot name or index does not exist in the schema.
    #[error("unknown slot {slot} in schema \"{schema}\"")]
    UnknownSlot { schema: String, slot: String },

    /// A user-supplied callback failed.
    #[error("callback failed")]
    Callback(#[source] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Creates a [`Error::Numerical`] from a message.
    pub fn numerical(reason: impl Into<String>) -> Self {
        Self::Numerical {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::SchemaMismatch`] from a message.
    pub fn schema_mismatch(reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            reason: reason.into(),
        }
    }

    /// Creates a [`Error::InternalInvariantViolation`] from a message.
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            reason: reason.into(),
        }
    }

    /// Wraps an error returned by a user-supplied callback.
    pub fn callback<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Callback(Box::new(err))
    }

    /// Returns `true` for defects that must not be treated as recoverable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInvariantViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invariant_violations_are_fatal() {
        assert!(Error::invariant("buffer underfilled").is_fatal());
        assert!(!Error::numerical("diverged").is_fatal());
        assert!(!Error::schema_mismatch("bad shape").is_fatal());
    }

    #[test]
    fn messages_name_the_plugin() {
        let err = Error::PluginNotFound {
            family: "integrator",
            name: "cvodes".into(),
        };
        assert_eq!(
            err.to_string(),
            "no integrator plugin registered under \"cvodes\""
        );
    }
}
