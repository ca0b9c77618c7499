use gridsim_core::{Error, Options};
use thiserror::Error;

/// Configuration shared by the fixed-step integrators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    t0: f64,
    tf: f64,
    intervals: usize,
}

/// Errors that can occur when validating an integrator config.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("t0 and tf must be finite, got [{t0}, {tf}]")]
    NonFinite { t0: f64, tf: f64 },

    #[error("tf = {tf} precedes t0 = {t0}")]
    Reversed { t0: f64, tf: f64 },

    #[error("intervals must be at least 1")]
    NoIntervals,
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        let name = match err {
            ConfigError::NonFinite { .. } | ConfigError::Reversed { .. } => "t0/tf",
            ConfigError::NoIntervals => "intervals",
        };
        Error::InvalidOption {
            name: name.into(),
            reason: err.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            t0: 0.0,
            tf: 1.0,
            intervals: 20,
        }
    }
}

impl Config {
    /// Option keys understood by [`Config::from_options`].
    pub const KEYS: [&'static str; 3] = ["t0", "tf", "intervals"];

    /// Creates a validated config.
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is not finite, is reversed, or
    /// `intervals` is zero.
    pub fn new(t0: f64, tf: f64, intervals: usize) -> Result<Self, ConfigError> {
        if !t0.is_finite() || !tf.is_finite() {
            return Err(ConfigError::NonFinite { t0, tf });
        }
        if tf < t0 {
            return Err(ConfigError::Reversed { t0, tf });
        }
        if intervals == 0 {
            return Err(ConfigError::NoIntervals);
        }
        Ok(Self { t0, tf, intervals })
    }

    /// Reads `t0`, `tf` and `intervals` from `options`, defaulting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] for unknown keys, values of the wrong
    /// type, or an invalid combination.
    pub fn from_options(options: &Options) -> Result<Self, Error> {
        options.ensure_known(&Self::KEYS)?;
        let default = Self::default();
        let t0 = options.real("t0")?.unwrap_or(default.t0);
        let tf = options.real("tf")?.unwrap_or(default.tf.max(t0));
        let intervals = options.count("intervals")?.unwrap_or(default.intervals);
        Ok(Self::new(t0, tf, intervals)?)
    }

    /// Returns a copy with the interval replaced.
    ///
    /// # Errors
    ///
    /// As [`Config::new`].
    pub fn with_interval(self, t0: f64, tf: f64) -> Result<Self, ConfigError> {
        Self::new(t0, tf, self.intervals)
    }

    #[must_use]
    pub fn t0(&self) -> f64 {
        self.t0
    }

    #[must_use]
    pub fn tf(&self) -> f64 {
        self.tf
    }

    #[must_use]
    pub fn intervals(&self) -> usize {
        self.intervals
    }

    /// The nominal step size, `(tf - t0) / intervals`.
    #[must_use]
    pub fn max_step(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let intervals = self.intervals as f64;
        (self.tf - self.t0) / intervals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_step() {
        let config = Config::default();
        assert_eq!(config.intervals(), 20);
        assert!((config.max_step() - 0.05).abs() < 1e-15);
    }

    #[test]
    fn reads_options() {
        let options = Options::new().with("t0", 2.0).with("intervals", 4_i64);
        let config = Config::from_options(&options).unwrap();
        assert_eq!(config.t0(), 2.0);
        assert_eq!(config.tf(), 2.0);
        assert_eq!(config.intervals(), 4);
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            Config::new(1.0, 0.0, 1),
            Err(ConfigError::Reversed { t0: 1.0, tf: 0.0 })
        );
        assert_eq!(Config::new(0.0, 1.0, 0), Err(ConfigError::NoIntervals));
        assert!(matches!(
            Config::new(f64::NAN, 1.0, 1),
            Err(ConfigError::NonFinite { .. })
        ));

        let options = Options::new().with("abstol", 1e-8);
        assert!(matches!(
            Config::from_options(&options),
            Err(Error::InvalidOption { .. })
        ));
    }
}
