use std::collections::BTreeMap;

use crate::Error;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Backend configuration passed through a plugin factory.
///
/// Backends read the keys they understand into a typed config and reject the
/// rest with [`Options::ensure_known`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the options with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads a real-valued option; integers are widened.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not numeric.
    pub fn real(&self, name: &str) -> Result<Option<f64>, Error> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Real(v)) => Ok(Some(*v)),
            #[allow(clippy::cast_precision_loss)]
            Some(OptionValue::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(wrong_kind(name, "real", other)),
        }
    }

    /// Reads a non-negative integer option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not an integer or is
    /// negative.
    pub fn count(&self, name: &str) -> Result<Option<usize>, Error> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Int(v)) => {
                usize::try_from(*v)
                    .map(Some)
                    .map_err(|_| Error::InvalidOption {
                        name: name.to_string(),
                        reason: format!("expected a non-negative integer, got {v}"),
                    })
            }
            Some(other) => Err(wrong_kind(name, "int", other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not a bool.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, Error> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_kind(name, "bool", other)),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if the value is not text.
    pub fn text(&self, name: &str) -> Result<Option<&str>, Error> {
        match self.get(name) {
            None => Ok(None),
            Some(OptionValue::Text(v)) => Ok(Some(v)),
            Some(other) => Err(wrong_kind(name, "text", other)),
        }
    }

    /// Rejects any key not listed in `known`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first unknown key.
    pub fn ensure_known(&self, known: &[&str]) -> Result<(), Error> {
        match self.0.keys().find(|key| !known.contains(&key.as_str())) {
            Some(key) => Err(Error::InvalidOption {
                name: key.clone(),
                reason: format!("unknown option; expected one of {known:?}"),
            }),
            None => Ok(()),
        }
    }
}

fn wrong_kind(name: &str, expected: &str, got: &OptionValue) -> Error {
    Error::InvalidOption {
        name: name.to_string(),
        reason: format!("expected {expected}, got {}", got.kind()),
    }
}
