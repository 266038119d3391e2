use std::fmt;
use thiserror::Error;

/// Errors that can occur when fetching a measurement from the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection failure or timeout.
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx status, malformed body or an empty measurement list.
    #[error("source error: {0}")]
    Source(String),
}

/// A pollutant value that could not be read as a number and was stored as 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionWarning {
    pub field: &'static str,
    /// The raw value as received, `None` when the field was absent.
    pub raw: Option<String>,
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Some(raw) => write!(f, "{}: non-numeric value {:?} coerced to 0", self.field, raw),
            None => write!(f, "{}: missing value coerced to 0", self.field),
        }
    }
}
