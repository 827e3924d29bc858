use std::fmt;

use thiserror::Error;

/// High-level error categories surfaced by the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum DriverErrorKind {
    #[error("navigation or wait timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("option not found")]
    OptionNotFound,
    #[error("internal error")]
    Internal,
}

/// Error with a category plus free-text hint for diagnostics.
#[derive(Clone, Debug)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
