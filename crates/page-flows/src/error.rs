//! Error taxonomy for page flows: not-found, timeout, assertion mismatch.

use cdp_driver::{DriverError, DriverErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    /// A referenced element, row or option does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A bounded wait was not satisfied in time.
    #[error("wait timed out: {0}")]
    WaitTimeout(String),

    /// An observed value differs from the expected one.
    #[error("assertion failed on {what}: expected {expected}, got {actual}")]
    Assertion {
        what: String,
        expected: String,
        actual: String,
    },

    /// Driver failure that is neither a lookup miss nor a timeout.
    #[error("driver error: {0}")]
    Driver(DriverError),
}

impl From<DriverError> for FlowError {
    fn from(err: DriverError) -> Self {
        match err.kind {
            DriverErrorKind::TargetNotFound | DriverErrorKind::OptionNotFound => {
                FlowError::NotFound(err.to_string())
            }
            DriverErrorKind::NavTimeout => FlowError::WaitTimeout(err.to_string()),
            _ => FlowError::Driver(err),
        }
    }
}

impl FlowError {
    pub fn assertion(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        FlowError::Assertion {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Replace a timeout's generic hint with operation context; other errors
    /// convert unchanged.
    pub fn wait_context(err: DriverError, context: &str) -> Self {
        if err.kind == DriverErrorKind::NavTimeout {
            FlowError::WaitTimeout(context.to_string())
        } else {
            FlowError::from(err)
        }
    }
}
