use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A step answered with a status other than the one its contract names.
    #[error("{step}: expected status {expected}, got {actual}: {body}")]
    UnexpectedStatus {
        step: &'static str,
        expected: u16,
        actual: u16,
        body: String,
    },

    /// A response decoded but its content contradicts the flow's
    /// expectations (empty token, missing titles).
    #[error("{step}: {detail}")]
    Mismatch { step: &'static str, detail: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
}

impl ApiError {
    pub fn mismatch(step: &'static str, detail: impl Into<String>) -> Self {
        ApiError::Mismatch {
            step,
            detail: detail.into(),
        }
    }
}
