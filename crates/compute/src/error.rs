//! Compute session error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status}: {body}")]
    Api { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ComputeError {
    /// True for a 401 answer, which warrants one re-authentication.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ComputeError::Api { status: 401, .. })
    }
}
