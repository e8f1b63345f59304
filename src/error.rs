// MIT License - Copyright (c) 2026 Peter Wright
// Error types

/// All errors that can occur in the adt-pulse library.
#[derive(Debug, thiserror::Error)]
pub enum PulseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request failed: {uri} returned HTTP {status}")]
    RequestFailed { uri: String, status: u16 },

    #[error("Invalid response: {details}")]
    InvalidResponse { details: String },

    #[error("Unknown site: {id}")]
    UnknownSite { id: String },

    #[error("Not connected")]
    NotConnected,
}

impl PulseError {
    /// Whether this error is transient and the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            PulseError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PulseError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            PulseError::NotConnected => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
