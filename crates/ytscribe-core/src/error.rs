//! Error types for ytscribe.

use thiserror::Error;

/// Errors from the persistent store (sled + JSON codec).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store: {0}")]
    Sled(#[from] sled::Error),

    #[error("cached transcript codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Classified failures of the upstream transcript fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transcripts disabled for the video, or no English track.
    #[error("transcript not available: {0}")]
    NotAvailable(String),

    /// Anything else: network, quota, blocked request, unparsable payload.
    #[error("{0}")]
    Upstream(String),
}

/// Request-level failures, one variant per HTTP status class.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Invalid video ID or URL")]
    InvalidVideoId,

    #[error("English transcript not found or transcripts disabled")]
    TranscriptUnavailable(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Unauthenticated => 403,
            ServiceError::InvalidToken => 401,
            ServiceError::InvalidVideoId => 400,
            ServiceError::TranscriptUnavailable(_) => 404,
            ServiceError::Upstream(_) | ServiceError::Internal(_) => 500,
        }
    }
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotAvailable(reason) => ServiceError::TranscriptUnavailable(reason),
            FetchError::Upstream(msg) => ServiceError::Upstream(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_map_to_404_and_500() {
        let nf: ServiceError = FetchError::NotAvailable("disabled".into()).into();
        assert_eq!(nf.status_code(), 404);
        assert!(nf.to_string().contains("not found"));

        let up: ServiceError = FetchError::Upstream("connection reset".into()).into();
        assert_eq!(up.status_code(), 500);
        assert_eq!(up.to_string(), "connection reset");
    }

    #[test]
    fn missing_and_invalid_credentials_differ() {
        assert_ne!(
            ServiceError::Unauthenticated.status_code(),
            ServiceError::InvalidToken.status_code()
        );
    }
}
