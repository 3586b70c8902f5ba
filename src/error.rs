//! Error taxonomy shared by every component.

use thiserror::Error;

/// Failure modes surfaced by drivers, the router, discovery, and the pairing
/// session. Cloneable so a single transport failure can be fanned out to
/// every caller waiting on the same connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Operation not implemented by this platform. Never retried.
    #[error("operation not supported by this device")]
    Unsupported,

    /// Transport-level connect failure, after any fallback attempt.
    #[error("could not connect to the device")]
    ConnectionFailed,

    /// No usable credential yet; the caller should drive a pairing flow.
    #[error("pairing required before this device accepts commands")]
    PairingRequired,

    /// Malformed or unexpected reply. Surfaced, not retried.
    #[error("invalid response from the device")]
    InvalidResponse,

    /// A bounded wait elapsed with no result.
    #[error("operation timed out")]
    Timeout,

    /// The resolution chain was exhausted without a working app id.
    #[error("app not available on this device")]
    AppNotFound,

    /// Generic transport error with diagnostic detail.
    #[error("network error: {0}")]
    Network(String),
}

impl From<rusqlite::Error> for RemoteError {
    fn from(err: rusqlite::Error) -> Self {
        RemoteError::Network(format!("storage error: {}", err))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else if err.is_connect() {
            RemoteError::ConnectionFailed
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_detail_in_message() {
        let err = RemoteError::Network("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_clone_equality() {
        let err = RemoteError::Timeout;
        assert_eq!(err.clone(), err);
    }
}
