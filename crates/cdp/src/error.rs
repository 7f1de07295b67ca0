use std::time::Duration;

use lhremote_core::error::ServiceError;

/// Transport-level failures talking to a debug port.
#[derive(Debug, thiserror::Error)]
pub enum CdpError {
    /// The HTTP discovery request failed for a reason other than a refused
    /// connection.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection refused on debug port {port}")]
    ConnectionRefused { port: u16 },

    /// Failed to establish or keep the WebSocket session.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Unexpected or malformed protocol traffic.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The evaluated expression threw; carries the exception description.
    #[error("{0}")]
    Evaluation(String),

    #[error("No debuggable target on port {port}")]
    NoTarget { port: u16 },

    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("Not connected")]
    NotConnected,
}

impl CdpError {
    /// Message of an evaluation failure, if this is one.
    pub fn evaluation_message(&self) -> Option<&str> {
        match self {
            Self::Evaluation(message) => Some(message),
            _ => None,
        }
    }
}

impl From<CdpError> for ServiceError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::ConnectionRefused { port } => ServiceError::NotRunning { port },
            CdpError::NotConnected => ServiceError::NotConnected,
            CdpError::Evaluation(message) => ServiceError::Bridge(message),
            other => ServiceError::Bridge(other.to_string()),
        }
    }
}
