/// Errors reported by a transport primitive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("transport not connected")]
    NotConnected,

    #[error("transport not ready")]
    NotReady,

    #[error("send failed: {0}")]
    Send(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Errors from [`ConnectionManager`](crate::ConnectionManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Encode(#[from] serde_json::Error),
}
