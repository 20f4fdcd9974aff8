//! Gateway error types.

use axum::extract::ws::Message;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client not found.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// View name no deriver publishes.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Client buffer full; the message was dropped.
    #[error("Client channel full")]
    ChannelFull,

    /// Client channel closed (client gone).
    #[error("Channel send error")]
    ChannelSend,
}

impl From<TrySendError<Message>> for GatewayError {
    fn from(e: TrySendError<Message>) -> Self {
        match e {
            TrySendError::Full(_) => GatewayError::ChannelFull,
            TrySendError::Closed(_) => GatewayError::ChannelSend,
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
