//! WebSocket handler trait for upstream feeds.

use crate::error::Result;
use crate::messages::ControlCommand;
use async_trait::async_trait;

/// Trait that feed adapters implement to handle WebSocket events.
/// The WsManager calls these methods when events occur.
#[async_trait]
pub trait WsHandler: Send + Sync + 'static {
    /// Returns the WebSocket URL to connect to.
    fn url(&self) -> &str;

    /// Returns the message to send immediately after connection (e.g. topic registration).
    /// Return None if no initial message is needed.
    fn on_connect_message(&self) -> Option<String>;

    /// Called when a text message is received from the WebSocket.
    async fn on_message(&self, msg: &str) -> Result<()>;

    /// Called when a binary message is received from the WebSocket.
    /// Default implementation ignores binary messages.
    async fn on_binary_message(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    /// Called when the connection is lost (before reconnect attempt).
    async fn on_disconnect(&self) {}

    /// Called once the handshake succeeded and the connect message was sent.
    async fn on_reconnect(&self) {}

    /// Handle a control command.
    /// Returns the message to send to the WebSocket, if any.
    async fn handle_command(&self, cmd: ControlCommand) -> Option<String>;

    /// Topics this handler has registered with the feed.
    fn topics(&self) -> Vec<String>;
}
