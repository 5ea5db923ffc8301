//! WebSocket handler trait for feed clients.

use crate::error::Result;
use crate::messages::ControlCommand;
use async_trait::async_trait;

/// Implemented by whatever consumes a feed connection.
/// The WsManager calls these methods when events occur.
#[async_trait]
pub trait WsHandler: Send + Sync + 'static {
    /// Returns the WebSocket URL to connect to.
    fn url(&self) -> String;

    /// Returns the message to send immediately after connection.
    /// Return None if no initial message is needed.
    fn on_connect_message(&self) -> Option<String> {
        None
    }

    /// Called when a text frame is received.
    /// Returns frames to send back on the same connection.
    async fn on_message(&self, msg: &str) -> Result<Vec<String>>;

    /// Called when the connection is lost (before reconnect attempt).
    async fn on_disconnect(&self) {}

    /// Called when a connection has been established.
    async fn on_reconnect(&self) {}

    /// Handle a control command.
    /// Returns the message to send to the WebSocket, if any.
    async fn handle_command(&self, cmd: ControlCommand) -> Result<Option<String>>;
}
