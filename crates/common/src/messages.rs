//! Control messages for steering a running feed connection.

use crate::model::View;

/// Commands that can be sent to a WsManager while it is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Switch the feed to another view
    SetView(View),
    /// Mark an order finished (moves it to the completed view)
    FinishOrder(i64),
    /// Move a finished order back to the active view
    UnfinishOrder(i64),
    /// Graceful shutdown
    Shutdown,
}
