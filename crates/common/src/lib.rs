//! Shared types for the kitchen order feed.
//!
//! - [`model`]: order lines, views and row identity
//! - [`protocol`]: the JSON frames exchanged over the feed WebSocket
//! - [`ws_manager`]: client-side connection manager driven by a [`WsHandler`]

pub mod error;
pub mod messages;
pub mod model;
pub mod protocol;
pub mod reconnect;
pub mod ws_handler;
pub mod ws_manager;

pub use error::{Error, Result};
pub use messages::ControlCommand;
pub use model::{LineIdentity, OrderLine, View};
pub use protocol::{ClientMessage, FeedPayload, ServerMessage};
pub use reconnect::{Backoff, ReconnectPolicy};
pub use ws_handler::WsHandler;
pub use ws_manager::{WsManager, WsManagerConfig};
