//! Gateway serving the kitchen order feed to display clients.
//!
//! This service:
//! - Issues session tokens and admits WebSocket connections that present one
//! - Sends each connection a full snapshot of its view, then polls for new lines
//! - Verifies client caches on `sync-confirm` and corrects them when they drift
//! - Moves orders between the active and completed views over HTTP
//!
//! ## Architecture
//!
//! ```text
//! OrderSource (Redis or in-memory)
//!         ↓
//! FeedSynchronizer (one per connection, owns its watermarks)
//!         ↓
//! WebSocket clients
//! ```
//!
//! Connections share nothing but the order source and the token ledger.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod session_gate;
pub mod sweeper;
pub mod synchronizer;
pub mod ws_server;

pub use config::GatewayConfig;
pub use connection::{ConnectionId, ConnectionState, Watermarks};
pub use error::{GatewayError, Result};
pub use session_gate::{Admission, RejectReason, SessionGate};
pub use sweeper::TokenSweeper;
pub use synchronizer::{FeedSynchronizer, SOURCE_ERROR_MESSAGE};
pub use ws_server::{create_router, AppState};
