//! Kitchen display client.
//!
//! Keeps a local copy of the order feed consistent with the gateway and lays it
//! out as cards:
//!
//! ```text
//! WsManager ─ frames ─▶ DisplaySession ─▶ Reconciler (cache)
//!                                             ↓
//!                              layout() ─▶ Board ─▶ TextRenderer
//! ```
//!
//! Layout is pure and measured through [`layout::Measure`], so it runs the same
//! against a terminal or a test fake.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod layout;
pub mod order;
pub mod reconciler;
pub mod render;
pub mod session;
pub mod timer;

pub use api::ApiClient;
pub use commands::parse_command;
pub use config::DisplayConfig;
pub use error::{DisplayError, Result};
pub use layout::{layout, Card, CardContent, Column, Layout, LayoutOptions, Measure};
pub use order::{fold_orders, Order, OrderItem};
pub use reconciler::{Reaction, Reconciler};
pub use render::{Board, TextMeasure, TextRenderer};
pub use session::DisplaySession;
pub use timer::{elapsed_since, format_elapsed, ElapsedTier, FirstSeen};
