//! Order store and token ledger collaborators for the kitchen feed.
//!
//! The gateway only sees the [`OrderSource`] and [`TokenLedger`] traits. Two
//! backends are provided:
//!
//! - [`memory`]: DashMap-backed, used for local runs and tests
//! - [`redis_store`]: Redis-backed, shared between gateway instances

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryOrderSource, MemoryTokenLedger, NewOrderLine};
pub use redis_store::{RedisOrderSource, RedisTokenLedger};
pub use traits::{OrderSource, TokenLedger};
