//! Collaborator contracts the feed depends on.
//!
//! Both stores are shared by every connection and are expected to synchronize
//! internally; callers hold them behind `Arc<dyn ...>` and never lock around them.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderLine, View};

/// Read side of the order store plus the finish toggle.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Every kitchen line of `view`, ascending by line id.
    async fn fetch_all(&self, view: View) -> Result<Vec<OrderLine>>;

    /// Lines of `view` whose line id is strictly greater than `watermark`, ascending.
    async fn fetch_since(&self, view: View, watermark: i64) -> Result<Vec<OrderLine>>;

    /// Move an order between the active and completed views.
    async fn set_finished(&self, order_id: i64, finished: bool) -> Result<()>;
}

/// Storage for session tokens and their absolute expiry.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Expiry of `token`, or `None` if it was never issued or has been removed.
    async fn lookup(&self, token: &str) -> Result<Option<DateTime<Utc>>>;

    async fn save(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Remove `token`. Removing an unknown token is not an error.
    async fn invalidate(&self, token: &str) -> Result<()>;

    /// Remove every token with `expires_at <= now`, returning how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64>;
}
