//! Elapsed-time indicator shown in active card footers.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

/// Severity bucket for how long an order has been waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElapsedTier {
    /// Under 15 minutes.
    Green,
    /// 15 to 20 minutes.
    Yellow,
    /// 20 to 25 minutes.
    Orange,
    /// 25 minutes or more.
    Red,
}

impl ElapsedTier {
    pub fn for_elapsed(elapsed: Duration) -> Self {
        match elapsed.num_seconds() {
            s if s < 15 * 60 => ElapsedTier::Green,
            s if s < 20 * 60 => ElapsedTier::Yellow,
            s if s < 25 * 60 => ElapsedTier::Orange,
            _ => ElapsedTier::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElapsedTier::Green => "green",
            ElapsedTier::Yellow => "yellow",
            ElapsedTier::Orange => "orange",
            ElapsedTier::Red => "red",
        }
    }
}

impl fmt::Display for ElapsedTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time since `active_at`, never negative. An unknown start counts as now.
pub fn elapsed_since(active_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    active_at
        .map(|at| now - at)
        .filter(|d| *d > Duration::zero())
        .unwrap_or_else(Duration::zero)
}

/// Start instants for orders sent without a send time.
///
/// Such an order's timer starts the first time it is drawn and keeps counting
/// from there across redraws.
#[derive(Debug, Default)]
pub struct FirstSeen {
    anchors: HashMap<i64, DateTime<Utc>>,
}

impl FirstSeen {
    pub fn new() -> Self {
        Self::default()
    }

    /// `active_at` when known, otherwise the instant `order_id` was first resolved.
    pub fn resolve(
        &mut self,
        order_id: i64,
        active_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match active_at {
            Some(at) => at,
            None => *self.anchors.entry(order_id).or_insert(now),
        }
    }

    /// Forget orders no longer on the board.
    pub fn retain(&mut self, mut keep: impl FnMut(i64) -> bool) {
        self.anchors.retain(|order_id, _| keep(*order_id));
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// `mm:ss`. Minutes keep counting past 59.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}
