//! Lock-free in-memory store using DashMap.
//!
//! Lines are keyed by line id; the finished flag lives per order in a separate
//! set, mirroring the header/line split of a ticketing database.

use crate::error::Result;
use crate::traits::{OrderSource, TokenLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderLine, View};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Fields of a line before the store assigns its id.
#[derive(Debug, Clone, Default)]
pub struct NewOrderLine {
    pub order_id: i64,
    pub item_name: Option<String>,
    pub message: Option<String>,
    pub staff_name: Option<String>,
    pub table_number: Option<i32>,
    pub sent_date_time: Option<DateTime<Utc>>,
}

impl NewOrderLine {
    pub fn item(order_id: i64, name: &str) -> Self {
        Self {
            order_id,
            item_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// A comment line attached to the previous item of the order.
    pub fn comment(order_id: i64, message: &str) -> Self {
        Self {
            order_id,
            item_name: Some(String::new()),
            message: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table_number: i32, staff_name: &str) -> Self {
        self.table_number = Some(table_number);
        self.staff_name = Some(staff_name.to_string());
        self
    }

    pub fn sent_at(mut self, sent: DateTime<Utc>) -> Self {
        self.sent_date_time = Some(sent);
        self
    }

    pub(crate) fn into_line(self, order_line_id: i64) -> OrderLine {
        OrderLine {
            order_id: self.order_id,
            order_line_id: Some(order_line_id),
            item_name: self.item_name,
            message: self.message,
            staff_name: self.staff_name,
            table_number: self.table_number,
            sent_date_time: self.sent_date_time,
            finished: false,
        }
    }
}

/// In-memory order source. Cloning shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderSource {
    inner: Arc<MemoryOrderSourceInner>,
}

#[derive(Debug, Default)]
struct MemoryOrderSourceInner {
    /// line id -> line
    lines: DashMap<i64, OrderLine>,
    /// order ids marked finished
    finished: DashSet<i64>,
    /// last assigned line id
    last_line_id: AtomicI64,
}

impl MemoryOrderSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a line under the next line id and return it.
    pub fn append_line(&self, line: NewOrderLine) -> OrderLine {
        let id = self.inner.last_line_id.fetch_add(1, Ordering::SeqCst) + 1;
        let line = line.into_line(id);
        self.inner.lines.insert(id, line.clone());
        debug!("Appended line {} to order {}", id, line.order_id);
        line
    }

    /// Delete a line outright (voided item).
    pub fn remove_line(&self, order_line_id: i64) -> Option<OrderLine> {
        self.inner.lines.remove(&order_line_id).map(|(_, line)| line)
    }

    pub fn line_count(&self) -> usize {
        self.inner.lines.len()
    }

    fn collect(&self, view: View, after: i64) -> Vec<OrderLine> {
        let mut lines: Vec<OrderLine> = self
            .inner
            .lines
            .iter()
            .filter(|entry| *entry.key() > after)
            .filter_map(|entry| {
                let finished = self.inner.finished.contains(&entry.value().order_id);
                (finished == view.is_finished()).then(|| OrderLine {
                    finished,
                    ..entry.value().clone()
                })
            })
            .collect();
        lines.sort_by_key(|l| l.order_line_id);
        lines
    }
}

#[async_trait]
impl OrderSource for MemoryOrderSource {
    async fn fetch_all(&self, view: View) -> Result<Vec<OrderLine>> {
        Ok(self.collect(view, i64::MIN))
    }

    async fn fetch_since(&self, view: View, watermark: i64) -> Result<Vec<OrderLine>> {
        Ok(self.collect(view, watermark))
    }

    async fn set_finished(&self, order_id: i64, finished: bool) -> Result<()> {
        if finished {
            self.inner.finished.insert(order_id);
        } else {
            self.inner.finished.remove(&order_id);
        }
        debug!("Order {} finished={}", order_id, finished);
        Ok(())
    }
}

/// In-memory token ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenLedger {
    tokens: Arc<DashMap<String, DateTime<Utc>>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn lookup(&self, token: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.tokens.get(token).map(|e| *e.value()))
    }

    async fn save(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        self.tokens.insert(token.to_string(), expires_at);
        Ok(())
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        self.tokens.remove(token);
        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0u64;
        self.tokens.retain(|_, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
