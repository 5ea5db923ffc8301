//! Order-line model shared by the gateway and the display.
//!
//! An [`OrderLine`] is one kitchen-visible row. Lines are grouped into orders by
//! `order_id`; `order_line_id` is the store's insertion sequence and doubles as the
//! feed watermark key.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Which slice of the order store a feed is following.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum View {
    /// Orders still being prepared.
    #[default]
    Active,
    /// Orders marked finished.
    Completed,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Active => "active",
            View::Completed => "completed",
        }
    }

    /// Whether lines of this view belong to finished orders.
    pub fn is_finished(&self) -> bool {
        matches!(self, View::Completed)
    }

    /// View a line with the given finished flag belongs to.
    pub fn for_finished(finished: bool) -> Self {
        if finished {
            View::Completed
        } else {
            View::Active
        }
    }
}

/// Anything other than `"completed"` selects the active view.
impl From<String> for View {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for View {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("completed") {
            View::Completed
        } else {
            View::Active
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item instance on a kitchen ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Groups lines into one order.
    pub order_id: i64,
    /// Store insertion sequence. Absent only on lines built client-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_line_id: Option<i64>,
    /// Empty or missing means "comment continuation of the previous item".
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub staff_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<i32>,
    #[serde(default)]
    pub sent_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: bool,
}

impl OrderLine {
    /// Item name, if it names a new item rather than continuing the previous one.
    pub fn named_item(&self) -> Option<&str> {
        non_blank(self.item_name.as_deref())
    }

    /// Message text, if it carries any.
    pub fn comment(&self) -> Option<&str> {
        non_blank(self.message.as_deref())
    }

    /// Canonical row identity used for reconciliation.
    pub fn identity(&self) -> LineIdentity {
        match self.order_line_id {
            Some(id) => LineIdentity::Line(id),
            None => LineIdentity::Composite(
                [
                    self.order_id.to_string(),
                    self.item_name.clone().unwrap_or_default(),
                    self.message.clone().unwrap_or_default(),
                    self.staff_name.clone().unwrap_or_default(),
                    self.table_number.map(|t| t.to_string()).unwrap_or_default(),
                    normalize_date_time(self.sent_date_time.as_ref()),
                ]
                .join("|"),
            ),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Identity of a row when comparing a client's copy against the store.
///
/// Lines without a surrogate id fall back to a composite of their visible fields.
/// Two genuinely distinct lines that share every field collapse to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineIdentity {
    Line(i64),
    Composite(String),
}

/// Millisecond-precision UTC rendering, empty when absent.
pub fn normalize_date_time(value: Option<&DateTime<Utc>>) -> String {
    value
        .map(|v| v.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Highest line id in `lines`, never lower than `floor`.
pub fn max_order_line_id(lines: &[OrderLine], floor: i64) -> i64 {
    lines
        .iter()
        .filter_map(|l| l.order_line_id)
        .fold(floor, i64::max)
}

/// Whether two line lists hold the same multiset of identities.
pub fn lines_match(a: &[OrderLine], b: &[OrderLine]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<LineIdentity> = a.iter().map(OrderLine::identity).collect();
    let mut right: Vec<LineIdentity> = b.iter().map(OrderLine::identity).collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

/// Drop repeated line ids, keeping the first occurrence. Lines without an id are kept.
pub fn dedup_by_line_id(lines: Vec<OrderLine>) -> Vec<OrderLine> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|l| l.order_line_id.map_or(true, |id| seen.insert(id)))
        .collect()
}
