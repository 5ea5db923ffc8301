//! Orders derived from a flat list of order lines.
//!
//! A line with a blank item name continues the nearest preceding named item of the
//! same order, so the line order within an order matters.

use chrono::{DateTime, Utc};
use common::OrderLine;
use std::collections::HashMap;

/// One item on a ticket with the comments attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub name: String,
    pub messages: Vec<String>,
}

impl OrderItem {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: Vec::new(),
        }
    }
}

/// Lines of one order, folded into items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: i64,
    pub table_number: Option<i32>,
    pub staff_name: Option<String>,
    /// Earliest send time across the order's lines.
    pub active_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
}

/// Group lines into orders.
///
/// Orders keep the order in which they first appear. Within an order, lines are
/// folded by ascending line id when every line has one, otherwise in arrival order.
/// Comments with no preceding named item are dropped.
pub fn fold_orders(lines: &[OrderLine]) -> Vec<Order> {
    let mut groups: Vec<Vec<&OrderLine>> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for line in lines {
        let slot = *index.entry(line.order_id).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(line);
    }

    groups.into_iter().map(fold_order).collect()
}

fn fold_order(mut lines: Vec<&OrderLine>) -> Order {
    if lines.iter().all(|l| l.order_line_id.is_some()) {
        lines.sort_by_key(|l| l.order_line_id);
    }

    let first = lines[0];
    let mut order = Order {
        order_id: first.order_id,
        table_number: first.table_number,
        staff_name: first.staff_name.clone(),
        active_at: lines.iter().filter_map(|l| l.sent_date_time).min(),
        items: Vec::new(),
    };

    for line in lines {
        match (line.named_item(), line.comment()) {
            (Some(name), comment) => {
                let mut item = OrderItem::new(name);
                item.messages.extend(comment.map(str::to_string));
                order.items.push(item);
            }
            (None, Some(comment)) => {
                if let Some(item) = order.items.last_mut() {
                    item.messages.push(comment.to_string());
                }
            }
            (None, None) => {}
        }
    }

    order
}
