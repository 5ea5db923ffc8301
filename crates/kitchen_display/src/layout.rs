//! Card layout: packs orders into fixed-height cards and cards into columns.
//!
//! The engine never renders anything itself. Extents come from a [`Measure`]
//! implementation supplied by the host, so the same packing runs against terminal
//! rows in production and a linear fake in tests.
//!
//! ```text
//! lines ─ fold_orders ─▶ orders ─ fill cards ─▶ cards ─ pack ─▶ columns
//! ```

use crate::order::{fold_orders, Order, OrderItem};
use chrono::{DateTime, Utc};
use common::{OrderLine, View};
use tracing::{debug, warn};

/// Piece of a card whose extent the host measures.
#[derive(Debug, Clone, Copy)]
pub enum CardContent<'a> {
    /// Table, staff and order id, plus a marker on continuation cards.
    Header { continued: bool },
    /// Timer (active view only) and the finish/unfinish action.
    Footer { view: View },
    Item(&'a OrderItem),
    /// Top and bottom chrome together.
    Border,
}

/// Measures content in the host's linear unit.
pub trait Measure {
    fn measure(&self, content: CardContent<'_>) -> u32;
}

/// Height budgets for cards and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Maximum height of a card, chrome included.
    pub card_height: u32,
    /// Maximum height of a column of stacked cards.
    pub column_height: u32,
    /// Space between stacked cards.
    pub card_gap: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            card_height: 40,
            column_height: 40,
            card_gap: 1,
        }
    }
}

/// One visual card. An order that overflows spans several cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub order_id: i64,
    pub table_number: Option<i32>,
    pub staff_name: Option<String>,
    /// Set on every card after the first of an order.
    pub continued: bool,
    pub items: Vec<OrderItem>,
    /// A single item too tall for an empty body; the body scrolls.
    pub scrollable: bool,
    pub active_at: Option<DateTime<Utc>>,
    /// Visible body extent.
    pub body_height: u32,
    /// Total extent, chrome included.
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Column {
    pub cards: Vec<Card>,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub columns: Vec<Column>,
}

impl Layout {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.columns.iter().flat_map(|c| c.cards.iter())
    }

    /// Number of distinct orders on the board.
    pub fn order_count(&self) -> usize {
        self.cards().filter(|c| !c.continued).count()
    }
}

/// Lay out a deduplicated set of lines for `view`.
pub fn layout<M: Measure>(
    lines: &[OrderLine],
    opts: &LayoutOptions,
    view: View,
    measurer: &M,
) -> Layout {
    let orders = fold_orders(lines);
    let mut packer = ColumnPacker::new(opts);

    for order in &orders {
        for card in fill_cards(order, opts, view, measurer) {
            packer.push(card);
        }
    }

    let layout = packer.finish();
    debug!(
        "Laid out {} orders in {} columns",
        orders.len(),
        layout.columns.len()
    );
    layout
}

/// Body space left in a card once its chrome is measured.
fn body_capacity<M: Measure>(opts: &LayoutOptions, view: View, continued: bool, measurer: &M) -> u32 {
    let chrome = measurer.measure(CardContent::Header { continued })
        + measurer.measure(CardContent::Footer { view })
        + measurer.measure(CardContent::Border);
    opts.card_height.saturating_sub(chrome)
}

/// Split one order's items across as many cards as it takes.
fn fill_cards<M: Measure>(
    order: &Order,
    opts: &LayoutOptions,
    view: View,
    measurer: &M,
) -> Vec<Card> {
    let mut cards = Vec::new();
    let mut current = CardBuilder::new(order, false, opts, view, measurer);

    for item in &order.items {
        let extent = measurer.measure(CardContent::Item(item));

        if !current.is_empty() && current.used + extent > current.capacity {
            debug!(
                "Continued order {} (card {})",
                order.order_id,
                cards.len() + 1
            );
            cards.push(current.build());
            current = CardBuilder::new(order, true, opts, view, measurer);
        }

        if current.is_empty() && extent > current.capacity {
            warn!("Item too tall for card in order {}", order.order_id);
            current.scrollable = true;
        }
        current.push(item.clone(), extent);
    }

    cards.push(current.build());
    cards
}

struct CardBuilder {
    card: Card,
    chrome: u32,
    capacity: u32,
    used: u32,
    scrollable: bool,
}

impl CardBuilder {
    fn new<M: Measure>(
        order: &Order,
        continued: bool,
        opts: &LayoutOptions,
        view: View,
        measurer: &M,
    ) -> Self {
        let capacity = body_capacity(opts, view, continued, measurer);
        Self {
            card: Card {
                order_id: order.order_id,
                table_number: order.table_number,
                staff_name: order.staff_name.clone(),
                continued,
                items: Vec::new(),
                scrollable: false,
                active_at: order.active_at,
                body_height: 0,
                height: 0,
            },
            chrome: opts.card_height.saturating_sub(capacity),
            capacity,
            used: 0,
            scrollable: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.card.items.is_empty()
    }

    fn push(&mut self, item: OrderItem, extent: u32) {
        self.card.items.push(item);
        self.used += extent;
    }

    fn build(mut self) -> Card {
        self.card.scrollable = self.scrollable;
        self.card.body_height = self.used.min(self.capacity);
        self.card.height = self.chrome + self.card.body_height;
        self.card
    }
}

/// Stacks cards into columns under the column budget.
struct ColumnPacker {
    gap: u32,
    budget: u32,
    columns: Vec<Column>,
}

impl ColumnPacker {
    fn new(opts: &LayoutOptions) -> Self {
        Self {
            gap: opts.card_gap,
            budget: opts.column_height,
            columns: Vec::new(),
        }
    }

    fn push(&mut self, card: Card) {
        let fits = self.columns.last().is_some_and(|column| {
            column.height + self.gap + card.height <= self.budget
        });

        if fits {
            if let Some(column) = self.columns.last_mut() {
                column.height += self.gap + card.height;
                column.cards.push(card);
            }
        } else {
            // A fresh column always takes the card, even one over budget.
            self.columns.push(Column {
                height: card.height,
                cards: vec![card],
            });
        }
    }

    fn finish(self) -> Layout {
        Layout {
            columns: self.columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header 3 (+1 when continued), footer 2 in active and 1 in completed,
    /// border 2, items 1 row plus 1 per message.
    struct LinearMeasure;

    impl Measure for LinearMeasure {
        fn measure(&self, content: CardContent<'_>) -> u32 {
            match content {
                CardContent::Header { continued } => 3 + u32::from(continued),
                CardContent::Footer { view: View::Active } => 2,
                CardContent::Footer { view: View::Completed } => 1,
                CardContent::Item(item) => 1 + item.messages.len() as u32,
                CardContent::Border => 2,
            }
        }
    }

    fn item_line(order_id: i64, line_id: i64, name: &str) -> OrderLine {
        OrderLine {
            order_id,
            order_line_id: Some(line_id),
            item_name: Some(name.to_string()),
            message: None,
            staff_name: None,
            table_number: Some(1),
            sent_date_time: None,
            finished: false,
        }
    }

    fn comment_line(order_id: i64, line_id: i64, message: &str) -> OrderLine {
        OrderLine {
            item_name: None,
            message: Some(message.to_string()),
            ..item_line(order_id, line_id, "")
        }
    }

    fn order_with_items(order_id: i64, first_line: i64, count: i64) -> Vec<OrderLine> {
        (0..count)
            .map(|i| item_line(order_id, first_line + i, &format!("Item {}", i)))
            .collect()
    }

    fn opts(card_height: u32, column_height: u32) -> LayoutOptions {
        LayoutOptions {
            card_height,
            column_height,
            card_gap: 0,
        }
    }

    #[test]
    fn test_order_that_fits_takes_one_card() {
        // Active chrome is 7, so a 12-row card holds 5 single-row items.
        let lines = order_with_items(1, 1, 5);
        let layout = layout(&lines, &opts(12, 100), View::Active, &LinearMeasure);

        let cards: Vec<&Card> = layout.cards().collect();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].items.len(), 5);
        assert_eq!(cards[0].height, 12);
        assert!(!cards[0].continued);
        assert!(!cards[0].scrollable);
    }

    #[test]
    fn test_overflow_continues_on_new_cards() {
        // First card holds 5 items, continued cards (chrome 8) hold 4.
        let lines = order_with_items(1, 1, 12);
        let layout = layout(&lines, &opts(12, 100), View::Active, &LinearMeasure);

        let cards: Vec<&Card> = layout.cards().collect();
        let counts: Vec<usize> = cards.iter().map(|c| c.items.len()).collect();
        assert_eq!(counts, vec![5, 4, 3]);
        assert!(!cards[0].continued);
        assert!(cards[1].continued && cards[2].continued);

        // Every card but the last is exactly full.
        assert_eq!(cards[0].height, 12);
        assert_eq!(cards[1].height, 12);
        assert!(cards[2].height < 12);

        // Nothing repeated, nothing lost.
        let names: Vec<&str> = cards
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.name.as_str()))
            .collect();
        assert_eq!(names.len(), 12);
        assert_eq!(names[5], "Item 5");
    }

    #[test]
    fn test_overflowing_item_starts_next_card_with_its_comments() {
        let mut lines = order_with_items(1, 1, 4);
        lines.push(item_line(1, 5, "Burger"));
        lines.push(comment_line(1, 6, "no onion"));
        let layout = layout(&lines, &opts(12, 100), View::Active, &LinearMeasure);

        let cards: Vec<&Card> = layout.cards().collect();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].items.len(), 4);
        assert_eq!(cards[1].items[0].name, "Burger");
        assert_eq!(cards[1].items[0].messages, vec!["no onion"]);
    }

    #[test]
    fn test_item_taller_than_card_becomes_scrollable() {
        let mut lines = vec![item_line(1, 1, "Platter")];
        for i in 0..10 {
            lines.push(comment_line(1, 2 + i, "extra"));
        }
        lines.push(item_line(1, 20, "Water"));
        let layout = layout(&lines, &opts(12, 100), View::Active, &LinearMeasure);

        let cards: Vec<&Card> = layout.cards().collect();
        assert_eq!(cards.len(), 2);
        assert!(cards[0].scrollable);
        assert_eq!(cards[0].items.len(), 1);
        assert_eq!(cards[0].body_height, 5);
        assert_eq!(cards[0].height, 12);
        assert!(!cards[1].scrollable);
        assert_eq!(cards[1].items[0].name, "Water");
    }

    #[test]
    fn test_completed_view_has_more_body_room() {
        // Completed chrome is 6: 6 items fit where active fits 5.
        let lines = order_with_items(1, 1, 6);
        let active = layout(&lines, &opts(12, 100), View::Active, &LinearMeasure);
        let completed = layout(&lines, &opts(12, 100), View::Completed, &LinearMeasure);
        assert_eq!(active.cards().count(), 2);
        assert_eq!(completed.cards().count(), 1);
    }

    #[test]
    fn test_cards_pack_into_columns() {
        // Each order is a 10-row card; a 25-row column takes two.
        let mut lines = Vec::new();
        for order_id in 1..=5 {
            lines.extend(order_with_items(order_id, order_id * 10, 3));
        }
        let layout = layout(&lines, &opts(12, 25), View::Active, &LinearMeasure);

        let per_column: Vec<usize> = layout.columns.iter().map(|c| c.cards.len()).collect();
        assert_eq!(per_column, vec![2, 2, 1]);
        assert!(layout.columns.iter().all(|c| c.height <= 25));
        assert_eq!(layout.order_count(), 5);
    }

    #[test]
    fn test_card_over_column_budget_gets_own_column() {
        let mut lines = order_with_items(1, 1, 1);
        lines.extend(order_with_items(2, 10, 5));
        let layout = layout(&lines, &opts(12, 9), View::Active, &LinearMeasure);

        assert_eq!(layout.columns.len(), 2);
        assert_eq!(layout.columns[1].cards.len(), 1);
        assert_eq!(layout.columns[1].height, 12);
    }

    #[test]
    fn test_gap_counts_against_column_budget() {
        let mut lines = order_with_items(1, 1, 3);
        lines.extend(order_with_items(2, 10, 3));
        let packed = |gap| {
            let opts = LayoutOptions {
                card_height: 12,
                column_height: 20,
                card_gap: gap,
            };
            layout(&lines, &opts, View::Active, &LinearMeasure).columns.len()
        };
        assert_eq!(packed(0), 1);
        assert_eq!(packed(1), 2);
    }

    #[test]
    fn test_layout_is_idempotent() {
        let mut lines = Vec::new();
        for order_id in 1..=4 {
            lines.extend(order_with_items(order_id, order_id * 100, order_id * 3));
            lines.push(comment_line(order_id, order_id * 100 + 50, "rush"));
        }
        let options = opts(14, 30);
        let first = layout(&lines, &options, View::Active, &LinearMeasure);
        let second = layout(&lines, &options, View::Active, &LinearMeasure);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input_yields_empty_layout() {
        let layout = layout(&[], &opts(12, 24), View::Active, &LinearMeasure);
        assert!(layout.is_empty());
        assert_eq!(layout.order_count(), 0);
    }
}
