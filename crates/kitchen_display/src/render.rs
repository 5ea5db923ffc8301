//! Plain-text board for terminals.

use crate::layout::{Card, CardContent, Layout, Measure};
use crate::order::OrderItem;
use crate::timer::{elapsed_since, format_elapsed, ElapsedTier};
use chrono::{DateTime, Utc};
use common::View;

/// Snapshot of what the display shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub view: View,
    pub layout: Layout,
}

impl Board {
    /// Timers only tick on a non-empty active board.
    pub fn needs_timer(&self) -> bool {
        self.view == View::Active && !self.layout.is_empty()
    }
}

/// Measures card content in terminal rows at a fixed card width.
#[derive(Debug, Clone, Copy)]
pub struct TextMeasure {
    inner_width: usize,
}

impl Measure for TextMeasure {
    fn measure(&self, content: CardContent<'_>) -> u32 {
        match content {
            CardContent::Header { continued } => 3 + u32::from(continued),
            CardContent::Footer { view: View::Active } => 2,
            CardContent::Footer { view: View::Completed } => 1,
            CardContent::Item(item) => item_lines(item, self.inner_width).len() as u32,
            CardContent::Border => 2,
        }
    }
}

/// Draws columns of cards side by side.
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer {
    card_width: usize,
    card_gap: u32,
}

impl TextRenderer {
    pub fn new(card_width: usize, card_gap: u32) -> Self {
        Self {
            card_width,
            card_gap,
        }
    }

    /// Measurer matching what [`TextRenderer::render`] draws.
    pub fn measure(&self) -> TextMeasure {
        TextMeasure {
            inner_width: self.inner_width(),
        }
    }

    pub fn render(&self, board: &Board, now: DateTime<Utc>) -> String {
        let title = format!(
            "KITCHEN - {} ({} orders)",
            board.view.as_str().to_uppercase(),
            board.layout.order_count()
        );
        if board.layout.is_empty() {
            return format!("{}\n\nNo orders to display\n", title);
        }

        let blocks: Vec<Vec<String>> = board
            .layout
            .columns
            .iter()
            .map(|column| {
                let mut rows = Vec::new();
                for (i, card) in column.cards.iter().enumerate() {
                    if i > 0 {
                        rows.extend((0..self.card_gap).map(|_| String::new()));
                    }
                    rows.extend(self.card_rows(card, board.view, now));
                }
                rows
            })
            .collect();

        let height = blocks.iter().map(Vec::len).max().unwrap_or(0);
        let mut out = format!("{}\n\n", title);
        for row in 0..height {
            let line: Vec<String> = blocks
                .iter()
                .map(|b| {
                    let cell = b.get(row).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", cell, width = self.card_width)
                })
                .collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        }
        out
    }

    fn inner_width(&self) -> usize {
        self.card_width.saturating_sub(4).max(1)
    }

    fn card_rows(&self, card: &Card, view: View, now: DateTime<Utc>) -> Vec<String> {
        let width = self.inner_width();
        let border = format!("+{}+", "-".repeat(width + 2));
        let boxed = |text: &str| format!("| {:<width$} |", clip(text, width), width = width);

        let mut rows = vec![border.clone()];
        if card.continued {
            rows.push(boxed("Continued"));
        }
        rows.push(boxed(&format!(
            "Table: {}",
            card.table_number.map(|t| t.to_string()).unwrap_or_default()
        )));
        rows.push(boxed(&format!(
            "Staff: {}",
            card.staff_name.as_deref().unwrap_or("")
        )));
        rows.push(boxed(&format!("Order ID: {}", card.order_id)));

        let mut body: Vec<String> = card
            .items
            .iter()
            .flat_map(|item| item_lines(item, width))
            .collect();
        let visible = card.body_height as usize;
        if body.len() > visible {
            body.truncate(visible);
            if let Some(last) = body.last_mut() {
                *last = "  ...".to_string();
            }
        }
        rows.extend(body.iter().map(|l| boxed(l.as_str())));

        match view {
            View::Active => {
                let elapsed = elapsed_since(card.active_at, now);
                rows.push(boxed(&format!(
                    "Time active: {} {}",
                    format_elapsed(elapsed),
                    ElapsedTier::for_elapsed(elapsed)
                )));
                rows.push(boxed(&format!("[finish {}]", card.order_id)));
            }
            View::Completed => rows.push(boxed(&format!("[unfinish {}]", card.order_id))),
        }

        rows.push(border);
        rows
    }
}

/// Rows an item occupies: its name, then each comment indented.
fn item_lines(item: &OrderItem, width: usize) -> Vec<String> {
    let mut lines = wrap(&item.name, width);
    for message in &item.messages {
        let text = format!("- {}", message);
        lines.extend(
            wrap(&text, width.saturating_sub(2).max(1))
                .into_iter()
                .map(|l| format!("  {}", l)),
        );
    }
    lines
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn clip(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
