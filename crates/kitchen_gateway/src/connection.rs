//! Per-connection feed state.
//!
//! Each WebSocket owns exactly one [`ConnectionState`]; nothing here is shared
//! between connections, and the state is dropped on disconnect.

use common::View;
use uuid::Uuid;

/// Unique connection identifier, used in logs.
pub type ConnectionId = Uuid;

/// Highest line id sent per view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermarks {
    active: i64,
    completed: i64,
}

impl Watermarks {
    pub fn get(&self, view: View) -> i64 {
        match view {
            View::Active => self.active,
            View::Completed => self.completed,
        }
    }

    /// Raise the watermark of `view`. Lower values are ignored.
    pub fn advance(&mut self, view: View, to: i64) {
        let slot = self.slot(view);
        *slot = (*slot).max(to);
    }

    /// Forget what was sent on `view`.
    pub fn reset(&mut self, view: View) {
        *self.slot(view) = 0;
    }

    fn slot(&mut self, view: View) -> &mut i64 {
        match view {
            View::Active => &mut self.active,
            View::Completed => &mut self.completed,
        }
    }
}

/// State owned by a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// View the feed currently follows.
    pub view: View,
    /// Per-view high watermarks.
    pub watermarks: Watermarks,
}

impl ConnectionState {
    /// Fresh state for an admitted connection: active view, watermark 0.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            view: View::Active,
            watermarks: Watermarks::default(),
        }
    }

    /// Watermark of the current view.
    pub fn watermark(&self) -> i64 {
        self.watermarks.get(self.view)
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_idle_on_active() {
        let state = ConnectionState::new();
        assert_eq!(state.view, View::Active);
        assert_eq!(state.watermark(), 0);
    }

    #[test]
    fn test_watermarks_are_monotonic_per_view() {
        let mut marks = Watermarks::default();
        marks.advance(View::Active, 10);
        marks.advance(View::Active, 4);
        marks.advance(View::Completed, 7);
        assert_eq!(marks.get(View::Active), 10);
        assert_eq!(marks.get(View::Completed), 7);

        marks.reset(View::Completed);
        assert_eq!(marks.get(View::Completed), 0);
        assert_eq!(marks.get(View::Active), 10);
    }
}
