//! Client-side copy of the feed.
//!
//! The reconciler owns the display's cache of order lines and decides, for each
//! server frame, whether the board must be redrawn and what to send back.
//! Every full replacement is answered with a `sync-confirm` carrying the whole
//! cache, so the gateway can correct any drift right away.

use common::{ClientMessage, FeedPayload, OrderLine, ServerMessage, View};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What the session should do after a frame was applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub rerender: bool,
    pub reply: Option<ClientMessage>,
}

impl Reaction {
    fn none() -> Self {
        Self::default()
    }

    fn rerender() -> Self {
        Self {
            rerender: true,
            reply: None,
        }
    }
}

/// Deduplicated cache of the lines of the current view.
#[derive(Debug, Default)]
pub struct Reconciler {
    view: View,
    cache: Vec<OrderLine>,
    seen: HashSet<i64>,
    /// Deltas are ignored until a full list for `view` arrives.
    awaiting_full: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.cache
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// A new connection starts from nothing: drop the old cache and hold deltas
    /// until the connection's full snapshot arrives.
    pub fn begin_session(&mut self) {
        self.clear();
        self.awaiting_full = true;
    }

    /// Switch views. The cache is cleared so lines of the two views never mix.
    pub fn set_view(&mut self, view: View) -> ClientMessage {
        info!("Switching to {} view", view);
        self.view = view;
        self.clear();
        self.awaiting_full = true;
        ClientMessage::SetOrderView { value: view }
    }

    /// Apply one decoded server frame.
    pub fn handle(&mut self, msg: ServerMessage) -> Reaction {
        match msg {
            ServerMessage::OrdersFull(payload) => {
                if !self.is_current(&payload) {
                    debug!("Ignoring full list for another view");
                    return Reaction::none();
                }
                self.awaiting_full = false;
                if !payload.success {
                    warn!("Full list failed: {}", error_text(&payload));
                    return Reaction::none();
                }
                self.apply_full(payload.value.unwrap_or_default())
            }
            ServerMessage::OrdersDelta(payload) => {
                if self.awaiting_full {
                    debug!("Ignoring delta while waiting for a full list");
                    return Reaction::none();
                }
                if !payload.success {
                    warn!("Delta failed: {}", error_text(&payload));
                    return Reaction::none();
                }
                self.apply_delta(payload.value.unwrap_or_default())
            }
            ServerMessage::SyncResult(payload) => {
                if !self.is_current(&payload) {
                    debug!("Ignoring sync result for another view");
                    return Reaction::none();
                }
                self.apply_sync_result(payload)
            }
        }
    }

    /// Replace the cache wholesale and confirm it back.
    pub fn apply_full(&mut self, items: Vec<OrderLine>) -> Reaction {
        self.clear();
        self.extend_unseen(items);
        debug!("Applied full list of {} lines", self.cache.len());
        Reaction {
            rerender: true,
            reply: Some(self.confirm()),
        }
    }

    /// Append lines not seen before. Into an empty cache this acts as a full list.
    pub fn apply_delta(&mut self, items: Vec<OrderLine>) -> Reaction {
        if items.is_empty() {
            return Reaction::none();
        }
        if self.cache.is_empty() {
            return self.apply_full(items);
        }

        let added = self.extend_unseen(items);
        if added == 0 {
            debug!("Delta carried no new lines");
            return Reaction::none();
        }
        debug!("Applied {} new lines", added);
        Reaction::rerender()
    }

    /// A failed confirm with an authoritative list replaces the cache.
    pub fn apply_sync_result(&mut self, payload: FeedPayload) -> Reaction {
        match (payload.success, payload.value) {
            (true, _) => {
                debug!("Cache confirmed");
                Reaction::none()
            }
            (false, Some(items)) => {
                info!("Cache out of sync, applying {} lines", items.len());
                self.apply_full(items)
            }
            (false, None) => {
                warn!(
                    "Sync check failed: {}",
                    payload.error.as_deref().unwrap_or("unknown error")
                );
                Reaction::none()
            }
        }
    }

    /// Optimistically drop every line of `order_id`. Returns whether anything changed.
    pub fn remove_order(&mut self, order_id: i64) -> bool {
        let before = self.cache.len();
        let seen = &mut self.seen;
        self.cache.retain(|line| {
            if line.order_id != order_id {
                return true;
            }
            if let Some(id) = line.order_line_id {
                seen.remove(&id);
            }
            false
        });
        self.cache.len() != before
    }

    fn is_current(&self, payload: &FeedPayload) -> bool {
        payload.view.map_or(true, |v| v == self.view)
    }

    fn confirm(&self) -> ClientMessage {
        ClientMessage::SyncConfirm {
            view: self.view,
            value: self.cache.clone(),
        }
    }

    fn clear(&mut self) {
        self.cache.clear();
        self.seen.clear();
    }

    /// First occurrence of a line id wins. Lines without an id are always kept.
    fn extend_unseen(&mut self, items: Vec<OrderLine>) -> usize {
        let before = self.cache.len();
        for line in items {
            if let Some(id) = line.order_line_id {
                if !self.seen.insert(id) {
                    continue;
                }
            }
            self.cache.push(line);
        }
        self.cache.len() - before
    }
}

fn error_text(payload: &FeedPayload) -> &str {
    payload.error.as_deref().unwrap_or("unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(order_id: i64, line_id: i64) -> OrderLine {
        OrderLine {
            order_id,
            order_line_id: Some(line_id),
            item_name: Some(format!("Item {}", line_id)),
            message: None,
            staff_name: None,
            table_number: None,
            sent_date_time: None,
            finished: false,
        }
    }

    fn line_ids(reconciler: &Reconciler) -> Vec<i64> {
        reconciler
            .lines()
            .iter()
            .filter_map(|l| l.order_line_id)
            .collect()
    }

    fn full(view: View, lines: Vec<OrderLine>) -> ServerMessage {
        ServerMessage::OrdersFull(FeedPayload::ok(Some(view), lines))
    }

    fn delta(lines: Vec<OrderLine>) -> ServerMessage {
        ServerMessage::OrdersDelta(FeedPayload::ok(None, lines))
    }

    #[test]
    fn test_full_replaces_dedups_and_confirms() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1), line(1, 2)]);

        let reaction = r.handle(full(View::Active, vec![line(2, 5), line(2, 5), line(2, 6)]));
        assert!(reaction.rerender);
        assert_eq!(line_ids(&r), vec![5, 6]);
        assert_eq!(
            reaction.reply,
            Some(ClientMessage::SyncConfirm {
                view: View::Active,
                value: r.lines().to_vec(),
            })
        );
    }

    #[test]
    fn test_delta_appends_only_unseen_lines() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1), line(1, 2)]);

        let reaction = r.handle(delta(vec![line(1, 2), line(1, 3)]));
        assert_eq!(reaction, Reaction::rerender());
        assert_eq!(line_ids(&r), vec![1, 2, 3]);

        assert_eq!(r.handle(delta(vec![line(1, 3)])), Reaction::none());
        assert_eq!(r.handle(delta(vec![])), Reaction::none());
    }

    #[test]
    fn test_delta_into_empty_cache_is_a_full_list() {
        let mut r = Reconciler::new();
        let reaction = r.handle(delta(vec![line(1, 4)]));
        assert!(reaction.rerender);
        assert!(matches!(
            reaction.reply,
            Some(ClientMessage::SyncConfirm { .. })
        ));
    }

    #[test]
    fn test_lines_without_id_are_never_deduplicated() {
        let mut r = Reconciler::new();
        let mut bare = line(1, 0);
        bare.order_line_id = None;
        r.apply_full(vec![line(1, 1)]);
        r.apply_delta(vec![bare.clone()]);
        r.apply_delta(vec![bare]);
        assert_eq!(r.lines().len(), 3);
    }

    #[test]
    fn test_overlapping_deltas_keep_each_line_once() {
        // Deltas overlap and repeat in a scattered pattern; each id must survive once.
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1), line(1, 2)]);

        let mut sent: HashSet<i64> = [1, 2].into_iter().collect();
        for round in 0..40i64 {
            let batch: Vec<OrderLine> = (0..5)
                .map(|k| (round * 7 + k * 3) % 30 + 1)
                .map(|id| line(id % 4, id))
                .collect();
            sent.extend(batch.iter().filter_map(|l| l.order_line_id));
            r.apply_delta(batch.clone());
            r.apply_delta(batch);
        }

        let mut ids = line_ids(&r);
        assert_eq!(ids.len(), sent.len());
        ids.sort_unstable();
        let mut expected: Vec<i64> = sent.into_iter().collect();
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_sync_result_outcomes() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1)]);

        let ok = ServerMessage::SyncResult(FeedPayload::confirmed());
        assert_eq!(r.handle(ok), Reaction::none());

        let failed = ServerMessage::SyncResult(FeedPayload::failed(
            Some(View::Active),
            "Database error",
        ));
        assert_eq!(r.handle(failed), Reaction::none());
        assert_eq!(line_ids(&r), vec![1]);

        let corrected = ServerMessage::SyncResult(FeedPayload::corrected(
            View::Active,
            vec![line(1, 1), line(3, 9)],
        ));
        let reaction = r.handle(corrected);
        assert!(reaction.rerender);
        assert!(reaction.reply.is_some());
        assert_eq!(line_ids(&r), vec![1, 9]);
    }

    #[test]
    fn test_failed_frames_keep_cache() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1)]);

        let failed_full = ServerMessage::OrdersFull(FeedPayload::failed(
            Some(View::Active),
            "Database error",
        ));
        assert_eq!(r.handle(failed_full), Reaction::none());
        let failed_delta = ServerMessage::OrdersDelta(FeedPayload::failed(None, "Database error"));
        assert_eq!(r.handle(failed_delta), Reaction::none());
        assert_eq!(line_ids(&r), vec![1]);
    }

    #[test]
    fn test_view_switch_clears_and_waits_for_full() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1)]);

        let msg = r.set_view(View::Completed);
        assert_eq!(msg, ClientMessage::SetOrderView { value: View::Completed });
        assert!(r.is_empty());

        // A late delta from the old view and a stale full list are both ignored.
        assert_eq!(r.handle(delta(vec![line(1, 2)])), Reaction::none());
        assert_eq!(r.handle(full(View::Active, vec![line(1, 1)])), Reaction::none());
        assert!(r.is_empty());

        let reaction = r.handle(full(View::Completed, vec![line(5, 3)]));
        assert!(reaction.rerender);
        assert_eq!(
            reaction.reply,
            Some(ClientMessage::SyncConfirm {
                view: View::Completed,
                value: vec![line(5, 3)],
            })
        );

        assert!(r.handle(delta(vec![line(5, 4)])).rerender);
        assert_eq!(line_ids(&r), vec![3, 4]);
    }

    #[test]
    fn test_failed_full_after_switch_releases_deltas() {
        let mut r = Reconciler::new();
        r.set_view(View::Completed);
        let failed = ServerMessage::OrdersFull(FeedPayload::failed(
            Some(View::Completed),
            "Database error",
        ));
        r.handle(failed);

        assert!(r.handle(delta(vec![line(5, 3)])).rerender);
        assert_eq!(line_ids(&r), vec![3]);
    }

    #[test]
    fn test_reconnect_discards_previous_cache() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1), line(1, 2), line(2, 3)]);

        r.begin_session();
        assert!(r.is_empty());

        // The snapshot fails, so the next tick resends the view as a delta.
        let failed = ServerMessage::OrdersFull(FeedPayload::failed(
            Some(View::Active),
            "Database error",
        ));
        assert_eq!(r.handle(failed), Reaction::none());

        let reaction = r.handle(delta(vec![line(2, 3)]));
        assert!(reaction.rerender);
        assert_eq!(line_ids(&r), vec![3]);
        assert_eq!(
            reaction.reply,
            Some(ClientMessage::SyncConfirm {
                view: View::Active,
                value: vec![line(2, 3)],
            })
        );
    }

    #[test]
    fn test_remove_order_drops_all_its_lines() {
        let mut r = Reconciler::new();
        r.apply_full(vec![line(1, 1), line(2, 2), line(1, 3)]);

        assert!(r.remove_order(1));
        assert_eq!(line_ids(&r), vec![2]);
        assert!(!r.remove_order(1));

        // A removed order that comes back is accepted again.
        assert!(r.apply_delta(vec![line(1, 3)]).rerender);
        assert_eq!(line_ids(&r), vec![2, 3]);
    }
}
