//! Feed synchronizer: order source → one display connection.
//!
//! The synchronizer owns a connection's [`ConnectionState`] and turns each event
//! (admission, tick, client frame) into at most one server frame. It never runs two
//! transitions at once; the connection loop awaits each call before the next.
//!
//! Store failures are answered in-band with a failed frame of the same type and
//! leave the watermarks untouched.

use crate::connection::ConnectionState;
use common::model::{lines_match, max_order_line_id};
use common::{ClientMessage, FeedPayload, OrderLine, ServerMessage, View};
use kitchen_store::OrderSource;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Error text sent to clients when the order source fails.
pub const SOURCE_ERROR_MESSAGE: &str = "Database error";

/// Per-connection feed state machine.
pub struct FeedSynchronizer {
    source: Arc<dyn OrderSource>,
    state: ConnectionState,
}

impl FeedSynchronizer {
    pub fn new(source: Arc<dyn OrderSource>, state: ConnectionState) -> Self {
        Self { source, state }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// First frame of a freshly admitted connection: the full active view.
    pub async fn on_admission(&mut self) -> ServerMessage {
        let view = self.state.view;
        self.full_snapshot(view).await
    }

    /// Periodic poll. `None` means nothing changed since the watermark.
    pub async fn on_tick(&mut self) -> Option<ServerMessage> {
        let view = self.state.view;
        let watermark = self.state.watermarks.get(view);

        match self.source.fetch_since(view, watermark).await {
            Ok(items) if items.is_empty() => None,
            Ok(items) => {
                let high = max_order_line_id(&items, watermark);
                self.state.watermarks.advance(view, high);
                debug!(
                    "[{}] Delta for {}: {} lines, watermark {} -> {}",
                    self.state.id,
                    view,
                    items.len(),
                    watermark,
                    high
                );
                counter!("kitchen_deltas_sent_total").increment(1);
                Some(ServerMessage::OrdersDelta(FeedPayload::ok(None, items)))
            }
            Err(e) => {
                error!("[{}] Delta fetch for {} failed: {}", self.state.id, view, e);
                counter!("kitchen_source_errors_total", "op" => "delta").increment(1);
                Some(ServerMessage::OrdersDelta(FeedPayload::failed(
                    None,
                    SOURCE_ERROR_MESSAGE,
                )))
            }
        }
    }

    /// React to a decoded client frame.
    pub async fn on_client_message(&mut self, msg: ClientMessage) -> ServerMessage {
        match msg {
            ClientMessage::SetOrderView { value } => self.set_view(value).await,
            ClientMessage::SyncConfirm { view, value } => self.confirm(view, &value).await,
        }
    }

    /// Switch views with a forced full resync of the new view.
    ///
    /// The view and its watermark are reset before the fetch, so a failed snapshot
    /// still leaves the connection on `view` with watermark 0.
    pub async fn set_view(&mut self, view: View) -> ServerMessage {
        info!("[{}] Switching view {} -> {}", self.state.id, self.state.view, view);
        self.state.view = view;
        self.state.watermarks.reset(view);
        self.full_snapshot(view).await
    }

    /// Compare the client's cache of `view` against the store.
    pub async fn confirm(&mut self, view: View, client_items: &[OrderLine]) -> ServerMessage {
        let server_items = match self.source.fetch_all(view).await {
            Ok(items) => items,
            Err(e) => {
                error!("[{}] Sync confirm for {} failed: {}", self.state.id, view, e);
                counter!("kitchen_source_errors_total", "op" => "confirm").increment(1);
                return ServerMessage::SyncResult(FeedPayload::failed(
                    Some(view),
                    SOURCE_ERROR_MESSAGE,
                ));
            }
        };

        if lines_match(&server_items, client_items) {
            debug!("[{}] Client in sync on {} ({} lines)", self.state.id, view, server_items.len());
            return ServerMessage::SyncResult(FeedPayload::confirmed());
        }

        info!(
            "[{}] Client diverged on {}: client {} lines, server {} lines",
            self.state.id,
            view,
            client_items.len(),
            server_items.len()
        );
        counter!("kitchen_sync_mismatches_total").increment(1);
        let high = max_order_line_id(&server_items, self.state.watermarks.get(view));
        self.state.watermarks.advance(view, high);
        ServerMessage::SyncResult(FeedPayload::corrected(view, server_items))
    }

    async fn full_snapshot(&mut self, view: View) -> ServerMessage {
        match self.source.fetch_all(view).await {
            Ok(items) => {
                let high = max_order_line_id(&items, self.state.watermarks.get(view));
                self.state.watermarks.advance(view, high);
                debug!(
                    "[{}] Snapshot for {}: {} lines, watermark {}",
                    self.state.id,
                    view,
                    items.len(),
                    high
                );
                counter!("kitchen_snapshots_sent_total").increment(1);
                ServerMessage::OrdersFull(FeedPayload::ok(Some(view), items))
            }
            Err(e) => {
                error!("[{}] Snapshot for {} failed: {}", self.state.id, view, e);
                counter!("kitchen_source_errors_total", "op" => "full").increment(1);
                ServerMessage::OrdersFull(FeedPayload::failed(Some(view), SOURCE_ERROR_MESSAGE))
            }
        }
    }
}
