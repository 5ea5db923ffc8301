//! Feed handler for the display.
//!
//! Decodes server frames, feeds them to the [`Reconciler`], and publishes a freshly
//! laid-out [`Board`] whenever the cache changes.

use crate::api::ApiClient;
use crate::error::Result;
use crate::layout::{layout, LayoutOptions};
use crate::reconciler::Reconciler;
use crate::render::{Board, TextMeasure};
use crate::timer::FirstSeen;
use async_trait::async_trait;
use chrono::Utc;
use common::{ClientMessage, ControlCommand, ServerMessage, View, WsHandler};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

/// Display side of one feed subscription, kept across reconnects.
pub struct DisplaySession {
    feed_url: String,
    api: ApiClient,
    layout: LayoutOptions,
    measure: TextMeasure,
    reconciler: Mutex<Reconciler>,
    first_seen: Mutex<FirstSeen>,
    board_tx: watch::Sender<Board>,
}

impl DisplaySession {
    pub fn new(
        server_url: &str,
        token: &str,
        api: ApiClient,
        layout: LayoutOptions,
        measure: TextMeasure,
        board_tx: watch::Sender<Board>,
    ) -> Result<Self> {
        let feed_url = Url::parse_with_params(server_url, &[("token", token)])?;
        Ok(Self {
            feed_url: feed_url.to_string(),
            api,
            layout,
            measure,
            reconciler: Mutex::new(Reconciler::new()),
            first_seen: Mutex::new(FirstSeen::new()),
            board_tx,
        })
    }

    fn reconciler(&self) -> MutexGuard<'_, Reconciler> {
        self.reconciler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, reconciler: &Reconciler) {
        let view = reconciler.view();
        let mut board = Board {
            view,
            layout: layout(reconciler.lines(), &self.layout, view, &self.measure),
        };
        self.anchor_timers(&mut board);
        self.board_tx.send_replace(board);
    }

    /// Give cards without a send time the instant their order was first drawn.
    fn anchor_timers(&self, board: &mut Board) {
        let now = Utc::now();
        let mut first_seen = self.first_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let on_board: HashSet<i64> = board.layout.cards().map(|c| c.order_id).collect();
        first_seen.retain(|order_id| on_board.contains(&order_id));

        for card in board.layout.columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
            card.active_at = Some(first_seen.resolve(card.order_id, card.active_at, now));
        }
    }

    /// Finish or unfinish through the HTTP API, then drop the order locally.
    async fn move_order(&self, order_id: i64, finished: bool) {
        let result = if finished {
            self.api.finish_order(order_id).await
        } else {
            self.api.unfinish_order(order_id).await
        };

        match result {
            Ok(()) => {
                info!("Order {} marked finished={}", order_id, finished);
                let mut reconciler = self.reconciler();
                if reconciler.remove_order(order_id) {
                    self.publish(&reconciler);
                }
            }
            Err(e) => warn!("Failed to update order {}: {}", order_id, e),
        }
    }
}

fn encode(msg: &ClientMessage) -> common::Result<String> {
    Ok(serde_json::to_string(msg)?)
}

#[async_trait]
impl WsHandler for DisplaySession {
    fn url(&self) -> String {
        self.feed_url.clone()
    }

    /// The gateway starts every connection on the active view.
    fn on_connect_message(&self) -> Option<String> {
        let view = self.reconciler().view();
        if view == View::Active {
            return None;
        }
        encode(&ClientMessage::SetOrderView { value: view }).ok()
    }

    async fn on_message(&self, msg: &str) -> common::Result<Vec<String>> {
        let Some(server_msg) = ServerMessage::decode(msg) else {
            debug!("Ignoring unrecognized frame");
            return Ok(Vec::new());
        };
        debug!("Received {}", server_msg.kind());

        let mut reconciler = self.reconciler();
        let reaction = reconciler.handle(server_msg);
        if reaction.rerender {
            self.publish(&reconciler);
        }
        drop(reconciler);

        match reaction.reply {
            Some(reply) => Ok(vec![encode(&reply)?]),
            None => Ok(Vec::new()),
        }
    }

    async fn on_disconnect(&self) {
        warn!("Feed connection lost");
    }

    async fn on_reconnect(&self) {
        let mut reconciler = self.reconciler();
        reconciler.begin_session();
        self.publish(&reconciler);
        drop(reconciler);
        info!("Feed connected");
    }

    async fn handle_command(&self, cmd: ControlCommand) -> common::Result<Option<String>> {
        match cmd {
            ControlCommand::SetView(view) => {
                let msg = {
                    let mut reconciler = self.reconciler();
                    let msg = reconciler.set_view(view);
                    self.publish(&reconciler);
                    msg
                };
                Ok(Some(encode(&msg)?))
            }
            ControlCommand::FinishOrder(order_id) => {
                self.move_order(order_id, true).await;
                Ok(None)
            }
            ControlCommand::UnfinishOrder(order_id) => {
                self.move_order(order_id, false).await;
                Ok(None)
            }
            ControlCommand::Shutdown => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextRenderer;

    fn session() -> (DisplaySession, watch::Receiver<Board>) {
        let (board_tx, board_rx) = watch::channel(Board::default());
        let session = DisplaySession::new(
            "ws://localhost:1248/ws",
            "tok en",
            ApiClient::new("http://localhost:1248"),
            LayoutOptions::default(),
            TextRenderer::new(28, 1).measure(),
            board_tx,
        )
        .unwrap();
        (session, board_rx)
    }

    const FULL: &str = r#"{"type":"orders-full","success":true,"view":"active","value":[
        {"orderId":1,"orderLineId":1,"itemName":"Chips"},
        {"orderId":1,"orderLineId":2,"itemName":"","message":"no salt"}
    ]}"#;

    #[test]
    fn test_url_carries_encoded_token() {
        let (session, _) = session();
        assert_eq!(session.url(), "ws://localhost:1248/ws?token=tok+en");
    }

    #[tokio::test]
    async fn test_full_list_publishes_board_and_confirms() {
        let (session, board_rx) = session();
        let replies = session.on_message(FULL).await.unwrap();

        assert_eq!(replies.len(), 1);
        match ClientMessage::decode(&replies[0]) {
            Some(ClientMessage::SyncConfirm { view, value }) => {
                assert_eq!(view, View::Active);
                assert_eq!(value.len(), 2);
            }
            other => panic!("unexpected reply {:?}", other),
        }

        let board = board_rx.borrow();
        assert_eq!(board.layout.order_count(), 1);
        let card = board.layout.cards().next().unwrap();
        assert_eq!(card.items[0].messages, vec!["no salt"]);
    }

    #[tokio::test]
    async fn test_malformed_frames_are_ignored() {
        let (session, board_rx) = session();
        assert!(session.on_message("not json").await.unwrap().is_empty());
        assert!(session
            .on_message(r#"{"type":"mystery"}"#)
            .await
            .unwrap()
            .is_empty());
        assert!(!board_rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_set_view_clears_board_and_resubscribes_on_reconnect() {
        let (session, board_rx) = session();
        session.on_message(FULL).await.unwrap();

        let frame = session
            .handle_command(ControlCommand::SetView(View::Completed))
            .await
            .unwrap();
        assert_eq!(
            frame.as_deref(),
            Some(r#"{"type":"set-order-view","value":"completed"}"#)
        );
        assert_eq!(board_rx.borrow().view, View::Completed);
        assert!(board_rx.borrow().layout.is_empty());

        assert_eq!(
            session.on_connect_message().as_deref(),
            Some(r#"{"type":"set-order-view","value":"completed"}"#)
        );
    }

    #[tokio::test]
    async fn test_deltas_wait_for_full_after_reconnect() {
        let (session, board_rx) = session();
        session.on_message(FULL).await.unwrap();
        session.on_reconnect().await;
        assert!(board_rx.borrow().layout.is_empty());

        let delta = r#"{"type":"orders-delta","success":true,"value":[{"orderId":2,"orderLineId":9,"itemName":"Tea"}]}"#;
        assert!(session.on_message(delta).await.unwrap().is_empty());
        assert!(board_rx.borrow().layout.is_empty());

        session.on_message(FULL).await.unwrap();
        session.on_message(delta).await.unwrap();
        assert_eq!(board_rx.borrow().layout.order_count(), 2);
    }

    #[tokio::test]
    async fn test_orders_without_send_time_keep_their_first_draw_time() {
        let (session, board_rx) = session();
        session.on_message(FULL).await.unwrap();
        let first = board_rx.borrow().layout.cards().next().unwrap().active_at;
        assert!(first.is_some());

        let delta = r#"{"type":"orders-delta","success":true,"value":[{"orderId":1,"orderLineId":3,"itemName":"Peas"}]}"#;
        session.on_message(delta).await.unwrap();
        let board = board_rx.borrow();
        assert_eq!(board.layout.cards().next().unwrap().active_at, first);
    }
}
