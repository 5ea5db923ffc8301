//! WebSocket server handler using Axum.

use crate::api;
use crate::config::GatewayConfig;
use crate::connection::ConnectionState;
use crate::error::Result;
use crate::session_gate::{Admission, SessionGate};
use crate::synchronizer::FeedSynchronizer;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use common::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use kitchen_store::{OrderSource, TokenLedger};
use metrics::{counter, gauge};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Outgoing frames buffered per connection.
const OUTBOUND_BUFFER: usize = 64;

/// Shared application state.
pub struct AppState {
    pub gate: SessionGate,
    pub source: Arc<dyn OrderSource>,
    pub ledger: Arc<dyn TokenLedger>,
    pub config: GatewayConfig,
}

impl AppState {
    pub fn new(
        source: Arc<dyn OrderSource>,
        ledger: Arc<dyn TokenLedger>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            gate: SessionGate::new(ledger.clone()),
            source,
            ledger,
            config,
        }
    }
}

/// Create the HTTP and WebSocket router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(api::health_handler))
        .route("/api/login", post(api::login_handler))
        .route("/login", post(api::login_handler))
        .route("/api/finish-order", post(api::finish_order_handler))
        .route("/finish-order", post(api::finish_order_handler))
        .route("/api/unfinish-order", post(api::unfinish_order_handler))
        .route("/unfinish-order", post(api::unfinish_order_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.token))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    counter!("kitchen_connections_total").increment(1);

    if let Admission::Rejected(_) = state.gate.admit(token.as_deref()).await {
        let _ = ws_tx.close().await;
        return;
    }

    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut sync = FeedSynchronizer::new(state.source.clone(), ConnectionState::new());
    let conn_id = sync.state().id;

    gauge!("kitchen_active_connections").increment(1.0);
    info!("Connection {} admitted", conn_id);

    let tick_every = state.config.tick_interval;
    let mut tick = interval_at(Instant::now() + tick_every, tick_every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ping_every = state.config.ping_interval;
    let mut ping = interval_at(Instant::now() + ping_every, ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let snapshot = sync.on_admission().await;
    if send_frame(&tx, &snapshot).await.is_ok() {
        loop {
            tokio::select! {
                biased;

                msg = ws_rx.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                debug!("Ignoring non-UTF-8 frame from {}", conn_id);
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {:?}", conn_id, e);
                            break;
                        }
                    };

                    let Some(client_msg) = ClientMessage::decode(&text) else {
                        debug!("Ignoring unrecognized frame from {}", conn_id);
                        continue;
                    };
                    let reply = sync.on_client_message(client_msg).await;
                    if send_frame(&tx, &reply).await.is_err() {
                        break;
                    }
                }

                _ = tick.tick() => {
                    if let Some(delta) = sync.on_tick().await {
                        if send_frame(&tx, &delta).await.is_err() {
                            break;
                        }
                    }
                }

                _ = ping.tick() => {
                    if tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    send_task.abort();

    counter!("kitchen_disconnections_total").increment(1);
    gauge!("kitchen_active_connections").decrement(1.0);

    info!("Connection {} closed", conn_id);
}

/// Serialize a server frame and queue it for the socket writer.
async fn send_frame(tx: &mpsc::Sender<Message>, msg: &ServerMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json.into())).await?;
    Ok(())
}
