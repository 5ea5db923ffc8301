//! HTTP API handlers: health, login and order completion.

use crate::synchronizer::SOURCE_ERROR_MESSAGE;
use crate::ws_server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest {
    credential_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderRequest {
    order_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn failure(status: StatusCode, error: Option<&str>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            success: false,
            error: error.map(str::to_string),
        }),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
pub(crate) async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Exchange the configured credential hash for a session token.
pub(crate) async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(submitted) = req.credential_hash.filter(|h| !h.trim().is_empty()) else {
        return Err(failure(StatusCode::BAD_REQUEST, Some("Missing credentialHash")));
    };
    let Some(expected) = state.config.credential_hash.as_deref() else {
        warn!("Login attempted but no credential hash is configured");
        return Err(failure(StatusCode::SERVICE_UNAVAILABLE, Some("Login disabled")));
    };

    if submitted.trim().to_lowercase() != expected {
        warn!("Login rejected: credential mismatch");
        return Err(failure(StatusCode::UNAUTHORIZED, None));
    }

    let ttl = chrono::Duration::from_std(state.config.token_ttl).map_err(|e| {
        error!("Token TTL out of range: {}", e);
        failure(StatusCode::INTERNAL_SERVER_ERROR, Some("Token store error"))
    })?;
    let token = Uuid::new_v4().to_string();

    if let Err(e) = state.ledger.save(&token, Utc::now() + ttl).await {
        error!("Failed to save token: {}", e);
        return Err(failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("Token store error"),
        ));
    }

    info!("Issued session token");
    Ok(Json(LoginResponse { token }))
}

/// Move an order to the completed view.
pub(crate) async fn finish_order_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    set_finished(&state, req, true).await
}

/// Move an order back to the active view.
pub(crate) async fn unfinish_order_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    set_finished(&state, req, false).await
}

async fn set_finished(
    state: &AppState,
    req: OrderRequest,
    finished: bool,
) -> Result<Json<StatusResponse>, ApiError> {
    let Some(order_id) = req.order_id else {
        return Err(failure(StatusCode::BAD_REQUEST, Some("Missing orderId")));
    };

    match state.source.set_finished(order_id, finished).await {
        Ok(()) => {
            info!("Order {} marked finished={}", order_id, finished);
            Ok(Json(StatusResponse {
                success: true,
                error: None,
            }))
        }
        Err(e) => {
            error!("Failed to update order {}: {}", order_id, e);
            Err(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(SOURCE_ERROR_MESSAGE),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use common::View;
    use kitchen_store::{MemoryOrderSource, MemoryTokenLedger, NewOrderLine, OrderSource, TokenLedger};

    fn app_state(
        source: MemoryOrderSource,
        ledger: MemoryTokenLedger,
        credential_hash: Option<&str>,
    ) -> Arc<AppState> {
        let config = GatewayConfig {
            credential_hash: credential_hash.map(str::to_string),
            ..GatewayConfig::default()
        };
        Arc::new(AppState::new(Arc::new(source), Arc::new(ledger), config))
    }

    fn login(hash: Option<&str>) -> Json<LoginRequest> {
        Json(LoginRequest {
            credential_hash: hash.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_login_issues_reusable_token() {
        let ledger = MemoryTokenLedger::new();
        let state = app_state(MemoryOrderSource::new(), ledger.clone(), Some("abc123"));

        let Json(resp) = login_handler(State(state.clone()), login(Some("ABC123")))
            .await
            .unwrap();

        let expires_at = ledger.lookup(&resp.token).await.unwrap().unwrap();
        assert!(expires_at > Utc::now() + chrono::Duration::days(179));
        assert!(state.gate.admit(Some(&resp.token)).await.is_accepted());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let state = app_state(
            MemoryOrderSource::new(),
            MemoryTokenLedger::new(),
            Some("abc123"),
        );
        let (status, _) = login_handler(State(state.clone()), login(Some("wrong")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = login_handler(State(state), login(None)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let disabled = app_state(MemoryOrderSource::new(), MemoryTokenLedger::new(), None);
        let (status, _) = login_handler(State(disabled), login(Some("abc123")))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_finish_and_unfinish_move_order_between_views() {
        let source = MemoryOrderSource::new();
        source.append_line(NewOrderLine::item(7, "Soup"));
        let state = app_state(source.clone(), MemoryTokenLedger::new(), None);

        let req = || Json(OrderRequest { order_id: Some(7) });
        finish_order_handler(State(state.clone()), req()).await.unwrap();
        assert!(source.fetch_all(View::Active).await.unwrap().is_empty());
        assert_eq!(source.fetch_all(View::Completed).await.unwrap().len(), 1);

        unfinish_order_handler(State(state.clone()), req()).await.unwrap();
        assert_eq!(source.fetch_all(View::Active).await.unwrap().len(), 1);

        let (status, _) = finish_order_handler(State(state), Json(OrderRequest { order_id: None }))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
