//! HTTP client for the gateway's login and order routes.

use crate::error::{DisplayError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    credential_hash: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest {
    order_id: i64,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the gateway HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Exchange a credential hash for a session token.
    pub async fn login(&self, credential_hash: &str) -> Result<String> {
        let url = format!("{}/api/login", self.base_url);
        debug!("Logging in at {}", url);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { credential_hash })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DisplayError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: LoginResponse = response.json().await?;
        info!("Obtained session token");
        Ok(body.token)
    }

    /// Mark an order finished.
    pub async fn finish_order(&self, order_id: i64) -> Result<()> {
        self.post_order("finish-order", order_id).await
    }

    /// Return a finished order to the active view.
    pub async fn unfinish_order(&self, order_id: i64) -> Result<()> {
        self.post_order("unfinish-order", order_id).await
    }

    async fn post_order(&self, route: &str, order_id: i64) -> Result<()> {
        let url = format!("{}/api/{}", self.base_url, route);
        debug!("POST {} for order {}", url, order_id);

        let response = self
            .http
            .post(&url)
            .json(&OrderRequest { order_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DisplayError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: StatusResponse = response.json().await?;
        if !body.success {
            return Err(DisplayError::Api {
                status: status.as_u16(),
                body: body.error.unwrap_or_else(|| "rejected".to_string()),
            });
        }
        Ok(())
    }
}
