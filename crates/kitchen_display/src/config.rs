//! Display configuration, read from the environment.

use crate::error::{DisplayError, Result};
use crate::layout::LayoutOptions;
use common::ReconnectPolicy;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the display client.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// WebSocket feed endpoint, without the token parameter.
    pub server_url: String,
    /// Base URL of the gateway's HTTP routes.
    pub api_url: String,
    /// Session token. When absent, one is requested with `credential_hash`.
    pub token: Option<String>,
    pub credential_hash: Option<String>,
    /// Card and column budgets, in terminal rows.
    pub layout: LayoutOptions,
    /// Card width, in terminal columns.
    pub card_width: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:1248/ws".to_string(),
            api_url: "http://localhost:1248".to_string(),
            token: None,
            credential_hash: None,
            layout: LayoutOptions::default(),
            card_width: 28,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl DisplayConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let card_height: u32 = parse_or(&lookup, "CARD_HEIGHT", defaults.layout.card_height)?;
        if card_height == 0 {
            return Err(DisplayError::Config(
                "CARD_HEIGHT must be greater than zero".to_string(),
            ));
        }
        let column_height: u32 = parse_or(&lookup, "COLUMN_HEIGHT", card_height)?;
        let card_width: usize = parse_or(&lookup, "CARD_WIDTH", defaults.card_width)?;
        if card_width < 8 {
            return Err(DisplayError::Config(
                "CARD_WIDTH must be at least 8".to_string(),
            ));
        }

        // Zero attempts means retry forever.
        let max_attempts: u32 = parse_or(&lookup, "RECONNECT_MAX_ATTEMPTS", 10)?;
        let reconnect = ReconnectPolicy {
            initial_delay: Duration::from_millis(parse_or(
                &lookup,
                "RECONNECT_INITIAL_DELAY_MS",
                1000,
            )?),
            max_delay: Duration::from_millis(parse_or(&lookup, "RECONNECT_MAX_DELAY_MS", 30_000)?),
            max_attempts: (max_attempts > 0).then_some(max_attempts),
        };

        Ok(Self {
            server_url: non_empty(lookup("DISPLAY_SERVER_URL")).unwrap_or(defaults.server_url),
            api_url: non_empty(lookup("DISPLAY_API_URL"))
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            token: non_empty(lookup("DISPLAY_TOKEN")),
            credential_hash: non_empty(lookup("DISPLAY_CREDENTIAL_HASH")),
            layout: LayoutOptions {
                card_height,
                column_height,
                ..defaults.layout
            },
            card_width,
            reconnect,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map_err(|_| DisplayError::Config(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}
