//! Redis-backed order source and token ledger.
//!
//! The ticketing side writes order lines; the gateway only reads them and toggles
//! the finished set.
//!
//! Layout:
//! - `kitchen:lines` hash: line id -> line JSON
//! - `kitchen:line_ids` sorted set: line id scored by itself, for range scans
//! - `kitchen:finished_orders` set: finished order ids
//! - `kitchen:token:{token}` string: expiry in epoch millis
//! - `kitchen:tokens` sorted set: tokens scored by expiry, for sweeping

use crate::error::{Result, StoreError};
use crate::traits::{OrderSource, TokenLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderLine, View};
use redis::AsyncCommands;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const LINES_KEY: &str = "kitchen:lines";
const LINE_IDS_KEY: &str = "kitchen:line_ids";
const FINISHED_ORDERS_KEY: &str = "kitchen:finished_orders";
const TOKEN_KEY_PREFIX: &str = "kitchen:token:";
const TOKENS_BY_EXPIRY_KEY: &str = "kitchen:tokens";

fn token_key(token: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, token)
}

/// Exclusive lower score bound for `ZRANGEBYSCORE`.
fn exclusive_min(watermark: i64) -> String {
    format!("({}", watermark)
}

async fn connect(client: &redis::Client) -> Result<redis::aio::MultiplexedConnection> {
    let conn = client.get_multiplexed_async_connection().await?;
    Ok(conn)
}

/// Parse a stored line and stamp its finished flag from the finished set.
fn decode_line(json: &str, finished: &HashSet<i64>) -> Result<OrderLine> {
    let mut line: OrderLine = serde_json::from_str(json)?;
    line.finished = finished.contains(&line.order_id);
    Ok(line)
}

/// Order source over Redis.
#[derive(Clone)]
pub struct RedisOrderSource {
    client: redis::Client,
}

impl RedisOrderSource {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    async fn load(&self, view: View, min_score: String) -> Result<Vec<OrderLine>> {
        let mut conn = connect(&self.client).await?;

        let ids: Vec<i64> = conn.zrangebyscore(LINE_IDS_KEY, min_score, "+inf").await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(LINES_KEY)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;
        let finished: HashSet<i64> = conn.smembers(FINISHED_ORDERS_KEY).await?;

        let mut lines = Vec::with_capacity(raw.len());
        for (id, json) in ids.iter().zip(raw) {
            let Some(json) = json else {
                warn!("Line {} indexed but missing from {}", id, LINES_KEY);
                continue;
            };
            let line = decode_line(&json, &finished)?;
            if line.finished == view.is_finished() {
                lines.push(line);
            }
        }

        Ok(lines)
    }
}

#[async_trait]
impl OrderSource for RedisOrderSource {
    async fn fetch_all(&self, view: View) -> Result<Vec<OrderLine>> {
        self.load(view, "-inf".to_string()).await
    }

    async fn fetch_since(&self, view: View, watermark: i64) -> Result<Vec<OrderLine>> {
        self.load(view, exclusive_min(watermark)).await
    }

    async fn set_finished(&self, order_id: i64, finished: bool) -> Result<()> {
        let mut conn = connect(&self.client).await?;
        if finished {
            conn.sadd::<_, _, ()>(FINISHED_ORDERS_KEY, order_id).await?;
        } else {
            conn.srem::<_, _, ()>(FINISHED_ORDERS_KEY, order_id).await?;
        }
        info!("Order {} finished={}", order_id, finished);
        Ok(())
    }
}

/// Token ledger over Redis.
#[derive(Clone)]
pub struct RedisTokenLedger {
    client: redis::Client,
}

impl RedisTokenLedger {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenLedger for RedisTokenLedger {
    async fn lookup(&self, token: &str) -> Result<Option<DateTime<Utc>>> {
        let mut conn = connect(&self.client).await?;
        let millis: Option<i64> = conn.get(token_key(token)).await?;

        match millis {
            Some(ms) => DateTime::from_timestamp_millis(ms)
                .map(Some)
                .ok_or_else(|| StoreError::Corrupt(format!("token expiry {}", ms))),
            None => Ok(None),
        }
    }

    async fn save(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut conn = connect(&self.client).await?;
        let millis = expires_at.timestamp_millis();

        let _: () = redis::pipe()
            .atomic()
            .set(token_key(token), millis)
            .ignore()
            .zadd(TOKENS_BY_EXPIRY_KEY, token, millis)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!("Saved token expiring at {}", expires_at);
        Ok(())
    }

    async fn invalidate(&self, token: &str) -> Result<()> {
        let mut conn = connect(&self.client).await?;

        let _: () = redis::pipe()
            .atomic()
            .del(token_key(token))
            .ignore()
            .zrem(TOKENS_BY_EXPIRY_KEY, token)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = connect(&self.client).await?;
        let expired: Vec<String> = conn
            .zrangebyscore(TOKENS_BY_EXPIRY_KEY, "-inf", now.timestamp_millis())
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = expired.iter().map(|t| token_key(t)).collect();
        let _: () = redis::pipe()
            .atomic()
            .del(&keys)
            .ignore()
            .zrem(TOKENS_BY_EXPIRY_KEY, &expired)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(expired.len() as u64)
    }
}
