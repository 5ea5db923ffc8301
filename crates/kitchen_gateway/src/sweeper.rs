//! Background removal of expired session tokens.
//!
//! Shares nothing with the connection tasks beyond the token ledger itself.

use crate::error::Result;
use chrono::{DateTime, Utc};
use kitchen_store::TokenLedger;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Periodically sweeps the token ledger.
pub struct TokenSweeper {
    ledger: Arc<dyn TokenLedger>,
    every: Duration,
}

impl TokenSweeper {
    pub fn new(ledger: Arc<dyn TokenLedger>, every: Duration) -> Self {
        Self { ledger, every }
    }

    /// Remove tokens that expired at or before `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self.ledger.sweep(now).await?;
        if removed > 0 {
            info!("Cleaned {} expired tokens", removed);
            counter!("kitchen_tokens_swept_total").increment(removed);
        } else {
            debug!("No expired tokens");
        }
        Ok(removed)
    }

    /// Sweep once immediately, then on every interval until shutdown.
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!("Token sweeper started (interval: {:?})", self.every);

        let mut ticker = interval_at(Instant::now() + self.every, self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if let Err(e) = self.sweep_once(Utc::now()).await {
            error!("Startup token cleanup failed: {}", e);
        }

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Token sweeper received shutdown signal");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        error!("Token cleanup failed: {}", e);
                    }
                }
            }
        }

        info!("Token sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use kitchen_store::MemoryTokenLedger;

    #[tokio::test]
    async fn test_sweep_once_removes_only_expired() {
        let ledger = MemoryTokenLedger::new();
        let now = Utc::now();
        ledger.save("a", now - ChronoDuration::minutes(5)).await.unwrap();
        ledger.save("b", now + ChronoDuration::minutes(5)).await.unwrap();

        let sweeper = TokenSweeper::new(Arc::new(ledger.clone()), Duration::from_secs(60));
        assert_eq!(sweeper.sweep_once(now).await.unwrap(), 1);
        assert_eq!(sweeper.sweep_once(now).await.unwrap(), 0);
        assert!(ledger.lookup("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_run_sweeps_at_startup_and_stops_on_shutdown() {
        let ledger = MemoryTokenLedger::new();
        ledger
            .save("stale", Utc::now() - ChronoDuration::minutes(1))
            .await
            .unwrap();

        let sweeper = TokenSweeper::new(Arc::new(ledger.clone()), Duration::from_secs(3600));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        // The startup sweep runs before the loop starts listening.
        for _ in 0..50 {
            if ledger.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ledger.is_empty());

        shutdown_tx.send(()).await.unwrap();
        handle.await.unwrap();
    }
}
