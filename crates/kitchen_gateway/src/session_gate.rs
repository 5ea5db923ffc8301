//! Connection admission against the token ledger.
//!
//! Tokens stay valid for repeated connections until they expire. An expired token
//! is removed from the ledger the first time it is presented.

use chrono::{DateTime, Utc};
use kitchen_store::TokenLedger;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a connection was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No token, or one the ledger has never seen.
    Unknown,
    /// The token's expiry has passed.
    Expired,
    /// The ledger could not be consulted.
    Storage(String),
}

impl RejectReason {
    fn label(&self) -> &'static str {
        match self {
            RejectReason::Unknown => "unknown",
            RejectReason::Expired => "expired",
            RejectReason::Storage(_) => "storage",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Storage(e) => write!(f, "storage error: {}", e),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

/// Validates connection tokens.
#[derive(Clone)]
pub struct SessionGate {
    ledger: Arc<dyn TokenLedger>,
}

impl SessionGate {
    pub fn new(ledger: Arc<dyn TokenLedger>) -> Self {
        Self { ledger }
    }

    /// Admit or reject a connection presenting `token`.
    pub async fn admit(&self, token: Option<&str>) -> Admission {
        self.admit_at(token, Utc::now()).await
    }

    /// Admission check against an explicit clock reading.
    pub async fn admit_at(&self, token: Option<&str>, now: DateTime<Utc>) -> Admission {
        let admission = self.check(token, now).await;
        match &admission {
            Admission::Accepted => {
                counter!("kitchen_admissions_accepted_total").increment(1);
                info!("Token accepted");
            }
            Admission::Rejected(reason) => {
                counter!("kitchen_admissions_rejected_total", "reason" => reason.label())
                    .increment(1);
                match reason {
                    RejectReason::Storage(_) => error!("Token validation failed: {}", reason),
                    _ => warn!("Connection rejected: {}", reason),
                }
            }
        }
        admission
    }

    async fn check(&self, token: Option<&str>, now: DateTime<Utc>) -> Admission {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Admission::Rejected(RejectReason::Unknown);
        };

        let expires_at = match self.ledger.lookup(token).await {
            Ok(Some(expires_at)) => expires_at,
            Ok(None) => return Admission::Rejected(RejectReason::Unknown),
            Err(e) => return Admission::Rejected(RejectReason::Storage(e.to_string())),
        };

        if now > expires_at {
            if let Err(e) = self.ledger.invalidate(token).await {
                // Still rejected; the sweeper will remove it later.
                warn!("Failed to remove expired token: {}", e);
            } else {
                debug!("Removed expired token");
            }
            return Admission::Rejected(RejectReason::Expired);
        }

        Admission::Accepted
    }
}
