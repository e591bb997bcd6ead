//! Single-flight refresh coordination.
//!
//! Refresh tokens rotate: once an exchange succeeds the old token is spent.
//! Every caller presenting the same refresh token therefore has to share
//! one exchange, including callers that arrive just after it finished with
//! a credential snapshot taken before the rotation.
//!
//! The shared outcome is the finished [`Credential`], so a late caller gets
//! the absolute expiry computed when the grant arrived.

use crate::credential::Credential;
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::debug;

/// How long a successful refresh is replayed to late callers.
pub const DEFAULT_RETAIN: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Slot {
    outcome: OnceCell<Result<Credential>>,
    created: Instant,
}

/// Coalesces refresh exchanges keyed by the refresh token being spent.
#[derive(Debug)]
pub struct RefreshCoalescer {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    retain: Duration,
}

impl Default for RefreshCoalescer {
    fn default() -> Self {
        Self::new(DEFAULT_RETAIN)
    }
}

impl RefreshCoalescer {
    pub fn new(retain: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            retain,
        }
    }

    /// Run `exchange` for `refresh_token` unless an exchange for the same
    /// token is in flight or recently succeeded, in which case its outcome
    /// is returned instead.
    ///
    /// Failed outcomes are dropped once delivered so a later call retries.
    pub async fn run<F, Fut>(&self, refresh_token: &str, exchange: F) -> Result<Credential>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Credential>>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            let retain = self.retain;
            slots.retain(|_, slot| {
                slot.outcome.get().is_none() || slot.created.elapsed() < retain
            });
            Arc::clone(slots.entry(refresh_token.to_string()).or_insert_with(|| {
                Arc::new(Slot {
                    outcome: OnceCell::new(),
                    created: Instant::now(),
                })
            }))
        };

        if slot.outcome.initialized() {
            debug!("Reusing recent refresh outcome");
        }

        let outcome = slot.outcome.get_or_init(exchange).await.clone();

        if outcome.is_err() {
            let mut slots = self.slots.lock().await;
            if slots
                .get(refresh_token)
                .is_some_and(|current| Arc::ptr_eq(current, &slot))
            {
                slots.remove(refresh_token);
            }
        }

        outcome
    }

    /// Number of tracked refresh tokens (in flight or retained).
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}
