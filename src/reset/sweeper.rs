use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::rate_limit::ClientRateLimiter;

use super::store::TokenStore;

/// Periodically purge expired reset tokens and stale rate-limit windows until
/// shutdown is signalled.
pub fn spawn(
    store: Arc<dyn TokenStore>,
    limiters: Vec<Arc<ClientRateLimiter>>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::debug!("Token sweeper started (every {}s)", every.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }

            run_once(store.as_ref(), &limiters);
        }

        tracing::debug!("Token sweeper stopped");
    })
}

pub fn run_once(store: &dyn TokenStore, limiters: &[Arc<ClientRateLimiter>]) -> usize {
    let purged = store.purge_expired(Utc::now());
    if purged > 0 {
        tracing::info!("Purged {purged} expired reset tokens");
    }

    for limiter in limiters {
        limiter.cleanup();
    }

    purged
}
