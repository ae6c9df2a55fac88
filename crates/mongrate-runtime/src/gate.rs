//! Connectivity gate.
//!
//! Blocks the run until the data store answers a ping, retrying at a fixed
//! interval. The only retry loop in the system: migrations themselves are
//! never retried.

use std::sync::Arc;

use mongrate_core::config::PingConfig;
use mongrate_core::error::{MigrateError, Result};
use mongrate_core::store::DataStore;
use tracing::{error, info, warn};

/// Waits for the data store to become reachable.
pub struct ConnectivityGate {
    store: Arc<dyn DataStore>,
    config: PingConfig,
}

impl ConnectivityGate {
    pub fn new(store: Arc<dyn DataStore>, config: PingConfig) -> Self {
        Self { store, config }
    }

    /// Ping until the store answers or the retry budget is spent.
    ///
    /// Returns the number of probes sent. A `max_retry` of 0 is treated as 1.
    pub async fn ensure_reachable(&self) -> Result<u32> {
        let max_failures = self.config.max_retry.max(1);
        let mut failures = 0u32;

        loop {
            info!("Pinging database (attempt {})...", failures + 1);

            match self.store.ping().await {
                Ok(()) => {
                    info!("Connected!");
                    return Ok(failures + 1);
                }
                Err(e) => {
                    warn!(
                        "Ping failed: {}; retrying in {}ms",
                        e, self.config.retry_sleep_ms
                    );
                    tokio::time::sleep(self.config.retry_sleep()).await;
                    failures += 1;

                    if failures >= max_failures {
                        error!("Max retry exceeded after {} attempt(s): {}", failures, e);
                        return Err(MigrateError::Connectivity {
                            attempts: failures,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongrate_core::testing::MemoryStore;

    fn config(max_retry: u32) -> PingConfig {
        PingConfig {
            max_retry,
            retry_sleep_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_reachable_first_try() {
        let store = Arc::new(MemoryStore::new());
        let gate = ConnectivityGate::new(store.clone(), config(5));

        assert_eq!(gate.ensure_reachable().await.unwrap(), 1);
        assert_eq!(store.ping_attempts(), 1);
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let store = Arc::new(MemoryStore::new().with_ping_failures(4));
        let gate = ConnectivityGate::new(store.clone(), config(5));

        assert_eq!(gate.ensure_reachable().await.unwrap(), 5);
        assert_eq!(store.ping_attempts(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_budget() {
        let store = Arc::new(MemoryStore::new().unreachable());
        let gate = ConnectivityGate::new(store.clone(), config(5));

        let err = gate.ensure_reachable().await.unwrap_err();
        assert!(matches!(err, MigrateError::Connectivity { attempts: 5, .. }));
        assert_eq!(err.exit_code(), 255);
        assert_eq!(store.ping_attempts(), 5);
    }

    #[tokio::test]
    async fn test_zero_retries_still_terminates() {
        let store = Arc::new(MemoryStore::new().unreachable());
        let gate = ConnectivityGate::new(store.clone(), config(0));

        assert!(gate.ensure_reachable().await.is_err());
        assert_eq!(store.ping_attempts(), 1);
    }
}
