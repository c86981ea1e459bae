//! Shared remote and cache handles.

use std::collections::HashMap;
use std::sync::Arc;

use taquilla_store::{Gateway, RemoteStore};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::store::{ActiveStore, CacheOnlyStore, ConnectedStore};
use crate::{Cache, Result};

/// One async mutex per pot, created on first use.
///
/// Serializes the check-then-debit sequence so concurrent withdrawals
/// against the same pot cannot both pass validation.
#[derive(Default)]
pub struct PotLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PotLocks {
    /// Wait for exclusive access to `pot`.
    pub async fn acquire(&self, pot: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(pot.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Everything the ledger components share.
pub struct Backend<R> {
    gateway: Gateway<R>,
    cache: Cache,
    locks: PotLocks,
}

impl<R: RemoteStore> Backend<R> {
    pub fn new(gateway: Gateway<R>, cache: Cache) -> Self {
        Self {
            gateway,
            cache,
            locks: PotLocks::default(),
        }
    }

    pub fn gateway(&self) -> &Gateway<R> {
        &self.gateway
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn locks(&self) -> &PotLocks {
        &self.locks
    }

    /// Probe the remote store and pick the store variant for a mutation.
    ///
    /// Only an unreachable remote falls back to the cache. A refusal
    /// (expired credentials, denied policy) is returned so the caller
    /// does not report a queued write as a local-only success.
    pub async fn select(&self) -> Result<ActiveStore<'_, R>> {
        if self.gateway.probe().await? {
            Ok(ActiveStore::Connected(ConnectedStore::new(
                &self.gateway,
                self.cache_only(),
            )))
        } else {
            Ok(ActiveStore::CacheOnly(self.cache_only()))
        }
    }

    /// Pick the store variant for a read. Any failure serves the cache.
    pub async fn select_for_read(&self) -> ActiveStore<'_, R> {
        match self.gateway.probe().await {
            Ok(true) => {
                ActiveStore::Connected(ConnectedStore::new(&self.gateway, self.cache_only()))
            }
            Ok(false) => ActiveStore::CacheOnly(self.cache_only()),
            Err(e) => {
                warn!(error = %e, "remote refused health check, serving cached data");
                ActiveStore::CacheOnly(self.cache_only())
            }
        }
    }

    /// The cache-only variant, regardless of connectivity.
    pub fn cache_only(&self) -> CacheOnlyStore<'_> {
        CacheOnlyStore::new(&self.cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_pot_serializes() {
        let locks = Arc::new(PotLocks::default());
        let guard = locks.acquire("Caja").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("Caja").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.expect("contender completes");
    }

    #[tokio::test]
    async fn test_different_pots_independent() {
        let locks = PotLocks::default();
        let _caja = locks.acquire("Caja").await;
        let _premios = tokio::time::timeout(Duration::from_millis(50), locks.acquire("Premios"))
            .await
            .expect("other pot is not blocked");
    }
}
