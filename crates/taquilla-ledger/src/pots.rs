//! Pot listing and administration.

use std::sync::Arc;

use taquilla_store::RemoteStore;
use taquilla_types::{Cents, Pot};
use tracing::info;

use crate::store::LedgerStore;
use crate::{Backend, LedgerError, Result, SyncStatus};

/// Read and administer pots. Balance debits go through the withdrawal ledger.
pub struct PotBook<R> {
    backend: Arc<Backend<R>>,
}

impl<R: RemoteStore> PotBook<R> {
    pub fn new(backend: Arc<Backend<R>>) -> Self {
        Self { backend }
    }

    /// All pots, refreshing the cache when the store is reachable.
    pub async fn load(&self) -> Result<Vec<Pot>> {
        self.backend.select_for_read().await.list_pots().await
    }

    /// Pots that can currently fund a withdrawal.
    pub async fn with_balance(&self) -> Result<Vec<Pot>> {
        let mut pots = self.load().await?;
        pots.retain(|p| p.balance > 0);
        Ok(pots)
    }

    pub async fn get(&self, name: &str) -> Result<Option<Pot>> {
        self.backend.select_for_read().await.read_pot(name).await
    }

    pub async fn balance_of(&self, name: &str) -> Result<Option<Cents>> {
        Ok(self.get(name).await?.map(|p| p.balance))
    }

    /// Create a pot or overwrite an existing pot's balance and colour.
    pub async fn upsert(&self, pot: Pot) -> Result<(Pot, SyncStatus)> {
        if pot.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("pot name is required".into()));
        }
        let _guard = self.backend.locks().acquire(&pot.name).await;
        let store = self.backend.select().await?;

        let saved = match store.read_pot(&pot.name).await? {
            Some(_) => {
                store.write_pot(&pot).await?;
                pot
            }
            None => store.create_pot(&pot).await?,
        };
        info!(pot = %saved.name, balance = saved.balance, status = ?store.status(), "pot saved");
        Ok((saved, store.status()))
    }
}
