//! The withdrawal ledger.
//!
//! Keeps the withdrawal list in memory, newest first, and mirrors every
//! change into the cache database. Debits are validated and applied under
//! the pot's lock so two concurrent withdrawals cannot overdraw it.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use taquilla_db::queries::offline_queue::{self, OpKind};
use taquilla_db::queries::withdrawals;
use taquilla_store::RemoteStore;
use taquilla_types::{Cents, Pot, RecordId, Withdrawal};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::filter::WithdrawalFilter;
use crate::stats::{compute_stats, WithdrawalStats};
use crate::store::LedgerStore;
use crate::sync::{self, SyncReport};
use crate::{Backend, DataSource, LedgerError, Result, SyncStatus};

/// Result of a successful withdrawal.
#[derive(Clone, Debug, Serialize)]
pub struct WithdrawalReceipt {
    pub withdrawal: Withdrawal,
    pub new_balance: Cents,
    pub status: SyncStatus,
    pub message: &'static str,
}

/// A loaded list and where it came from.
#[derive(Clone, Debug, Serialize)]
pub struct Loaded {
    pub withdrawals: Vec<Withdrawal>,
    pub source: DataSource,
}

pub struct WithdrawalLedger<R> {
    backend: Arc<Backend<R>>,
    list: RwLock<Vec<Withdrawal>>,
    /// Held while replaying, so deletes cannot race a replayed insert.
    sync_lock: Mutex<()>,
    max_attempts: u32,
}

impl<R: RemoteStore> WithdrawalLedger<R> {
    /// Open the ledger, restoring the list from the cache mirror.
    pub async fn open(backend: Arc<Backend<R>>, max_attempts: u32) -> Result<Self> {
        let restored = {
            let conn = backend.cache().lock().await;
            withdrawals::list(&conn)?
        };
        info!(cached = restored.len(), "withdrawal ledger opened");
        Ok(Self {
            backend,
            list: RwLock::new(restored),
            sync_lock: Mutex::new(()),
            max_attempts,
        })
    }

    /// Debit `amount` from `pot` and record the withdrawal.
    ///
    /// `pot` is the caller's view of the pot; the stored balance takes
    /// precedence. The caller's view is only used offline for a pot the
    /// cache has never seen.
    pub async fn create_withdrawal(&self, pot: &Pot, amount: Cents) -> Result<WithdrawalReceipt> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let _pot_guard = self.backend.locks().acquire(&pot.name).await;
        let store = self.backend.select().await?;

        let current = match store.read_pot(&pot.name).await? {
            Some(current) => current,
            None if store.status() == SyncStatus::LocalOnly => pot.clone(),
            None => return Err(LedgerError::NotFound(format!("pot '{}'", pot.name))),
        };
        if amount > current.balance {
            warn!(pot = %pot.name, amount, available = current.balance, "withdrawal exceeds balance");
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: current.balance,
            });
        }

        // Millisecond precision, matching what the store and the cache keep.
        let now = Utc::now().trunc_subsecs(3);
        let withdrawal = match store.append_withdrawal(&current.name, amount, &now).await {
            Ok(w) => w,
            Err(e) => {
                error!(pot = %pot.name, amount, error = %e, "withdrawal not recorded");
                return Err(e);
            }
        };

        let mut status = SyncStatus::Synced;
        let debited = match store.debit_pot(&current, amount).await {
            Ok(debited) => debited,
            Err(LedgerError::RemotePolicy(reason)) => {
                // The record exists remotely; the debit must not be lost.
                error!(pot = %current.name, reason, "store refused balance update, queued for replay");
                status = SyncStatus::LocalOnly;
                self.backend.cache_only().debit_pot(&current, amount).await?
            }
            Err(e) => return Err(e),
        };
        if store.status() == SyncStatus::LocalOnly {
            status = SyncStatus::LocalOnly;
        }

        {
            let mut list = self.list.write().await;
            list.insert(0, withdrawal.clone());
            self.persist(&list).await?;
        }

        info!(
            id = %withdrawal.id,
            pot = %debited.name,
            amount,
            new_balance = debited.balance,
            status = ?status,
            "withdrawal recorded"
        );
        Ok(WithdrawalReceipt {
            withdrawal,
            new_balance: debited.balance,
            status,
            message: status.message(),
        })
    }

    /// Delete a withdrawal. The pot balance is not restored.
    pub async fn delete_withdrawal(&self, id: &RecordId) -> Result<SyncStatus> {
        let _sync = self.sync_lock.lock().await;

        if id.is_local() && !self.list.read().await.iter().any(|w| &w.id == id) {
            return Err(LedgerError::NotFound(format!("withdrawal {id}")));
        }

        let store = self.backend.select().await?;
        if let Err(e) = store.remove_withdrawal(id).await {
            error!(%id, error = %e, "withdrawal not deleted");
            return Err(e);
        }

        {
            let mut list = self.list.write().await;
            list.retain(|w| &w.id != id);
            self.persist(&list).await?;
        }
        info!(%id, status = ?store.status(), "withdrawal deleted");
        Ok(store.status())
    }

    /// Load withdrawals matching `filter`, newest first.
    pub async fn load_withdrawals(&self, filter: &WithdrawalFilter) -> Result<Loaded> {
        let store = self.backend.select_for_read().await;
        let (found, source) = store.list_withdrawals(filter).await?;
        if source == DataSource::Cache {
            return Ok(Loaded {
                withdrawals: found,
                source,
            });
        }

        let mut list = self.list.write().await;
        let pending_deletes = {
            let conn = self.backend.cache().lock().await;
            sync::pending_values(&conn, OpKind::DeleteWithdrawal, "remote_id")?
        };
        let mut merged: Vec<Withdrawal> = list
            .iter()
            .filter(|w| w.id.is_local() && filter.matches(w))
            .cloned()
            .collect();
        merged.extend(
            found
                .into_iter()
                .filter(|w| !pending_deletes.contains(&w.id.value)),
        );
        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if filter.is_unfiltered() {
            *list = merged.clone();
            self.persist(&list).await?;
        }
        Ok(Loaded {
            withdrawals: merged,
            source,
        })
    }

    /// In-memory withdrawals from `pot`.
    pub async fn withdrawals_by_pot(&self, pot: &str) -> Vec<Withdrawal> {
        WithdrawalFilter::by_pot(pot).apply(&self.list.read().await)
    }

    /// In-memory withdrawals made within `[start, end]`.
    pub async fn withdrawals_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Withdrawal> {
        WithdrawalFilter::in_range(start, end).apply(&self.list.read().await)
    }

    pub async fn snapshot(&self) -> Vec<Withdrawal> {
        self.list.read().await.clone()
    }

    pub async fn stats(&self) -> WithdrawalStats {
        compute_stats(&self.list.read().await)
    }

    /// Operations waiting in the offline queue.
    pub async fn pending_ops(&self) -> Result<u64> {
        let conn = self.backend.cache().lock().await;
        Ok(offline_queue::len(&conn)?)
    }

    /// Replay the offline queue and adopt the ids the store assigned.
    pub async fn sync_offline(&self) -> Result<SyncReport> {
        let report = {
            let _sync = self.sync_lock.lock().await;
            let report = sync::drain(&self.backend, self.max_attempts).await?;
            if !report.id_swaps.is_empty() {
                let swaps = report.swap_map();
                let mut list = self.list.write().await;
                for w in list.iter_mut() {
                    if let Some(remote) = swaps.get(&w.id) {
                        w.id = remote.clone();
                    }
                }
                self.persist(&list).await?;
            }
            if report.dropped > 0 {
                // A local record whose insert was abandoned will never exist remotely.
                let pending = {
                    let conn = self.backend.cache().lock().await;
                    sync::pending_values(&conn, OpKind::InsertWithdrawal, "local_id")?
                };
                let mut list = self.list.write().await;
                let before = list.len();
                list.retain(|w| !w.id.is_local() || pending.contains(&w.id.value));
                if list.len() != before {
                    warn!(removed = before - list.len(), "discarded local withdrawals the store refused");
                    self.persist(&list).await?;
                }
            }
            report
        };

        if report.replayed > 0 {
            if let Err(e) = self.load_withdrawals(&WithdrawalFilter::all()).await {
                warn!(error = %e, "reload after replay failed");
            }
        }
        Ok(report)
    }

    async fn persist(&self, list: &[Withdrawal]) -> Result<()> {
        let conn = self.backend.cache().lock().await;
        withdrawals::replace_all(&conn, list)?;
        Ok(())
    }
}
