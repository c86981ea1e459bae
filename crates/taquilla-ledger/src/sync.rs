//! Offline queue payloads and replay.
//!
//! Writes made while the remote store is unreachable are queued in the cache
//! database. [`drain`] replays them in order once the store answers again:
//!
//! 1. Probe. Nothing is attempted while the store is still unreachable.
//! 2. Replay each queued op in `seq` order.
//! 3. Success removes the op. A connectivity failure stops the drain and
//!    keeps the op. Any other failure counts an attempt; once an op reaches
//!    the attempt limit it is dropped and logged as an error.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use taquilla_db::queries::offline_queue::{self, OpKind, QueuedOp};
use taquilla_db::queries::snapshots;
use taquilla_store::{rows, Filter, Query, RemoteStore, StoreError, Table};
use taquilla_types::{ApiKey, Cents, Pot, RecordId};
use tracing::{error, info, warn};

use crate::api_keys::ApiKeyPatch;
use crate::{now_millis, Backend, LedgerError, Result};

/// Default attempt limit for ops the store keeps refusing.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Withdrawal recorded while offline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedInsert {
    pub local_id: String,
    pub from_pot: String,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDelete {
    pub remote_id: String,
}

/// Withdrawal debit recorded while the store could not take it. Replayed
/// against whatever balance the store holds at the time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDebit {
    pub pot: String,
    pub amount: Cents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedKeyUpdate {
    pub id: String,
    pub patch: ApiKeyPatch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedKeyDelete {
    pub id: String,
}

/// Outcome of one drain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Whether the store answered the probe.
    pub connected: bool,
    pub replayed: u32,
    /// Refused this round, kept for another attempt.
    pub failed: u32,
    /// Refused too many times and abandoned.
    pub dropped: u32,
    /// Ops still queued after the drain.
    pub remaining: u64,
    /// Local withdrawal ids replaced by the ids the store assigned.
    pub id_swaps: Vec<(RecordId, RecordId)>,
}

impl SyncReport {
    pub fn swap_map(&self) -> HashMap<RecordId, RecordId> {
        self.id_swaps.iter().cloned().collect()
    }
}

pub(crate) fn encode<T: Serialize>(payload: &T) -> Result<serde_json::Value> {
    serde_json::to_value(payload)
        .map_err(|e| LedgerError::Cache(taquilla_db::DbError::Serialization(e.to_string())))
}

fn decode<T: DeserializeOwned>(op: &QueuedOp) -> std::result::Result<T, StoreError> {
    serde_json::from_value(op.payload.clone())
        .map_err(|e| StoreError::Decode(format!("queued {} payload: {e}", op.kind)))
}

/// String values of `field` across pending ops of `kind`.
pub(crate) fn pending_values(
    conn: &rusqlite::Connection,
    kind: OpKind,
    field: &str,
) -> Result<HashSet<String>> {
    Ok(offline_queue::pending(conn)?
        .into_iter()
        .filter(|op| op.kind == kind)
        .filter_map(|op| op.payload.get(field).and_then(|v| v.as_str()).map(str::to_string))
        .collect())
}

/// Name of the pot a queued balance op touches.
pub(crate) fn queued_pot(op: &QueuedOp) -> Option<&str> {
    let field = match op.kind {
        OpKind::DebitPot => "pot",
        OpKind::UpdatePotBalance => "name",
        _ => return None,
    };
    op.payload.get(field).and_then(|v| v.as_str())
}

/// Balance of `pot` once every queued op for it has been replayed on top of
/// `remote`.
pub(crate) fn pending_balance(ops: &[QueuedOp], pot: &str, remote: Cents) -> Cents {
    ops.iter()
        .filter(|op| queued_pot(op) == Some(pot))
        .fold(remote, |balance, op| match op.kind {
            OpKind::DebitPot => decode::<QueuedDebit>(op)
                .map(|d| balance.saturating_sub(d.amount))
                .unwrap_or(balance),
            OpKind::UpdatePotBalance => decode::<Pot>(op).map(|p| p.balance).unwrap_or(balance),
            _ => balance,
        })
}

/// Remove the pending op of `kind` whose `field` equals `value`.
/// Returns whether one was found.
pub(crate) fn drop_pending(
    conn: &rusqlite::Connection,
    kind: OpKind,
    field: &str,
    value: &str,
) -> Result<bool> {
    let found = offline_queue::pending(conn)?
        .into_iter()
        .find(|op| op.kind == kind && op.payload.get(field).and_then(|v| v.as_str()) == Some(value));
    match found {
        Some(op) => {
            offline_queue::remove(conn, op.seq)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Replay one op. Returns an id swap for replayed withdrawal inserts.
async fn replay<R: RemoteStore>(
    backend: &Backend<R>,
    op: &QueuedOp,
) -> std::result::Result<Option<(RecordId, RecordId)>, StoreError> {
    let gateway = backend.gateway();
    match op.kind {
        OpKind::InsertWithdrawal => {
            let queued: QueuedInsert = decode(op)?;
            let row = rows::withdrawal_insert(&queued.from_pot, queued.amount, &queued.created_at);
            let stored = rows::withdrawal(&gateway.insert(Table::Withdrawals, row).await?)?;
            Ok(Some((RecordId::local(queued.local_id), stored.id)))
        }
        OpKind::DeleteWithdrawal => {
            let queued: QueuedDelete = decode(op)?;
            gateway.delete(Table::Withdrawals, &queued.remote_id).await?;
            Ok(None)
        }
        OpKind::DebitPot => {
            let queued: QueuedDebit = decode(op)?;
            let query = Query::new(Table::Pots)
                .filter(Filter::eq("name", queued.pot.as_str()))
                .limit(1);
            let Some(row) = gateway.query(&query).await?.into_iter().next() else {
                return Err(StoreError::Policy(format!("pot '{}' no longer exists", queued.pot)));
            };
            let mut pot = rows::pot(&row)?;
            pot.balance = pot.balance.checked_sub(queued.amount).ok_or_else(|| {
                StoreError::Policy(format!(
                    "pot '{}' holds {} and cannot cover a debit of {}",
                    pot.name, pot.balance, queued.amount
                ))
            })?;
            gateway.update(Table::Pots, &pot.name, rows::pot_row(&pot)).await?;
            Ok(None)
        }
        OpKind::UpdatePotBalance => {
            // Absolute balance; the last queued value for a pot wins.
            let pot: Pot = decode(op)?;
            gateway.update(Table::Pots, &pot.name, rows::pot_row(&pot)).await?;
            Ok(None)
        }
        OpKind::InsertApiKey => {
            let key: ApiKey = decode(op)?;
            gateway.insert(Table::ApiKeys, rows::api_key_row(&key)?).await?;
            Ok(None)
        }
        OpKind::UpdateApiKey => {
            let queued: QueuedKeyUpdate = decode(op)?;
            gateway
                .update(Table::ApiKeys, &queued.id, rows::to_row(&queued.patch)?)
                .await?;
            Ok(None)
        }
        OpKind::DeleteApiKey => {
            let queued: QueuedKeyDelete = decode(op)?;
            gateway.delete(Table::ApiKeys, &queued.id).await?;
            Ok(None)
        }
    }
}

/// Replay the offline queue against the remote store.
pub async fn drain<R: RemoteStore>(backend: &Backend<R>, max_attempts: u32) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    let connected = match backend.gateway().probe().await {
        Ok(connected) => connected,
        Err(e) => {
            warn!(error = %e, "remote refused health check, offline queue left in place");
            false
        }
    };
    if !connected {
        let conn = backend.cache().lock().await;
        report.remaining = offline_queue::len(&conn)?;
        return Ok(report);
    }
    report.connected = true;

    let ops = {
        let conn = backend.cache().lock().await;
        offline_queue::pending(&conn)?
    };
    if ops.is_empty() {
        return Ok(report);
    }
    info!(pending = ops.len(), "replaying offline queue");

    for op in &ops {
        // Balance ops hold the pot's lock so a withdrawal cannot read the
        // store between the replayed write and the op's removal.
        let _pot_guard = match queued_pot(op) {
            Some(pot) => Some(backend.locks().acquire(pot).await),
            None => None,
        };
        match replay(backend, op).await {
            Ok(swap) => {
                let conn = backend.cache().lock().await;
                offline_queue::remove(&conn, op.seq)?;
                report.replayed += 1;
                report.id_swaps.extend(swap);
            }
            Err(StoreError::Connectivity(reason)) => {
                warn!(seq = op.seq, kind = %op.kind, reason, "store unreachable during replay, stopping");
                break;
            }
            Err(e) => {
                let conn = backend.cache().lock().await;
                let attempts = offline_queue::record_failure(&conn, op.seq, &e.to_string())?;
                if attempts >= max_attempts {
                    error!(
                        seq = op.seq,
                        kind = %op.kind,
                        payload = %op.payload,
                        attempts,
                        error = %e,
                        "dropping queued op refused by the store"
                    );
                    offline_queue::remove(&conn, op.seq)?;
                    report.dropped += 1;
                } else {
                    warn!(seq = op.seq, kind = %op.kind, attempts, error = %e, "queued op refused");
                    report.failed += 1;
                }
            }
        }
    }

    let conn = backend.cache().lock().await;
    report.remaining = offline_queue::len(&conn)?;
    snapshots::write(&conn, snapshots::LAST_SYNC_AT, &Utc::now(), now_millis())?;
    info!(
        replayed = report.replayed,
        failed = report.failed,
        dropped = report.dropped,
        remaining = report.remaining,
        "offline queue drained"
    );
    Ok(report)
}
