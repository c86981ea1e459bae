//! Durable offline queue.
//!
//! Remote writes performed while the store is unreachable are appended here
//! and replayed in `seq` order once connectivity returns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::{from_millis, to_millis, DbError, Result};

/// Kind of remote write waiting to be replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    InsertWithdrawal,
    DeleteWithdrawal,
    /// Relative debit from a withdrawal, applied to the balance current at replay.
    DebitPot,
    /// Absolute balance set by an administrator.
    UpdatePotBalance,
    InsertApiKey,
    UpdateApiKey,
    DeleteApiKey,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsertWithdrawal => "insert_withdrawal",
            Self::DeleteWithdrawal => "delete_withdrawal",
            Self::DebitPot => "debit_pot",
            Self::UpdatePotBalance => "update_pot_balance",
            Self::InsertApiKey => "insert_api_key",
            Self::UpdateApiKey => "update_api_key",
            Self::DeleteApiKey => "delete_api_key",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert_withdrawal" => Ok(Self::InsertWithdrawal),
            "delete_withdrawal" => Ok(Self::DeleteWithdrawal),
            "debit_pot" => Ok(Self::DebitPot),
            "update_pot_balance" => Ok(Self::UpdatePotBalance),
            "insert_api_key" => Ok(Self::InsertApiKey),
            "update_api_key" => Ok(Self::UpdateApiKey),
            "delete_api_key" => Ok(Self::DeleteApiKey),
            other => Err(DbError::Serialization(format!("unknown op kind: {other}"))),
        }
    }
}

/// A queued operation.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedOp {
    pub seq: i64,
    pub kind: OpKind,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Append an operation. Returns its sequence number.
pub fn enqueue(
    conn: &Connection,
    kind: OpKind,
    payload: &serde_json::Value,
    enqueued_at: &DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO offline_queue (kind, payload, enqueued_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![kind.as_str(), payload.to_string(), to_millis(enqueued_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All pending operations in replay order.
pub fn pending(conn: &Connection) -> Result<Vec<QueuedOp>> {
    let mut stmt = conn.prepare(
        "SELECT seq, kind, payload, enqueued_at, attempts, last_error
         FROM offline_queue ORDER BY seq ASC",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(seq, kind, payload, enqueued_at, attempts, last_error)| {
            Ok(QueuedOp {
                seq,
                kind: kind.parse()?,
                payload: serde_json::from_str(&payload)?,
                enqueued_at: from_millis(enqueued_at)?,
                attempts: attempts as u32,
                last_error,
            })
        })
        .collect()
}

/// Remove an operation after it was replayed (or abandoned).
pub fn remove(conn: &Connection, seq: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM offline_queue WHERE seq = ?1", [seq])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("queued op {seq}")));
    }
    Ok(())
}

/// Record a failed replay attempt. Returns the new attempt count.
pub fn record_failure(conn: &Connection, seq: i64, error: &str) -> Result<u32> {
    let attempts: i64 = conn
        .query_row(
            "UPDATE offline_queue SET attempts = attempts + 1, last_error = ?1
             WHERE seq = ?2 RETURNING attempts",
            rusqlite::params![error, seq],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("queued op {seq}")),
            other => DbError::Sqlite(other),
        })?;
    Ok(attempts as u32)
}

/// Number of pending operations.
pub fn len(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM offline_queue", [], |row| row.get(0))?;
    Ok(n as u64)
}
