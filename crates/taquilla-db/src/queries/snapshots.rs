//! Generic JSON snapshots keyed by name.

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

/// Snapshot key for the last synced bet collection.
pub const BETS: &str = "bets";
/// Snapshot key for the last synced draw results.
pub const DRAWS: &str = "draws";
/// Snapshot key recording the last successful remote sync (epoch ms).
pub const LAST_SYNC_AT: &str = "last_sync_at";

/// Read a snapshot. Returns `None` if the key was never written.
pub fn read<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM snapshots WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Write a snapshot, replacing any previous value.
pub fn write<T: Serialize>(conn: &Connection, key: &str, value: &T, updated_at: i64) -> Result<()> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT OR REPLACE INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![key, json, updated_at],
    )?;
    Ok(())
}

/// When a snapshot was last written (epoch ms).
pub fn updated_at(conn: &Connection, key: &str) -> Result<Option<i64>> {
    let at = conn
        .query_row(
            "SELECT updated_at FROM snapshots WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(at)
}
