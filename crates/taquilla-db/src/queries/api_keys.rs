//! API key mirror.

use rusqlite::Connection;
use taquilla_types::ApiKey;

use crate::{from_millis, to_millis, DbError, Result};

type RawRow = (
    String,
    String,
    String,
    String,
    String,
    bool,
    String,
    i64,
    Option<String>,
    Option<i64>,
);

fn decode(raw: RawRow) -> Result<ApiKey> {
    let (id, name, key_prefix, key_hash, description, is_active, permissions, created_at, created_by, last_used_at) =
        raw;
    Ok(ApiKey {
        id,
        name,
        key_prefix,
        key_hash,
        description,
        is_active,
        permissions: serde_json::from_str(&permissions)?,
        created_at: from_millis(created_at)?,
        created_by,
        last_used_at: last_used_at.map(from_millis).transpose()?,
    })
}

/// List cached keys, newest first.
pub fn list(conn: &Connection) -> Result<Vec<ApiKey>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, key_prefix, key_hash, description, is_active, permissions,
                created_at, created_by, last_used_at
         FROM api_keys ORDER BY created_at DESC, id ASC",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?
        .collect::<std::result::Result<Vec<RawRow>, _>>()?;
    raw.into_iter().map(decode).collect()
}

/// Insert or replace a key record.
pub fn upsert(conn: &Connection, key: &ApiKey) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO api_keys
            (id, name, key_prefix, key_hash, description, is_active, permissions,
             created_at, created_by, last_used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            key.id,
            key.name,
            key.key_prefix,
            key.key_hash,
            key.description,
            key.is_active,
            serde_json::to_string(&key.permissions)?,
            to_millis(&key.created_at),
            key.created_by,
            key.last_used_at.as_ref().map(to_millis),
        ],
    )?;
    Ok(())
}

/// Delete a key record.
pub fn delete(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM api_keys WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(DbError::NotFound(format!("api key '{id}'")));
    }
    Ok(())
}

/// Replace the whole key mirror.
pub fn replace_all(conn: &Connection, keys: &[ApiKey]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM api_keys", [])?;
    for key in keys {
        upsert(&tx, key)?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn key(id: &str, hash: &str, created_secs: i64) -> ApiKey {
        ApiKey {
            id: id.to_string(),
            name: format!("key {id}"),
            key_prefix: "sk_abcd".to_string(),
            key_hash: hash.to_string(),
            description: String::new(),
            is_active: true,
            permissions: vec!["read_reports".to_string()],
            created_at: Utc.timestamp_opt(created_secs, 0).single().expect("ts"),
            created_by: Some("admin".to_string()),
            last_used_at: None,
        }
    }

    #[test]
    fn test_upsert_and_list_newest_first() {
        let conn = test_db();
        upsert(&conn, &key("a", "h1", 100)).expect("a");
        upsert(&conn, &key("b", "h2", 200)).expect("b");
        let keys = list(&conn).expect("list");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].id, "b");
        assert_eq!(keys[1].permissions, vec!["read_reports".to_string()]);
    }

    #[test]
    fn test_duplicate_hash_rejected() {
        let conn = test_db();
        upsert(&conn, &key("a", "same", 100)).expect("a");
        assert!(upsert(&conn, &key("b", "same", 100)).is_err());
    }

    #[test]
    fn test_delete_missing() {
        let conn = test_db();
        assert!(matches!(delete(&conn, "x"), Err(DbError::NotFound(_))));
    }
}
