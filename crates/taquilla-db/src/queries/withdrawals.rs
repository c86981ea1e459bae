//! Withdrawal list mirror.
//!
//! The table holds the ledger's list in display order; `position` 0 is the
//! most recent withdrawal.

use rusqlite::Connection;
use taquilla_types::{Cents, RecordId, Withdrawal};

use crate::{from_millis, to_millis, DbError, Result};

/// Read the cached list in display order.
pub fn list(conn: &Connection) -> Result<Vec<Withdrawal>> {
    let mut stmt = conn.prepare(
        "SELECT id_origin, id_value, from_pot, amount, created_at
         FROM withdrawals ORDER BY position ASC",
    )?;

    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(origin, value, from_pot, amount, created_at)| {
            Ok(Withdrawal {
                id: RecordId {
                    origin: origin
                        .parse()
                        .map_err(|e| DbError::Serialization(format!("{e}")))?,
                    value,
                },
                from_pot,
                amount: amount as Cents,
                timestamp: from_millis(created_at)?,
            })
        })
        .collect()
}

/// Replace the cached list. Last writer wins.
pub fn replace_all(conn: &Connection, withdrawals: &[Withdrawal]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM withdrawals", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO withdrawals (id_origin, id_value, position, from_pot, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, w) in withdrawals.iter().enumerate() {
            stmt.execute(rusqlite::params![
                w.id.origin.as_str(),
                w.id.value,
                position as i64,
                w.from_pot,
                w.amount as i64,
                to_millis(&w.timestamp),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Number of cached withdrawals.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM withdrawals", [], |row| row.get(0))?;
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn withdrawal(id: RecordId, amount: Cents, secs: i64) -> Withdrawal {
        Withdrawal {
            id,
            from_pot: "Caja".to_string(),
            amount,
            timestamp: Utc.timestamp_opt(secs, 0).single().expect("valid ts"),
        }
    }

    #[test]
    fn test_empty_list() {
        let conn = test_db();
        assert!(list(&conn).expect("list").is_empty());
    }

    #[test]
    fn test_replace_preserves_order() {
        let conn = test_db();
        let items = vec![
            withdrawal(RecordId::remote("b"), 200, 2_000),
            withdrawal(RecordId::new_local(), 100, 1_000),
        ];
        replace_all(&conn, &items).expect("replace");
        assert_eq!(list(&conn).expect("list"), items);
        assert_eq!(count(&conn).expect("count"), 2);
    }

    #[test]
    fn test_replace_is_last_writer_wins() {
        let conn = test_db();
        replace_all(&conn, &[withdrawal(RecordId::remote("a"), 1, 1)]).expect("first");
        replace_all(&conn, &[withdrawal(RecordId::remote("b"), 2, 2)]).expect("second");
        let cached = list(&conn).expect("list");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, RecordId::remote("b"));
    }

    #[test]
    fn test_same_value_different_origin_coexist() {
        let conn = test_db();
        let local = RecordId {
            origin: taquilla_types::RecordOrigin::Local,
            value: "7".into(),
        };
        replace_all(
            &conn,
            &[withdrawal(RecordId::remote("7"), 1, 2), withdrawal(local, 1, 1)],
        )
        .expect("replace");
        assert_eq!(count(&conn).expect("count"), 2);
    }
}
