//! Pot mirror.

use rusqlite::{Connection, OptionalExtension};
use taquilla_types::{Cents, Pot};

use crate::{DbError, Result};

/// List all cached pots ordered by name.
pub fn list(conn: &Connection) -> Result<Vec<Pot>> {
    let mut stmt = conn.prepare("SELECT name, balance, color FROM pots ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Pot {
                name: row.get(0)?,
                balance: row.get::<_, i64>(1)? as Cents,
                color: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Get one pot by name.
pub fn get(conn: &Connection, name: &str) -> Result<Option<Pot>> {
    let pot = conn
        .query_row(
            "SELECT name, balance, color FROM pots WHERE name = ?1",
            [name],
            |row| {
                Ok(Pot {
                    name: row.get(0)?,
                    balance: row.get::<_, i64>(1)? as Cents,
                    color: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(pot)
}

/// Insert or replace a pot.
pub fn upsert(conn: &Connection, pot: &Pot, updated_at: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO pots (name, balance, color, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET balance = ?2, color = ?3, updated_at = ?4",
        rusqlite::params![pot.name, pot.balance as i64, pot.color, updated_at],
    )?;
    Ok(())
}

/// Set the balance of an existing pot.
pub fn set_balance(conn: &Connection, name: &str, balance: Cents, updated_at: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE pots SET balance = ?1, updated_at = ?2 WHERE name = ?3",
        rusqlite::params![balance as i64, updated_at, name],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("pot '{name}'")));
    }
    Ok(())
}

/// Replace the whole pot mirror with a fresh remote listing.
pub fn replace_all(conn: &Connection, pots: &[Pot], updated_at: i64) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM pots", [])?;
    for pot in pots {
        upsert(&tx, pot, updated_at)?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = test_db();
        upsert(&conn, &Pot::new("Caja", 5000, "#22c55e"), 1).expect("upsert");
        let pot = get(&conn, "Caja").expect("get").expect("present");
        assert_eq!(pot.balance, 5000);

        upsert(&conn, &Pot::new("Caja", 7000, "#000000"), 2).expect("upsert again");
        let pot = get(&conn, "Caja").expect("get").expect("present");
        assert_eq!(pot.balance, 7000);
        assert_eq!(pot.color, "#000000");
    }

    #[test]
    fn test_set_balance_missing_pot() {
        let conn = test_db();
        let result = set_balance(&conn, "Nope", 10, 1);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_negative_balance_rejected_by_schema() {
        let conn = test_db();
        upsert(&conn, &Pot::new("Caja", 10, ""), 1).expect("upsert");
        let result = conn.execute("UPDATE pots SET balance = -1 WHERE name = 'Caja'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_replace_all() {
        let conn = test_db();
        upsert(&conn, &Pot::new("Vieja", 1, ""), 1).expect("upsert");
        replace_all(
            &conn,
            &[Pot::new("Caja", 10, ""), Pot::new("Premios", 20, "")],
            2,
        )
        .expect("replace");
        let names: Vec<String> = list(&conn).expect("list").into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Caja", "Premios"]);
    }
}
