//! Conversions between store rows and domain types.
//!
//! Column names follow the remote schema (`from_pot`, `created_at`, ...).
//! Amounts are integer cents; instants are RFC 3339 UTC strings with
//! millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use taquilla_types::{ApiKey, Bet, Cents, DrawResult, Pot, RecordId, Withdrawal};

use crate::{Result, Row, StoreError};

/// Render an instant the way the store expects it.
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn field<'a>(row: &'a Row, column: &str) -> Result<&'a Value> {
    row.get(column)
        .ok_or_else(|| StoreError::Decode(format!("missing column '{column}'")))
}

fn string_field(row: &Row, column: &str) -> Result<String> {
    match field(row, column)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(StoreError::Decode(format!(
            "column '{column}' is not a string: {other}"
        ))),
    }
}

fn cents_field(row: &Row, column: &str) -> Result<Cents> {
    field(row, column)?
        .as_u64()
        .ok_or_else(|| StoreError::Decode(format!("column '{column}' is not a cent amount")))
}

fn time_field(row: &Row, column: &str) -> Result<DateTime<Utc>> {
    let raw = string_field(row, column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("column '{column}': {e}")))
}

/// Turn a serializable value into a row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value).map_err(|e| StoreError::Decode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected an object, got {other}"))),
    }
}

/// Decode a row through serde, stringifying a numeric `id` first.
pub fn from_row<T: DeserializeOwned>(mut row: Row) -> Result<T> {
    if let Some(Value::Number(n)) = row.get("id") {
        let id = n.to_string();
        row.insert("id".to_string(), Value::String(id));
    }
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Row inserted for a new withdrawal. The store assigns the id.
pub fn withdrawal_insert(from_pot: &str, amount: Cents, created_at: &DateTime<Utc>) -> Row {
    let mut row = Row::new();
    row.insert("from_pot".into(), json!(from_pot));
    row.insert("amount".into(), json!(amount));
    row.insert("created_at".into(), json!(timestamp(created_at)));
    row
}

/// Decode a stored withdrawal. Ids coming from the store are always remote.
pub fn withdrawal(row: &Row) -> Result<Withdrawal> {
    Ok(Withdrawal {
        id: RecordId::remote(string_field(row, "id")?),
        from_pot: string_field(row, "from_pot")?,
        amount: cents_field(row, "amount")?,
        timestamp: time_field(row, "created_at")?,
    })
}

pub fn pot(row: &Row) -> Result<Pot> {
    Ok(Pot {
        name: string_field(row, "name")?,
        balance: cents_field(row, "balance")?,
        color: row
            .get("color")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

pub fn pot_row(pot: &Pot) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), json!(pot.name));
    row.insert("balance".into(), json!(pot.balance));
    row.insert("color".into(), json!(pot.color));
    row
}

pub fn bet(row: Row) -> Result<Bet> {
    from_row(row)
}

pub fn draw_result(row: Row) -> Result<DrawResult> {
    from_row(row)
}

pub fn api_key(row: Row) -> Result<ApiKey> {
    from_row(row)
}

pub fn api_key_row(key: &ApiKey) -> Result<Row> {
    to_row(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("ts")
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        assert_eq!(timestamp(&at(0)), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_withdrawal_decode_numeric_id() {
        let mut row = withdrawal_insert("Caja", 2500, &at(1_700_000_000));
        row.insert("id".into(), json!(17));
        let w = withdrawal(&row).expect("decode");
        assert_eq!(w.id, RecordId::remote("17"));
        assert_eq!(w.amount, 2500);
        assert_eq!(w.timestamp, at(1_700_000_000));
    }

    #[test]
    fn test_withdrawal_missing_column() {
        let row = withdrawal_insert("Caja", 1, &at(1));
        assert!(matches!(withdrawal(&row), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut row = withdrawal_insert("Caja", 1, &at(1));
        row.insert("id".into(), json!("x"));
        row.insert("amount".into(), json!(-5));
        assert!(withdrawal(&row).is_err());
    }

    #[test]
    fn test_bet_from_row() {
        let row = to_row(&json!({
            "id": 9,
            "lottery_id": "lotto",
            "lottery_name": "Lotto Activo",
            "animal_number": "0",
            "animal_name": "Delfín",
            "amount": 1000,
            "timestamp": "2024-05-01T12:00:00.000Z",
            "user_id": "u1",
            "is_winner": true
        }))
        .expect("row");
        let b = bet(row).expect("bet");
        assert_eq!(b.id, "9");
        assert!(b.is_winner);
    }

    #[test]
    fn test_pot_without_color() {
        let row = to_row(&json!({"name": "Caja", "balance": 10})).expect("row");
        let p = pot(&row).expect("pot");
        assert_eq!(p.color, "");
    }
}
