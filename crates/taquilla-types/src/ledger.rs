//! Pots, withdrawals and record identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Cents, TypeError};

/// A named cash accumulator. Withdrawals debit its balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Pot {
    /// Unique pot name.
    pub name: String,
    pub balance: Cents,
    /// Display colour, e.g. `"#22c55e"`.
    pub color: String,
}

impl Pot {
    pub fn new(name: impl Into<String>, balance: Cents, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            balance,
            color: color.into(),
        }
    }
}

/// Where a record identifier was assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Created while the remote store was unreachable; not yet synced.
    Local,
    /// Assigned by the remote store.
    Remote,
}

impl RecordOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl FromStr for RecordOrigin {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(TypeError::UnknownOrigin(other.to_string())),
        }
    }
}

/// Identifier tagged with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct RecordId {
    pub origin: RecordOrigin,
    pub value: String,
}

impl RecordId {
    /// A fresh locally generated identifier.
    pub fn new_local() -> Self {
        Self {
            origin: RecordOrigin::Local,
            value: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// An existing local identifier, e.g. read back from the offline queue.
    pub fn local(value: impl Into<String>) -> Self {
        Self {
            origin: RecordOrigin::Local,
            value: value.into(),
        }
    }

    pub fn remote(value: impl Into<String>) -> Self {
        Self {
            origin: RecordOrigin::Remote,
            value: value.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == RecordOrigin::Local
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin.as_str(), self.value)
    }
}

impl FromStr for RecordId {
    type Err = TypeError;

    /// Parses the `origin:value` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (origin, value) = s
            .split_once(':')
            .ok_or_else(|| TypeError::MalformedId(s.to_string()))?;
        if value.is_empty() {
            return Err(TypeError::MalformedId(s.to_string()));
        }
        Ok(Self {
            origin: origin.parse()?,
            value: value.to_string(),
        })
    }
}

/// Immutable record of funds debited from a pot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Withdrawal {
    pub id: RecordId,
    pub from_pot: String,
    pub amount: Cents,
    pub timestamp: DateTime<Utc>,
}
