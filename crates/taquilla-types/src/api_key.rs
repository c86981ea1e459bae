//! API keys issued to external integrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public prefix of every generated key.
pub const KEY_PREFIX: &str = "sk_";

/// Number of leading characters kept as the displayable key prefix (`sk_xxxx`).
pub const DISPLAY_PREFIX_LEN: usize = 7;

/// An API key record. The plaintext key is never stored, only its hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub key_prefix: String,
    /// Hex-encoded SHA-256 hash of the plaintext key.
    pub key_hash: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Masked rendering shown in listings.
    pub fn masked(&self) -> String {
        format!("{}{}", self.key_prefix, "•".repeat(46))
    }
}
