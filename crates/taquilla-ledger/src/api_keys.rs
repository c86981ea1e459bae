//! API key issuance and verification.
//!
//! Plaintext keys have the form `sk_<4 base36 time chars>_<40 alphanumerics>`
//! and are returned exactly once, from [`ApiKeyRegistry::create`]. Only the
//! SHA-256 hash and the 7-character display prefix are persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use taquilla_store::RemoteStore;
use taquilla_types::api_key::{DISPLAY_PREFIX_LEN, KEY_PREFIX};
use taquilla_types::ApiKey;
use tracing::{info, warn};

use crate::store::{KeyStore, LedgerStore};
use crate::{Backend, LedgerError, Result, SyncStatus};

const SECRET_LEN: usize = 40;
const TIME_TAG_LEN: usize = 4;

/// Partial update of an API key. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKeyPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
            && self.permissions.is_none()
            && self.last_used_at.is_none()
    }

    pub fn apply(&self, key: &mut ApiKey) {
        if let Some(name) = &self.name {
            key.name = name.clone();
        }
        if let Some(description) = &self.description {
            key.description = description.clone();
        }
        if let Some(is_active) = self.is_active {
            key.is_active = is_active;
        }
        if let Some(permissions) = &self.permissions {
            key.permissions = permissions.clone();
        }
        if let Some(last_used_at) = self.last_used_at {
            key.last_used_at = Some(last_used_at);
        }
    }
}

/// Request to issue a key.
#[derive(Clone, Debug, Deserialize)]
pub struct NewApiKey {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_active() -> bool {
    true
}

/// A freshly issued key. `key` is the only copy of the plaintext.
#[derive(Clone, Debug, Serialize)]
pub struct CreatedApiKey {
    pub key: String,
    pub record: ApiKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyVerification {
    pub is_valid: bool,
    pub key_id: Option<String>,
    pub permissions: Vec<String>,
}

impl KeyVerification {
    fn invalid() -> Self {
        Self {
            is_valid: false,
            key_id: None,
            permissions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ApiKeyStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub used_today: u64,
    pub used_this_week: u64,
    pub created_this_month: u64,
    pub avg_permissions_per_key: f64,
    pub most_recent_usage: Option<DateTime<Utc>>,
}

/// Start instants of the windows used by [`key_stats`].
#[derive(Clone, Copy, Debug)]
pub struct UsageWindows {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Generate a plaintext key.
pub fn generate_key(now: &DateTime<Utc>, rng: &mut impl Rng) -> String {
    let stamp = base36(now.timestamp_millis().max(0) as u64);
    let tag = &stamp[stamp.len().saturating_sub(TIME_TAG_LEN)..];
    let secret: String = rng
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect();
    format!("{KEY_PREFIX}{tag}_{secret}")
}

/// Lowercase hex SHA-256 of a plaintext key, as stored in `key_hash`.
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub fn key_stats(keys: &[ApiKey], windows: &UsageWindows) -> ApiKeyStats {
    let total = keys.len() as u64;
    let active = keys.iter().filter(|k| k.is_active).count() as u64;
    let used_since = |since: &DateTime<Utc>| {
        keys.iter()
            .filter(|k| k.last_used_at.is_some_and(|t| t >= *since))
            .count() as u64
    };
    let permissions: usize = keys.iter().map(|k| k.permissions.len()).sum();

    ApiKeyStats {
        total,
        active,
        inactive: total - active,
        used_today: used_since(&windows.today),
        used_this_week: used_since(&windows.week),
        created_this_month: keys.iter().filter(|k| k.created_at >= windows.month).count() as u64,
        avg_permissions_per_key: if total == 0 {
            0.0
        } else {
            permissions as f64 / total as f64
        },
        most_recent_usage: keys.iter().filter_map(|k| k.last_used_at).max(),
    }
}

/// Issues, edits and verifies API keys.
pub struct ApiKeyRegistry<R> {
    backend: Arc<Backend<R>>,
}

impl<R: RemoteStore> ApiKeyRegistry<R> {
    pub fn new(backend: Arc<Backend<R>>) -> Self {
        Self { backend }
    }

    /// All keys, newest first.
    pub async fn list(&self) -> Result<Vec<ApiKey>> {
        self.backend.select_for_read().await.list_keys().await
    }

    pub async fn create(&self, request: NewApiKey) -> Result<CreatedApiKey> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("api key name is required".into()));
        }

        let now = Utc::now();
        let key = generate_key(&now, &mut rand::thread_rng());
        let record = ApiKey {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            key_prefix: key.chars().take(DISPLAY_PREFIX_LEN).collect(),
            key_hash: hash_key(&key),
            description: request.description,
            is_active: request.is_active,
            permissions: request.permissions,
            created_at: now,
            created_by: request.created_by,
            last_used_at: None,
        };

        let stored = self.backend.select().await?.insert_key(&record).await?;
        info!(id = %stored.id, prefix = %stored.key_prefix, "api key created");
        Ok(CreatedApiKey { key, record: stored })
    }

    pub async fn update(&self, id: &str, patch: ApiKeyPatch) -> Result<ApiKey> {
        if patch.is_empty() {
            return Err(LedgerError::InvalidInput("nothing to update".into()));
        }
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(LedgerError::InvalidInput("api key name is required".into()));
        }
        let updated = self.backend.select().await?.update_key(id, &patch).await?;
        info!(%id, "api key updated");
        Ok(updated)
    }

    /// Deactivate a key without deleting it.
    pub async fn revoke(&self, id: &str) -> Result<ApiKey> {
        let patch = ApiKeyPatch {
            is_active: Some(false),
            ..ApiKeyPatch::default()
        };
        let revoked = self.backend.select().await?.update_key(id, &patch).await?;
        info!(%id, "api key revoked");
        Ok(revoked)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.backend.select().await?.delete_key(id).await?;
        info!(%id, "api key deleted");
        Ok(())
    }

    /// Check a presented plaintext key. Successful checks stamp `last_used_at`.
    pub async fn verify(&self, presented: &str) -> Result<KeyVerification> {
        if !presented.starts_with(KEY_PREFIX) {
            return Ok(KeyVerification::invalid());
        }
        let store = self.backend.select_for_read().await;
        let Some(key) = store.find_key_by_hash(&hash_key(presented)).await? else {
            return Ok(KeyVerification::invalid());
        };
        if !key.is_active {
            return Ok(KeyVerification::invalid());
        }

        let now = Utc::now();
        if store.status() == SyncStatus::Synced {
            let patch = ApiKeyPatch {
                last_used_at: Some(now),
                ..ApiKeyPatch::default()
            };
            if let Err(e) = store.update_key(&key.id, &patch).await {
                warn!(id = %key.id, error = %e, "failed to record api key usage");
            }
        } else {
            // Usage stamps are not worth queueing; keep them local.
            let mut used = key.clone();
            used.last_used_at = Some(now);
            self.backend.cache_only().remember_key(&used).await?;
        }

        Ok(KeyVerification {
            is_valid: true,
            key_id: Some(key.id),
            permissions: key.permissions,
        })
    }

    pub async fn stats(&self, windows: &UsageWindows) -> Result<ApiKeyStats> {
        Ok(key_stats(&self.list().await?, windows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use taquilla_db::queries::offline_queue;
    use taquilla_store::{Gateway, MemoryStore, Table};
    use tokio::sync::Mutex;

    fn registry(store: &MemoryStore) -> ApiKeyRegistry<MemoryStore> {
        let conn = taquilla_db::open_memory().expect("cache");
        let backend = Backend::new(Gateway::new(store.clone()), Arc::new(Mutex::new(conn)));
        ApiKeyRegistry::new(Arc::new(backend))
    }

    fn request(name: &str) -> NewApiKey {
        NewApiKey {
            name: name.into(),
            description: String::new(),
            is_active: true,
            permissions: vec!["read:sales".into(), "read:draws".into()],
            created_by: None,
        }
    }

    #[test]
    fn test_generated_key_shape() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("ts");
        let key = generate_key(&now, &mut StdRng::seed_from_u64(7));
        assert!(key.starts_with("sk_"));
        let parts: Vec<&str> = key.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), TIME_TAG_LEN);
        assert_eq!(parts[2].len(), SECRET_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let h = hash_key("sk_abcd_secret");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_key("sk_abcd_secret"));
        assert_ne!(h, hash_key("sk_abcd_secreT"));
    }

    #[test]
    fn test_hash_matches_sha256_vector() {
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_key_stats() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().expect("ts");
        let key = |active: bool, perms: usize, used: Option<i64>, created_days_ago: i64| ApiKey {
            id: format!("{active}{perms}{created_days_ago}"),
            name: "k".into(),
            key_prefix: "sk_abcd".into(),
            key_hash: String::new(),
            description: String::new(),
            is_active: active,
            permissions: vec!["p".into(); perms],
            created_at: now - Duration::days(created_days_ago),
            created_by: None,
            last_used_at: used.map(|h| now - Duration::hours(h)),
        };
        let keys = vec![
            key(true, 2, Some(1), 1),
            key(true, 1, Some(72), 40),
            key(false, 0, None, 3),
        ];
        let windows = UsageWindows {
            today: now - Duration::hours(6),
            week: now - Duration::days(6),
            month: now - Duration::days(20),
        };
        let stats = key_stats(&keys, &windows);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.inactive, 1);
        assert_eq!(stats.used_today, 1);
        assert_eq!(stats.used_this_week, 2);
        assert_eq!(stats.created_this_month, 2);
        assert!((stats.avg_permissions_per_key - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.most_recent_usage, Some(now - Duration::hours(1)));
    }

    #[test]
    fn test_empty_stats() {
        let now = Utc::now();
        let stats = key_stats(&[], &UsageWindows { today: now, week: now, month: now });
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_permissions_per_key, 0.0);
        assert!(stats.most_recent_usage.is_none());
    }

    #[tokio::test]
    async fn test_create_and_verify() {
        let store = MemoryStore::new();
        let registry = registry(&store);
        let created = registry.create(request("POS terminal")).await.expect("create");

        assert_eq!(created.record.key_prefix, &created.key[..7]);
        assert_ne!(created.record.key_hash, created.key);
        assert_eq!(store.rows(Table::ApiKeys).await.len(), 1);

        let ok = registry.verify(&created.key).await.expect("verify");
        assert!(ok.is_valid);
        assert_eq!(ok.key_id.as_deref(), Some(created.record.id.as_str()));
        assert_eq!(ok.permissions.len(), 2);

        let listed = registry.list().await.expect("list");
        assert!(listed[0].last_used_at.is_some());

        let bad = registry.verify("sk_nope_nope").await.expect("verify");
        assert!(!bad.is_valid);
    }

    #[tokio::test]
    async fn test_revoked_key_fails_verification() {
        let store = MemoryStore::new();
        let registry = registry(&store);
        let created = registry.create(request("Kiosk")).await.expect("create");
        registry.revoke(&created.record.id).await.expect("revoke");
        assert!(!registry.verify(&created.key).await.expect("verify").is_valid);
    }

    #[tokio::test]
    async fn test_rejects_blank_name() {
        let store = MemoryStore::new();
        let registry = registry(&store);
        let err = registry.create(request("   ")).await.expect_err("blank");
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        let err = registry
            .update("x", ApiKeyPatch::default())
            .await
            .expect_err("empty patch");
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_offline_create_is_queued_and_replayed() {
        let store = MemoryStore::new();
        store.set_online(false);
        let registry = registry(&store);

        let created = registry.create(request("Offline")).await.expect("create");
        assert!(registry.verify(&created.key).await.expect("verify").is_valid);
        {
            let conn = registry.backend.cache().lock().await;
            assert_eq!(offline_queue::len(&conn).expect("len"), 1);
        }

        store.set_online(true);
        // A remote listing taken before replay still shows the queued key.
        let listed = registry.list().await.expect("list");
        assert_eq!(listed.len(), 1);

        let report = crate::sync::drain(&registry.backend, 5).await.expect("drain");
        assert_eq!(report.replayed, 1);
        assert_eq!(store.rows(Table::ApiKeys).await.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_delete_of_unsynced_key_cancels_insert() {
        let store = MemoryStore::new();
        store.set_online(false);
        let registry = registry(&store);

        let created = registry.create(request("Temp")).await.expect("create");
        registry.delete(&created.record.id).await.expect("delete");

        let conn = registry.backend.cache().lock().await;
        assert_eq!(offline_queue::len(&conn).expect("len"), 0);
    }
}
