//! Remote store selected by `[remote] backend`.

use taquilla_store::{MemoryStore, PostgrestStore, Query, RemoteStore, Result, Row, Table};

use crate::config::RemoteConfig;

/// The configured remote store.
pub enum StoreBackend {
    Postgrest(PostgrestStore),
    /// Process-local store; nothing survives a restart except the cache.
    Memory(MemoryStore),
}

impl StoreBackend {
    pub fn from_config(config: &RemoteConfig) -> anyhow::Result<Self> {
        match config.backend.as_str() {
            "postgrest" => {
                if config.url.is_empty() {
                    anyhow::bail!("[remote] url is required for the postgrest backend");
                }
                let store = PostgrestStore::new(&config.url, &config.api_key, config.timeout())?;
                Ok(Self::Postgrest(store))
            }
            "memory" => Ok(Self::Memory(MemoryStore::new())),
            other => anyhow::bail!("unknown remote backend: {other}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgrest(_) => "postgrest",
            Self::Memory(_) => "memory",
        }
    }
}

impl RemoteStore for StoreBackend {
    async fn query(&self, query: &Query) -> Result<Vec<Row>> {
        match self {
            Self::Postgrest(s) => s.query(query).await,
            Self::Memory(s) => s.query(query).await,
        }
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row> {
        match self {
            Self::Postgrest(s) => s.insert(table, row).await,
            Self::Memory(s) => s.insert(table, row).await,
        }
    }

    async fn update(&self, table: Table, key: &str, patch: Row) -> Result<Row> {
        match self {
            Self::Postgrest(s) => s.update(table, key, patch).await,
            Self::Memory(s) => s.update(table, key, patch).await,
        }
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        match self {
            Self::Postgrest(s) => s.delete(table, key).await,
            Self::Memory(s) => s.delete(table, key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(backend: &str, url: &str) -> RemoteConfig {
        RemoteConfig {
            backend: backend.to_string(),
            url: url.to_string(),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn test_backend_selection() {
        let memory = StoreBackend::from_config(&remote("memory", "")).expect("memory");
        assert_eq!(memory.kind(), "memory");

        let postgrest =
            StoreBackend::from_config(&remote("postgrest", "https://db.example.com")).expect("postgrest");
        assert_eq!(postgrest.kind(), "postgrest");
    }

    #[test]
    fn test_bad_backend_config_rejected() {
        assert!(StoreBackend::from_config(&remote("postgrest", "")).is_err());
        assert!(StoreBackend::from_config(&remote("postgrest", "ftp://db")).is_err());
        assert!(StoreBackend::from_config(&remote("sqlite", "")).is_err());
    }

    #[tokio::test]
    async fn test_memory_backend_delegates() {
        let backend = StoreBackend::Memory(MemoryStore::new());
        let mut row = Row::new();
        row.insert("from_pot".into(), "Caja".into());
        let stored = backend.insert(Table::Withdrawals, row).await.expect("insert");
        assert!(stored.contains_key("id"));
        let rows = backend.query(&Query::new(Table::Withdrawals)).await.expect("query");
        assert_eq!(rows.len(), 1);
    }
}
