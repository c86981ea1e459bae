//! Configuration file management.
//!
//! `config.toml` lives in the data directory. Every field has a default, so
//! an absent file or an empty section is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TAQUILLA_DATA_DIR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// "postgrest" | "memory".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Base URL of the PostgREST endpoint.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    /// Bound on a single remote call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Ledger and offline queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Attempts before a refused queued op is dropped.
    #[serde(default = "default_max_replay_attempts")]
    pub max_replay_attempts: u32,
    /// Period of the background queue drain. 0 disables it.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Terminal's offset from UTC, used for day/week/month and hour buckets.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
}

fn default_backend() -> String {
    "postgrest".to_string()
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_max_replay_attempts() -> u32 {
    taquilla_ledger::sync::DEFAULT_MAX_ATTEMPTS
}

fn default_sync_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: String::new(),
            api_key: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_replay_attempts: default_max_replay_attempts(),
            sync_interval_secs: default_sync_interval(),
        }
    }
}

impl ReportsConfig {
    /// The configured offset, or UTC when it is out of range.
    pub fn time_zone(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Taquilla")
        }
        #[cfg(target_os = "windows")]
        {
            dirs_fallback("Taquilla")
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs_fallback(".taquilla")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/taquilla"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.remote.backend, "postgrest");
        assert_eq!(config.remote.timeout(), Duration::from_secs(8));
        assert_eq!(config.ledger.max_replay_attempts, 5);
        assert_eq!(config.ledger.sync_interval_secs, 30);
        assert_eq!(config.reports.utc_offset_minutes, 0);
        assert_eq!(config.advanced.log_level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = DaemonConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let _parsed: DaemonConfig = toml::from_str(&toml_str).expect("parse");
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [remote]
            backend = "memory"

            [reports]
            utc_offset_minutes = -240
            "#,
        )
        .expect("parse");
        assert_eq!(config.remote.backend, "memory");
        assert_eq!(config.remote.timeout_ms, 8_000);
        assert_eq!(config.ledger.max_replay_attempts, 5);
        assert_eq!(config.reports.time_zone().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_out_of_range_offset_is_utc() {
        let reports = ReportsConfig {
            utc_offset_minutes: 100_000,
        };
        assert_eq!(reports.time_zone().local_minus_utc(), 0);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = DaemonConfig::load_from(&dir.path().join("config.toml")).expect("load");
        assert_eq!(config.remote.backend, "postgrest");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ledger]\nsync_interval_secs = 0\n").expect("write");
        let config = DaemonConfig::load_from(&path).expect("load");
        assert_eq!(config.ledger.sync_interval_secs, 0);
    }
}
