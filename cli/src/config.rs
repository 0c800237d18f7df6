//! The `orchwatch` config file (YAML, or JSON by `.json` extension).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use orchwatch_core::config::{WatcherBuilder, WatcherConfig};
use orchwatch_core::store::OrchestratorStore;
use orchwatch_evm::PollingConfig;
use orchwatch_storage::InMemoryStore;

use crate::logging::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    pub bonding_manager: Address,
    pub service_registry: Address,
    /// Orchestrators to track (empty = all).
    #[serde(default)]
    pub address_filter: Vec<Address>,
    #[serde(default = "default_confirmation_depth")]
    pub confirmation_depth: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// First block to deliver; defaults to the confirmed head at startup.
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "bool_true")]
    pub reorg_cache: bool,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub subgraph_url: Option<String>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_rpc_url() -> String { "http://localhost:8545".into() }
fn default_confirmation_depth() -> u64 { 12 }
fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_channel_capacity() -> usize { 10 }
fn bool_true() -> bool { true }

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf { PathBuf::from("./orchwatch.db") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config file '{}'", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: AppConfig = if is_json {
            serde_json::from_str(&text).context("parse JSON config")?
        } else {
            serde_yaml::from_str(&text).context("parse YAML config")?
        };
        config.watcher_config().validate()?;
        Ok(config)
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherBuilder::new(self.bonding_manager)
            .address_filter(self.address_filter.iter().copied())
            .channel_capacity(self.channel_capacity)
            .reorg_cache(self.reorg_cache)
            .build_config()
    }

    pub fn polling_config(&self) -> PollingConfig {
        PollingConfig {
            confirmation_depth: self.confirmation_depth,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            start_block: self.start_block,
            ..PollingConfig::new(self.bonding_manager)
        }
    }
}

/// Open the configured store backend.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn OrchestratorStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            let path = config.path.to_string_lossy();
            let store = orchwatch_storage::SqliteStore::open(&path)
                .await
                .with_context(|| format!("open SQLite store '{path}'"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => anyhow::bail!("this build of orchwatch has no SQLite support"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
bonding_manager: "0x35Bcf3c30594191d53231E4FF333E8A770453e40"
service_registry: "0x406a112f3218b988c66778fd72fc8467f2601366"
"#;

    #[test]
    fn yaml_defaults() {
        let cfg: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(cfg.rpc_url, "http://localhost:8545");
        assert_eq!(cfg.confirmation_depth, 12);
        assert_eq!(cfg.poll_interval_ms, 2_000);
        assert_eq!(cfg.channel_capacity, 10);
        assert!(cfg.reorg_cache);
        assert!(cfg.start_block.is_none());
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert!(cfg.subgraph_url.is_none());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn yaml_full() {
        let text = format!(
            "{MINIMAL}
address_filter: ['0x0101010101010101010101010101010101010101']
confirmation_depth: 3
start_block: 1000
reorg_cache: false
storage: {{ backend: sqlite, path: /tmp/o.db }}
log: {{ level: debug, json: true, components: {{ orchwatch-evm: trace }} }}
"
        );
        let cfg: AppConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Sqlite);
        assert_eq!(cfg.storage.path, PathBuf::from("/tmp/o.db"));
        assert!(cfg.log.json);

        let wc = cfg.watcher_config();
        assert_eq!(wc.filter().len(), 1);
        assert!(!wc.reorg_cache);
        assert_eq!(wc.contract_address, cfg.bonding_manager);

        let pc = cfg.polling_config();
        assert_eq!(pc.confirmation_depth, 3);
        assert_eq!(pc.start_block, Some(1000));
        assert_eq!(pc.contract, cfg.bonding_manager);
    }

    #[test]
    fn load_by_extension() {
        let dir = std::env::temp_dir().join(format!("orchwatch-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let yaml = dir.join("orchwatch.yaml");
        std::fs::write(&yaml, MINIMAL).unwrap();
        assert!(AppConfig::load(&yaml).is_ok());

        let json = dir.join("orchwatch.json");
        std::fs::write(
            &json,
            r#"{"bonding_manager":"0x35Bcf3c30594191d53231E4FF333E8A770453e40",
                "service_registry":"0x406a112f3218b988c66778fd72fc8467f2601366",
                "channel_capacity": 0}"#,
        )
        .unwrap();
        assert!(AppConfig::load(&json).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn memory_store_opens() {
        assert!(open_store(&StorageConfig::default()).await.is_ok());
    }
}
