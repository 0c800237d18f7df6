//! SQLite storage backend.
//!
//! Persists orchestrator records to a single SQLite file. Uses `sqlx` with
//! WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use orchwatch_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./orchwatch.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use alloy_primitives::Address;
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use orchwatch_core::error::WatcherError;
use orchwatch_core::store::OrchestratorStore;
use orchwatch_core::types::{OrchFilter, OrchestratorRecord, OrchestratorUpdate, MAX_FUTURE_ROUND};

fn storage_err(e: impl std::fmt::Display) -> WatcherError {
    WatcherError::Storage(e.to_string())
}

fn round_to_sql(round: u64) -> i64 {
    round.min(MAX_FUTURE_ROUND) as i64
}

fn round_from_sql(round: i64) -> u64 {
    round.max(0) as u64
}

/// SQLite-backed orchestrator store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./orchwatch.db"`) or a full
    /// SQLite URL (`"sqlite:./orchwatch.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, WatcherError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Limited to one connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self, WatcherError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), WatcherError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orchestrators (
                eth_addr           TEXT    PRIMARY KEY,
                service_uri        TEXT    NOT NULL DEFAULT '',
                activation_round   INTEGER NOT NULL DEFAULT 0,
                deactivation_round INTEGER NOT NULL DEFAULT 0,
                updated_at         INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_orchestrators_rounds
             ON orchestrators (activation_round, deactivation_round);",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    fn record_from_row(row: &SqliteRow) -> Result<OrchestratorRecord, WatcherError> {
        let addr: String = row.get("eth_addr");
        Ok(OrchestratorRecord {
            address: addr.parse::<Address>().map_err(storage_err)?,
            service_uri: row.get("service_uri"),
            activation_round: round_from_sql(row.get("activation_round")),
            deactivation_round: round_from_sql(row.get("deactivation_round")),
        })
    }
}

#[async_trait]
impl OrchestratorStore for SqliteStore {
    async fn update_orch(&self, update: &OrchestratorUpdate) -> Result<(), WatcherError> {
        let activation = update.activation_round.map(round_to_sql);
        let deactivation = update.deactivation_round.map(round_to_sql);

        // NULL binds leave the stored column untouched on conflict.
        sqlx::query(
            "INSERT INTO orchestrators
                 (eth_addr, service_uri, activation_round, deactivation_round, updated_at)
             VALUES (?, COALESCE(?, ''), COALESCE(?, 0), COALESCE(?, 0), ?)
             ON CONFLICT (eth_addr) DO UPDATE SET
                 service_uri        = COALESCE(?, service_uri),
                 activation_round   = COALESCE(?, activation_round),
                 deactivation_round = COALESCE(?, deactivation_round),
                 updated_at         = excluded.updated_at",
        )
        .bind(update.address.to_checksum(None))
        .bind(update.service_uri.as_deref())
        .bind(activation)
        .bind(deactivation)
        .bind(chrono::Utc::now().timestamp())
        .bind(update.service_uri.as_deref())
        .bind(activation)
        .bind(deactivation)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(orchestrator = %update.address, "orchestrator stored");
        Ok(())
    }

    async fn get_orch(&self, address: Address) -> Result<Option<OrchestratorRecord>, WatcherError> {
        let row = sqlx::query(
            "SELECT eth_addr, service_uri, activation_round, deactivation_round
             FROM orchestrators WHERE eth_addr = ?",
        )
        .bind(address.to_checksum(None))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn select_orchs(&self, filter: &OrchFilter) -> Result<Vec<OrchestratorRecord>, WatcherError> {
        let round = filter.current_round.map(round_to_sql);
        let rows = sqlx::query(
            "SELECT eth_addr, service_uri, activation_round, deactivation_round
             FROM orchestrators
             WHERE ? IS NULL OR (activation_round <= ? AND ? < deactivation_round)
             ORDER BY lower(eth_addr)",
        )
        .bind(round)
        .bind(round)
        .bind(round)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(Self::record_from_row).collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
