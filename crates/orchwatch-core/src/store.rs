//! Persistence trait for orchestrator records.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::WatcherError;
use crate::types::{OrchFilter, OrchestratorRecord, OrchestratorUpdate};

/// Durable home of orchestrator records, keyed by address.
///
/// Implementations must be safe to call from several writers at once.
#[async_trait]
pub trait OrchestratorStore: Send + Sync {
    /// Insert-or-merge: only the `Some` fields of `update` are written.
    async fn update_orch(&self, update: &OrchestratorUpdate) -> Result<(), WatcherError>;

    /// Look up one record.
    async fn get_orch(&self, address: Address) -> Result<Option<OrchestratorRecord>, WatcherError>;

    /// List records matching `filter`, ordered by address.
    async fn select_orchs(&self, filter: &OrchFilter) -> Result<Vec<OrchestratorRecord>, WatcherError>;
}
