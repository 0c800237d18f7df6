//! In-memory orchestrator store.
//!
//! Useful for tests and short-lived watchers that don't need persistence.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloy_primitives::Address;
use async_trait::async_trait;

use orchwatch_core::error::WatcherError;
use orchwatch_core::store::OrchestratorStore;
use orchwatch_core::types::{OrchFilter, OrchestratorRecord, OrchestratorUpdate};

struct Row {
    record: OrchestratorRecord,
    updated_at: i64,
}

/// In-memory orchestrator store. All data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<Address, Row>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, BTreeMap<Address, Row>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored orchestrators.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    /// Unix timestamp of the last write to `address`.
    pub fn last_updated(&self, address: &Address) -> Option<i64> {
        self.rows().get(address).map(|r| r.updated_at)
    }
}

#[async_trait]
impl OrchestratorStore for InMemoryStore {
    async fn update_orch(&self, update: &OrchestratorUpdate) -> Result<(), WatcherError> {
        let mut rows = self.rows();
        let existing = rows.remove(&update.address).map(|r| r.record);
        rows.insert(
            update.address,
            Row {
                record: update.apply(existing),
                updated_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(())
    }

    async fn get_orch(&self, address: Address) -> Result<Option<OrchestratorRecord>, WatcherError> {
        Ok(self.rows().get(&address).map(|r| r.record.clone()))
    }

    async fn select_orchs(&self, filter: &OrchFilter) -> Result<Vec<OrchestratorRecord>, WatcherError> {
        Ok(self
            .rows()
            .values()
            .map(|r| &r.record)
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}
