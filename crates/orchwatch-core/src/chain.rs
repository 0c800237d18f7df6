//! Synchronous-of-record chain lookups used during reconciliation.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::WatcherError;
use crate::types::OrchestratorRecord;

/// Reads the current canonical state of an orchestrator from the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The service URI currently registered for `address`.
    async fn get_service_uri(&self, address: Address) -> Result<String, WatcherError>;

    /// The full on-chain record for `address`.
    async fn get_transcoder(&self, address: Address) -> Result<OrchestratorRecord, WatcherError>;
}
