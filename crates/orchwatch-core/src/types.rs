//! Shared types for the reconciliation pipeline.

use std::collections::HashSet;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Round value meaning "no deactivation scheduled".
///
/// Kept within `i64` so every backend can persist it as a signed integer.
pub const MAX_FUTURE_ROUND: u64 = i64::MAX as u64;

/// Convert an on-chain `uint256` round into a local round, clamping anything
/// beyond [`MAX_FUTURE_ROUND`] to the sentinel.
pub fn round_from_u256(value: U256) -> u64 {
    u64::try_from(value)
        .map(|r| r.min(MAX_FUTURE_ROUND))
        .unwrap_or(MAX_FUTURE_ROUND)
}

// ─── OrchestratorRecord ──────────────────────────────────────────────────────

/// The externally visible state of one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorRecord {
    /// On-chain address (primary key).
    pub address: Address,
    /// Advertised service endpoint.
    pub service_uri: String,
    /// Round in which the orchestrator becomes active.
    pub activation_round: u64,
    /// Round in which the orchestrator stops being active
    /// ([`MAX_FUTURE_ROUND`] when none is scheduled).
    pub deactivation_round: u64,
}

impl OrchestratorRecord {
    /// A record with default field values, as created by a first partial update.
    pub fn empty(address: Address) -> Self {
        Self {
            address,
            service_uri: String::new(),
            activation_round: 0,
            deactivation_round: 0,
        }
    }

    /// Returns `true` if the orchestrator is active in `round`.
    pub fn is_active(&self, round: u64) -> bool {
        self.activation_round <= round && round < self.deactivation_round
    }
}

// ─── OrchestratorUpdate ──────────────────────────────────────────────────────

/// A merge-by-field upsert. `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorUpdate {
    pub address: Address,
    pub service_uri: Option<String>,
    pub activation_round: Option<u64>,
    pub deactivation_round: Option<u64>,
}

impl OrchestratorUpdate {
    /// An update that touches no field besides the key.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            service_uri: None,
            activation_round: None,
            deactivation_round: None,
        }
    }

    /// A complete snapshot carrying every field of `record`.
    pub fn snapshot(record: &OrchestratorRecord) -> Self {
        Self {
            address: record.address,
            service_uri: Some(record.service_uri.clone()),
            activation_round: Some(record.activation_round),
            deactivation_round: Some(record.deactivation_round),
        }
    }

    pub fn service_uri(mut self, uri: impl Into<String>) -> Self {
        self.service_uri = Some(uri.into());
        self
    }

    pub fn activation_round(mut self, round: u64) -> Self {
        self.activation_round = Some(round);
        self
    }

    pub fn deactivation_round(mut self, round: u64) -> Self {
        self.deactivation_round = Some(round);
        self
    }

    /// Merge this update into an existing record (or a fresh one).
    pub fn apply(&self, existing: Option<OrchestratorRecord>) -> OrchestratorRecord {
        let mut record = existing.unwrap_or_else(|| OrchestratorRecord::empty(self.address));
        if let Some(uri) = &self.service_uri {
            record.service_uri = uri.clone();
        }
        if let Some(round) = self.activation_round {
            record.activation_round = round;
        }
        if let Some(round) = self.deactivation_round {
            record.deactivation_round = round;
        }
        record
    }
}

// ─── OrchFilter ──────────────────────────────────────────────────────────────

/// Query filter for reading orchestrators back out of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchFilter {
    /// Only return orchestrators active in this round (`None` = all).
    pub current_round: Option<u64>,
}

impl OrchFilter {
    pub fn active_in(round: u64) -> Self {
        Self {
            current_round: Some(round),
        }
    }

    /// Returns `true` if `record` passes this filter.
    pub fn matches(&self, record: &OrchestratorRecord) -> bool {
        self.current_round.map_or(true, |r| record.is_active(r))
    }
}

// ─── AddressFilter ───────────────────────────────────────────────────────────

/// Optional allow-list of orchestrator addresses (empty = accept all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFilter {
    addresses: HashSet<Address>,
}

impl AddressFilter {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Returns `true` if events about `address` should be reconciled.
    pub fn accepts(&self, address: &Address) -> bool {
        self.addresses.is_empty() || self.addresses.contains(address)
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }
}

// ─── Blocks and logs ─────────────────────────────────────────────────────────

/// Header fields of a block carried alongside its logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
}

impl BlockHeader {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

/// A raw EVM log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract that emitted the log.
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub log_index: u64,
    /// Set when the log belongs to a block dropped by a reorg.
    #[serde(default)]
    pub removed: bool,
}

impl RawLog {
    /// Returns `topics[index]`, if present.
    pub fn topic(&self, index: usize) -> Option<&B256> {
        self.topics.get(index)
    }
}

/// Whether a block's logs were added to or removed from the canonical chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Added,
    Removed,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// One block's worth of logs, tagged with its reorg disposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub event_type: EventType,
    pub block: BlockHeader,
    pub logs: Vec<RawLog>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
