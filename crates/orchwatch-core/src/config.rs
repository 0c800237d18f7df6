//! Watcher configuration and its fluent builder.
//!
//! # Example
//!
//! ```rust
//! use orchwatch_core::config::WatcherBuilder;
//! use alloy_primitives::Address;
//!
//! let config = WatcherBuilder::new(Address::repeat_byte(0x51))
//!     .allow(Address::repeat_byte(0x01))
//!     .channel_capacity(32)
//!     .build_config();
//! assert_eq!(config.address_filter.len(), 1);
//! ```

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::WatcherError;
use crate::types::AddressFilter;

/// Construction-time settings of an [`OrchestratorWatcher`](crate::OrchestratorWatcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// The staking contract whose events are reconciled.
    pub contract_address: Address,
    /// Orchestrators to track (empty = all).
    #[serde(default)]
    pub address_filter: Vec<Address>,
    /// Capacity of the batch channel handed to the block source.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Reuse reorg-path chain lookups for the same address within one batch.
    #[serde(default = "bool_true")]
    pub reorg_cache: bool,
}

fn default_channel_capacity() -> usize { 10 }
fn bool_true() -> bool { true }

impl WatcherConfig {
    pub fn new(contract_address: Address) -> Self {
        Self {
            contract_address,
            address_filter: vec![],
            channel_capacity: default_channel_capacity(),
            reorg_cache: true,
        }
    }

    /// Reject settings the watcher cannot run with.
    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.contract_address == Address::ZERO {
            return Err(WatcherError::Config("contract address must be set".into()));
        }
        if self.channel_capacity == 0 {
            return Err(WatcherError::Config("channel capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn filter(&self) -> AddressFilter {
        AddressFilter::new(self.address_filter.iter().copied())
    }
}

/// Fluent builder for [`WatcherConfig`].
pub struct WatcherBuilder {
    config: WatcherConfig,
}

impl WatcherBuilder {
    pub fn new(contract_address: Address) -> Self {
        Self {
            config: WatcherConfig::new(contract_address),
        }
    }

    /// Track only this orchestrator (may be called repeatedly).
    pub fn allow(mut self, address: Address) -> Self {
        self.config.address_filter.push(address);
        self
    }

    /// Replace the allow-list.
    pub fn address_filter(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.config.address_filter = addresses.into_iter().collect();
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn reorg_cache(mut self, enabled: bool) -> Self {
        self.config.reorg_cache = enabled;
        self
    }

    pub fn build_config(self) -> WatcherConfig {
        self.config
    }
}
