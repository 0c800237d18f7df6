//! orchwatch-core: reorg-aware reconciliation of orchestrator state.
//!
//! # Architecture
//!
//! ```text
//! BlockSource ──batches──▶ OrchestratorWatcher
//!                              ├── EventDecoder      (name resolution + typed decode)
//!                              ├── AddressFilter     (optional allow-list)
//!                              ├── forward path      (trust decoded event, one lookup)
//!                              ├── reorg path        (re-fetch canonical record)
//!                              └── OrchestratorStore (merge-by-field upsert)
//! ```
//!
//! The chain-facing collaborators live in `orchwatch-evm`, the store backends
//! in `orchwatch-storage`. This crate only depends on their traits.

pub mod chain;
pub mod config;
pub mod error;
pub mod event;
pub mod source;
pub mod store;
pub mod types;
pub mod watcher;

pub use chain::ChainClient;
pub use config::{WatcherBuilder, WatcherConfig};
pub use error::{DecodeError, WatcherError};
pub use event::{EventDecoder, EventKind, OrchestratorEvent};
pub use source::{BlockFeed, BlockSource, Subscription};
pub use store::OrchestratorStore;
pub use types::{
    AddressFilter, BlockEvent, BlockHeader, EventType, OrchFilter, OrchestratorRecord,
    OrchestratorUpdate, RawLog, MAX_FUTURE_ROUND,
};
pub use watcher::{OrchestratorWatcher, WatcherStats};
