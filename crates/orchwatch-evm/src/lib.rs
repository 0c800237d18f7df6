//! orchwatch-evm: the chain-facing collaborators of the orchestrator watcher.
//!
//! - [`rpc`] / [`http`]: JSON-RPC 2.0 over HTTP with retry
//! - [`abi`]: topics, selectors and return-data decoding for the Livepeer contracts
//! - [`decoder::BondingManagerDecoder`]: the `EventDecoder` for `BondingManager` logs
//! - [`client::LivepeerClient`]: `ChainClient` via `eth_call`, plus block/log reads
//! - [`source::PollingBlockSource`]: a `BlockSource` following the confirmed head
//!
//! # Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use alloy_primitives::Address;
//! use orchwatch_evm::{HttpTransport, LivepeerClient, PollingBlockSource, PollingConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bonding_manager: Address = "0x35Bcf3c30594191d53231E4FF333E8A770453e40".parse()?;
//! let service_registry: Address = "0x406a112f3218b988c66778fd72fc8467f2601366".parse()?;
//!
//! let transport = Arc::new(HttpTransport::default_for("http://localhost:8545")?);
//! let client = Arc::new(LivepeerClient::new(transport, bonding_manager, service_registry));
//! let poller = PollingBlockSource::new(client.clone(), PollingConfig::new(bonding_manager));
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod client;
pub mod decoder;
pub mod fetcher;
pub mod http;
pub mod rpc;
pub mod source;
pub mod tracker;

pub use client::LivepeerClient;
pub use decoder::BondingManagerDecoder;
pub use fetcher::EvmRpcClient;
pub use http::{HttpConfig, HttpTransport};
pub use rpc::{RetryConfig, RpcTransport, TransportError};
pub use source::{PollingBlockSource, PollingConfig};
