//! Block and log fetching over JSON-RPC.
//!
//! Uses `eth_blockNumber`, `eth_getBlockByNumber` and `eth_getLogs` filtered
//! by block hash, so logs always belong to the exact block they were fetched
//! for even while the chain is reorganizing.

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use orchwatch_core::error::WatcherError;
use orchwatch_core::types::{BlockHeader, RawLog};

/// Chain-head reads needed by the polling block source.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn get_block_number(&self) -> Result<u64, WatcherError>;

    /// `None` if the node does not know the block yet.
    async fn get_block(&self, number: u64) -> Result<Option<BlockHeader>, WatcherError>;

    /// Logs emitted by `address` in the block with hash `block_hash`.
    async fn get_logs(&self, block_hash: B256, address: Address) -> Result<Vec<RawLog>, WatcherError>;
}

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: String,
    pub block_hash: B256,
    pub transaction_hash: B256,
    pub log_index: String,
    #[serde(default)]
    pub removed: bool,
}

impl From<RpcLog> for RawLog {
    fn from(log: RpcLog) -> Self {
        RawLog {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number: parse_hex_u64(&log.block_number),
            block_hash: log.block_hash,
            tx_hash: log.transaction_hash,
            log_index: parse_hex_u64(&log.log_index),
            removed: log.removed,
        }
    }
}

/// Parse a hex quantity (with or without `0x`) to u64.
pub fn try_parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Like [`try_parse_hex_u64`], with 0 for malformed input.
pub fn parse_hex_u64(s: &str) -> u64 {
    try_parse_hex_u64(s).unwrap_or(0)
}

/// Format a u64 as a JSON-RPC hex quantity.
pub fn to_hex_quantity(n: u64) -> String {
    format!("{n:#x}")
}

/// Convert an `eth_getBlockByNumber` result to a [`BlockHeader`].
pub fn block_from_json(v: &Value) -> Option<BlockHeader> {
    Some(BlockHeader {
        number: parse_hex_u64(v["number"].as_str()?),
        hash: v["hash"].as_str()?.parse().ok()?,
        parent_hash: v["parentHash"].as_str()?.parse().ok()?,
        timestamp: parse_hex_u64(v["timestamp"].as_str()?),
    })
}
