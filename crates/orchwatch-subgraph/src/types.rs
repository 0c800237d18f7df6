//! Transcoder entities as served by the Livepeer subgraph.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use orchwatch_core::types::{round_from_u256, OrchestratorRecord};

use crate::error::SubgraphError;

/// An active transcoder as reported by the subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcoder {
    pub address: Address,
    pub service_uri: String,
    pub last_reward_round: U256,
    pub reward_cut: U256,
    pub fee_share: U256,
    /// Stake of the most recent pool when the subgraph has one, else total stake.
    pub delegated_stake: U256,
    pub activation_round: U256,
    pub deactivation_round: U256,
    pub active: bool,
    pub status: String,
}

impl Transcoder {
    /// The record the watcher would hold for this transcoder.
    pub fn to_record(&self) -> OrchestratorRecord {
        OrchestratorRecord {
            address: self.address,
            service_uri: self.service_uri.clone(),
            activation_round: round_from_u256(self.activation_round),
            deactivation_round: round_from_u256(self.deactivation_round),
        }
    }
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<TranscodersData>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscodersData {
    #[serde(default)]
    pub transcoders: Vec<RawTranscoder>,
}

#[derive(Debug, Deserialize)]
struct RawRound {
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    #[serde(default, rename = "totalStake")]
    total_stake: Value,
}

/// Numeric fields stay as raw JSON until [`parse_big_int`] has looked at them:
/// the subgraph sends them quoted, but unquoted and `null` also occur.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTranscoder {
    id: String,
    #[serde(default)]
    fee_share: Value,
    #[serde(default)]
    reward_cut: Value,
    #[serde(default)]
    last_reward_round: Option<RawRound>,
    #[serde(default)]
    activation_round: Value,
    #[serde(default)]
    deactivation_round: Value,
    #[serde(default)]
    total_stake: Value,
    #[serde(default, rename = "serviceURI")]
    service_uri: Option<String>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    pools: Vec<RawPool>,
}

impl RawTranscoder {
    pub(crate) fn parse(self) -> Result<Transcoder, SubgraphError> {
        let address = self
            .id
            .parse::<Address>()
            .map_err(|e| SubgraphError::Decode(format!("transcoder id {}: {e}", self.id)))?;

        let delegated_stake = match self.pools.first() {
            Some(pool) => parse_big_int("pools.totalStake", &pool.total_stake)?,
            None => parse_big_int("totalStake", &self.total_stake)?,
        };
        let last_reward_round = match &self.last_reward_round {
            Some(round) => parse_big_int("lastRewardRound.id", &round.id)?,
            None => U256::ZERO,
        };

        Ok(Transcoder {
            address,
            service_uri: self.service_uri.unwrap_or_default(),
            last_reward_round,
            reward_cut: parse_big_int("rewardCut", &self.reward_cut)?,
            fee_share: parse_big_int("feeShare", &self.fee_share)?,
            delegated_stake,
            activation_round: parse_big_int("activationRound", &self.activation_round)?,
            deactivation_round: parse_big_int("deactivationRound", &self.deactivation_round)?,
            active: self.active,
            status: self.status.unwrap_or_default(),
        })
    }
}

/// Parse a base-10 big integer sent as a JSON string, a JSON number or `null`
/// (which reads as zero).
pub fn parse_big_int(field: &'static str, value: &Value) -> Result<U256, SubgraphError> {
    let invalid = || SubgraphError::InvalidBigInt {
        field,
        value: value.to_string(),
    };
    match value {
        Value::Null => Ok(U256::ZERO),
        Value::String(s) => U256::from_str_radix(s, 10).map_err(|_| invalid()),
        Value::Number(n) => U256::from_str_radix(&n.to_string(), 10).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
