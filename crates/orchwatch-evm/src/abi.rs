//! The slice of the Livepeer ABI the watcher needs: event topics, call
//! selectors, calldata encoding and return-data decoding.
//!
//! Topics and selectors are the keccak256 of the canonical signature, e.g.
//!   keccak256("TranscoderActivated(address,uint256)")
//!   → 0x65d72d782835d64c3287844a829608d5abdc7e864cc9affe96d910ab3db665e9

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, U256};
use tiny_keccak::{Hasher, Keccak};

pub const TRANSCODER_ACTIVATED: &str = "TranscoderActivated(address,uint256)";
pub const TRANSCODER_DEACTIVATED: &str = "TranscoderDeactivated(address,uint256)";
pub const GET_SERVICE_URI: &str = "getServiceURI(address)";
pub const GET_TRANSCODER: &str = "getTranscoder(address)";

/// Number of words returned by `BondingManager.getTranscoder`.
pub const TRANSCODER_WORDS: usize = 10;
/// Index of `activationRound` in the `getTranscoder` tuple.
pub const ACTIVATION_ROUND_WORD: usize = 4;
/// Index of `deactivationRound` in the `getTranscoder` tuple.
pub const DEACTIVATION_ROUND_WORD: usize = 5;

pub fn keccak256(bytes: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// topic0 of an event with the given canonical signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// 4-byte function selector.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for a function taking a single `address` argument.
pub fn encode_address_call(signature: &str, address: Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(address.into_word().as_slice());
    data
}

/// Decode the return data of a function returning `string`.
pub fn decode_string(data: &[u8]) -> Result<String, String> {
    match DynSolType::String.abi_decode(data) {
        Ok(DynSolValue::String(s)) => Ok(s),
        Ok(other) => Err(format!("expected string, got {other:?}")),
        Err(e) => Err(e.to_string()),
    }
}

/// Decode `count` consecutive `uint256` words (a static tuple).
pub fn decode_uint_words(data: &[u8], count: usize) -> Result<Vec<U256>, String> {
    let tuple = DynSolType::Tuple(vec![DynSolType::Uint(256); count]);
    let values = match tuple.abi_decode(data).map_err(|e| e.to_string())? {
        DynSolValue::Tuple(vals) => vals,
        other => vec![other],
    };
    values
        .into_iter()
        .map(|v| match v {
            DynSolValue::Uint(n, _) => Ok(n),
            other => Err(format!("expected uint256, got {other:?}")),
        })
        .collect()
}
