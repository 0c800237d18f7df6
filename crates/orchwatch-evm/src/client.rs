//! `LivepeerClient`: chain reads for reconciliation and block polling.
//!
//! Implements [`ChainClient`] with `eth_call`s against the `ServiceRegistry`
//! and `BondingManager` contracts at the `latest` block, and
//! [`EvmRpcClient`] for the polling block source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use orchwatch_core::chain::ChainClient;
use orchwatch_core::error::WatcherError;
use orchwatch_core::types::{round_from_u256, BlockHeader, OrchestratorRecord, RawLog};

use crate::abi;
use crate::fetcher::{block_from_json, to_hex_quantity, try_parse_hex_u64, EvmRpcClient, RpcLog};
use crate::rpc::{JsonRpcRequest, RpcTransport, TransportError};

pub struct LivepeerClient {
    transport: Arc<dyn RpcTransport>,
    bonding_manager: Address,
    service_registry: Address,
    next_id: AtomicU64,
}

impl LivepeerClient {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        bonding_manager: Address,
        service_registry: Address,
    ) -> Self {
        Self {
            transport,
            bonding_manager,
            service_registry,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call `method` and deserialize its result.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self
            .transport
            .send(JsonRpcRequest::new(id, method, params))
            .await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        Ok(serde_json::from_value(result)?)
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes, TransportError> {
        let call = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        self.request("eth_call", vec![call, json!("latest")]).await
    }

    /// Raw `(activationRound, deactivationRound)` of `address`, clamped.
    async fn transcoder_rounds(&self, address: Address) -> Result<(u64, u64), WatcherError> {
        let data = abi::encode_address_call(abi::GET_TRANSCODER, address);
        let ret = self.eth_call(self.bonding_manager, data).await?;
        let words = abi::decode_uint_words(&ret, abi::TRANSCODER_WORDS)
            .map_err(|e| WatcherError::Chain(format!("getTranscoder({address}): {e}")))?;
        Ok((
            round_from_u256(words[abi::ACTIVATION_ROUND_WORD]),
            round_from_u256(words[abi::DEACTIVATION_ROUND_WORD]),
        ))
    }
}

#[async_trait]
impl ChainClient for LivepeerClient {
    async fn get_service_uri(&self, address: Address) -> Result<String, WatcherError> {
        let data = abi::encode_address_call(abi::GET_SERVICE_URI, address);
        let ret = self.eth_call(self.service_registry, data).await?;
        abi::decode_string(&ret)
            .map_err(|e| WatcherError::Chain(format!("getServiceURI({address}): {e}")))
    }

    async fn get_transcoder(&self, address: Address) -> Result<OrchestratorRecord, WatcherError> {
        let (activation_round, deactivation_round) = self.transcoder_rounds(address).await?;
        let service_uri = self.get_service_uri(address).await?;
        debug!(
            orchestrator = %address,
            activation_round,
            deactivation_round,
            "fetched transcoder"
        );
        Ok(OrchestratorRecord {
            address,
            service_uri,
            activation_round,
            deactivation_round,
        })
    }
}

#[async_trait]
impl EvmRpcClient for LivepeerClient {
    async fn get_block_number(&self) -> Result<u64, WatcherError> {
        let hex: String = self.request("eth_blockNumber", vec![]).await?;
        try_parse_hex_u64(&hex)
            .ok_or_else(|| WatcherError::Chain(format!("malformed eth_blockNumber reply {hex:?}")))
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockHeader>, WatcherError> {
        let v: Value = self
            .request(
                "eth_getBlockByNumber",
                vec![json!(to_hex_quantity(number)), json!(false)],
            )
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        block_from_json(&v)
            .map(Some)
            .ok_or_else(|| WatcherError::Chain(format!("malformed block {number}")))
    }

    async fn get_logs(&self, block_hash: B256, address: Address) -> Result<Vec<RawLog>, WatcherError> {
        let filter = json!({ "blockHash": block_hash, "address": address });
        let logs: Vec<RpcLog> = self.request("eth_getLogs", vec![filter]).await?;
        Ok(logs.into_iter().map(RawLog::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::U256;
    use orchwatch_core::types::MAX_FUTURE_ROUND;

    use crate::rpc::{JsonRpcError, JsonRpcResponse};

    const BONDING: Address = Address::new([0x51; 20]);
    const REGISTRY: Address = Address::new([0x52; 20]);

    /// Answers `eth_call` by target contract and records every request.
    #[derive(Default)]
    struct MockTransport {
        uri: Option<String>,
        words: Option<Vec<U256>>,
        block_number: Value,
        requests: Mutex<Vec<JsonRpcRequest>>,
    }

    fn hex_value(bytes: Vec<u8>) -> Value {
        json!(format!("0x{}", hex::encode(bytes)))
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.requests.lock().unwrap().push(req.clone());
            if req.method == "eth_blockNumber" {
                return Ok(JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: json!(req.id),
                    result: Some(self.block_number.clone()),
                    error: None,
                });
            }
            let to: Address = serde_json::from_value(req.params[0]["to"].clone())?;
            let result = if to == REGISTRY {
                self.uri.clone().map(|u| {
                    hex_value(DynSolValue::Tuple(vec![DynSolValue::String(u)]).abi_encode_params())
                })
            } else {
                self.words.clone().map(|ws| {
                    hex_value(
                        DynSolValue::Tuple(
                            ws.into_iter().map(|w| DynSolValue::Uint(w, 256)).collect(),
                        )
                        .abi_encode_params(),
                    )
                })
            };
            Ok(match result {
                Some(result) => JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: json!(req.id),
                    result: Some(result),
                    error: None,
                },
                None => JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: json!(req.id),
                    result: None,
                    error: Some(JsonRpcError {
                        code: 3,
                        message: "execution reverted".into(),
                        data: None,
                    }),
                },
            })
        }

        fn url(&self) -> &str {
            "mock://"
        }
    }

    fn words(activation: U256, deactivation: U256) -> Vec<U256> {
        let mut ws = vec![U256::ZERO; abi::TRANSCODER_WORDS];
        ws[abi::ACTIVATION_ROUND_WORD] = activation;
        ws[abi::DEACTIVATION_ROUND_WORD] = deactivation;
        ws
    }

    #[tokio::test]
    async fn service_uri_calls_registry() {
        let transport = Arc::new(MockTransport {
            uri: Some("https://orch.example:8935".into()),
            ..Default::default()
        });
        let client = LivepeerClient::new(transport.clone(), BONDING, REGISTRY);
        let who = Address::repeat_byte(0x0a);

        assert_eq!(
            client.get_service_uri(who).await.unwrap(),
            "https://orch.example:8935"
        );

        let reqs = transport.requests.lock().unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "eth_call");
        assert_eq!(reqs[0].params[1], json!("latest"));
        let data = reqs[0].params[0]["data"].as_str().unwrap();
        assert_eq!(
            data,
            format!("0x214c2a4b{}", hex::encode(who.into_word()))
        );
    }

    #[tokio::test]
    async fn transcoder_snapshot_clamps_rounds() {
        let transport = Arc::new(MockTransport {
            uri: Some("s".into()),
            words: Some(words(U256::from(7), U256::MAX)),
            ..Default::default()
        });
        let client = LivepeerClient::new(transport, BONDING, REGISTRY);
        let who = Address::repeat_byte(0x0a);

        let rec = client.get_transcoder(who).await.unwrap();
        assert_eq!(
            rec,
            OrchestratorRecord {
                address: who,
                service_uri: "s".into(),
                activation_round: 7,
                deactivation_round: MAX_FUTURE_ROUND,
            }
        );
    }

    #[tokio::test]
    async fn revert_is_a_chain_error() {
        let transport = Arc::new(MockTransport::default());
        let client = LivepeerClient::new(transport, BONDING, REGISTRY);
        let err = client
            .get_transcoder(Address::repeat_byte(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WatcherError::Chain(_)));
    }

    #[tokio::test]
    async fn block_number_parses_hex() {
        let transport = Arc::new(MockTransport {
            block_number: json!("0x1b4"),
            ..Default::default()
        });
        let client = LivepeerClient::new(transport, BONDING, REGISTRY);
        assert_eq!(client.get_block_number().await.unwrap(), 436);
    }

    #[tokio::test]
    async fn garbage_block_number_is_a_chain_error() {
        let transport = Arc::new(MockTransport {
            block_number: json!("0xnot-hex"),
            ..Default::default()
        });
        let client = LivepeerClient::new(transport, BONDING, REGISTRY);
        let err = client.get_block_number().await.unwrap_err();
        assert!(matches!(err, WatcherError::Chain(_)), "got {err:?}");
    }
}
