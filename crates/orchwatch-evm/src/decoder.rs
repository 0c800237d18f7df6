//! `BondingManagerDecoder`: the [`EventDecoder`] for the Livepeer
//! `BondingManager` contract.
//!
//! Both reconciled events share one layout: the transcoder is the single
//! indexed parameter (topic1) and the round is the only data word.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256};

use orchwatch_core::error::DecodeError;
use orchwatch_core::event::{EventDecoder, EventKind, OrchestratorEvent};
use orchwatch_core::types::{round_from_u256, RawLog};

use crate::abi;

/// Decodes logs emitted by one `BondingManager` deployment.
#[derive(Debug, Clone)]
pub struct BondingManagerDecoder {
    contract: Address,
    events: Vec<(B256, EventKind)>,
}

impl BondingManagerDecoder {
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            events: vec![
                (
                    abi::event_topic(abi::TRANSCODER_ACTIVATED),
                    EventKind::TranscoderActivated,
                ),
                (
                    abi::event_topic(abi::TRANSCODER_DEACTIVATED),
                    EventKind::TranscoderDeactivated,
                ),
            ],
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// topic0 for `kind`.
    pub fn topic_of(&self, kind: EventKind) -> B256 {
        self.events
            .iter()
            .find(|(_, k)| *k == kind)
            .map(|(t, _)| *t)
            .unwrap_or_default()
    }

    fn resolve(&self, log: &RawLog) -> Result<EventKind, DecodeError> {
        if log.address != self.contract {
            return Err(DecodeError::WrongContract {
                address: log.address.to_string(),
            });
        }
        let topic0 = log.topic(0).ok_or(DecodeError::MissingTopic { index: 0 })?;
        self.events
            .iter()
            .find(|(t, _)| t == topic0)
            .map(|(_, k)| *k)
            .ok_or_else(|| DecodeError::UnknownEvent {
                topic: topic0.to_string(),
            })
    }

    fn decode_round(data: &[u8]) -> Result<u64, DecodeError> {
        let decoded = DynSolType::Tuple(vec![DynSolType::Uint(256)])
            .abi_decode(data)
            .map_err(|e| DecodeError::AbiDecodeFailed {
                reason: e.to_string(),
            })?;
        let value = match decoded {
            DynSolValue::Tuple(mut vals) if vals.len() == 1 => vals.remove(0),
            other => other,
        };
        match value {
            DynSolValue::Uint(round, _) => Ok(round_from_u256(round)),
            other => Err(DecodeError::AbiDecodeFailed {
                reason: format!("expected uint256 round, got {other:?}"),
            }),
        }
    }
}

impl EventDecoder for BondingManagerDecoder {
    fn find_event_name(&self, log: &RawLog) -> Result<String, DecodeError> {
        self.resolve(log).map(|kind| kind.name().to_string())
    }

    fn decode(&self, kind: EventKind, log: &RawLog) -> Result<OrchestratorEvent, DecodeError> {
        let resolved = self.resolve(log)?;
        if resolved != kind {
            return Err(DecodeError::AbiDecodeFailed {
                reason: format!("log is {resolved}, not {kind}"),
            });
        }

        let word = log.topic(1).ok_or(DecodeError::MissingTopic { index: 1 })?;
        if word.as_slice()[..12].iter().any(|b| *b != 0) {
            return Err(DecodeError::AbiDecodeFailed {
                reason: format!("topic1 {word} is not an address"),
            });
        }
        let transcoder = Address::from_word(*word);
        let round = Self::decode_round(&log.data)?;

        Ok(match kind {
            EventKind::TranscoderActivated => OrchestratorEvent::TranscoderActivated {
                transcoder,
                activation_round: round,
            },
            EventKind::TranscoderDeactivated => OrchestratorEvent::TranscoderDeactivated {
                transcoder,
                deactivation_round: round,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use orchwatch_core::types::MAX_FUTURE_ROUND;

    const CONTRACT: Address = Address::new([0x51; 20]);

    fn round_data(round: U256) -> Bytes {
        Bytes::from(round.to_be_bytes::<32>().to_vec())
    }

    fn log(topics: Vec<B256>, data: Bytes) -> RawLog {
        RawLog {
            address: CONTRACT,
            topics,
            data,
            block_number: 100,
            block_hash: B256::repeat_byte(0xbb),
            tx_hash: B256::repeat_byte(0xcc),
            log_index: 0,
            removed: false,
        }
    }

    fn event_log(kind: EventKind, who: Address, round: u64) -> RawLog {
        let dec = BondingManagerDecoder::new(CONTRACT);
        log(
            vec![dec.topic_of(kind), who.into_word()],
            round_data(U256::from(round)),
        )
    }

    #[test]
    fn resolves_names() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let who = Address::repeat_byte(0x0a);
        assert_eq!(
            dec.find_event_name(&event_log(EventKind::TranscoderActivated, who, 1))
                .unwrap(),
            "TranscoderActivated"
        );
        assert_eq!(
            dec.find_event_name(&event_log(EventKind::TranscoderDeactivated, who, 1))
                .unwrap(),
            "TranscoderDeactivated"
        );
    }

    #[test]
    fn decodes_activation() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let who = Address::repeat_byte(0x0a);
        let ev = dec
            .decode(
                EventKind::TranscoderActivated,
                &event_log(EventKind::TranscoderActivated, who, 2_345),
            )
            .unwrap();
        assert_eq!(
            ev,
            OrchestratorEvent::TranscoderActivated {
                transcoder: who,
                activation_round: 2_345,
            }
        );
    }

    #[test]
    fn decodes_deactivation_and_clamps_huge_rounds() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let who = Address::repeat_byte(0x0b);
        let l = log(
            vec![dec.topic_of(EventKind::TranscoderDeactivated), who.into_word()],
            round_data(U256::MAX),
        );
        let ev = dec.decode(EventKind::TranscoderDeactivated, &l).unwrap();
        assert_eq!(
            ev,
            OrchestratorEvent::TranscoderDeactivated {
                transcoder: who,
                deactivation_round: MAX_FUTURE_ROUND,
            }
        );
    }

    #[test]
    fn other_contract_is_rejected() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let mut l = event_log(EventKind::TranscoderActivated, Address::repeat_byte(1), 1);
        l.address = Address::repeat_byte(0x99);
        assert!(matches!(
            dec.find_event_name(&l),
            Err(DecodeError::WrongContract { .. })
        ));
    }

    #[test]
    fn unknown_topic_and_missing_topics() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let bond = abi::event_topic("Bond(address,address,address,uint256,uint256)");
        assert!(matches!(
            dec.find_event_name(&log(vec![bond], Bytes::new())),
            Err(DecodeError::UnknownEvent { .. })
        ));
        assert_eq!(
            dec.find_event_name(&log(vec![], Bytes::new())),
            Err(DecodeError::MissingTopic { index: 0 })
        );

        let no_indexed = log(
            vec![dec.topic_of(EventKind::TranscoderActivated)],
            round_data(U256::from(1)),
        );
        assert_eq!(
            dec.decode(EventKind::TranscoderActivated, &no_indexed),
            Err(DecodeError::MissingTopic { index: 1 })
        );
    }

    #[test]
    fn malformed_data_is_a_decode_error() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let mut l = event_log(EventKind::TranscoderActivated, Address::repeat_byte(1), 1);
        l.data = Bytes::from(vec![0u8; 5]);
        assert!(matches!(
            dec.decode(EventKind::TranscoderActivated, &l),
            Err(DecodeError::AbiDecodeFailed { .. })
        ));
    }

    #[test]
    fn kind_mismatch_is_a_decode_error() {
        let dec = BondingManagerDecoder::new(CONTRACT);
        let l = event_log(EventKind::TranscoderActivated, Address::repeat_byte(1), 1);
        assert!(dec.decode(EventKind::TranscoderDeactivated, &l).is_err());
    }
}
