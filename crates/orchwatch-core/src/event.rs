//! Decoded staking events and the decoder trait.

use alloy_primitives::Address;

use crate::error::DecodeError;
use crate::types::RawLog;

/// The event kinds the watcher reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TranscoderActivated,
    TranscoderDeactivated,
}

impl EventKind {
    /// Resolve an ABI event name. Any other name returns `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TranscoderActivated" => Some(Self::TranscoderActivated),
            "TranscoderDeactivated" => Some(Self::TranscoderDeactivated),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TranscoderActivated => "TranscoderActivated",
            Self::TranscoderDeactivated => "TranscoderDeactivated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A log decoded into one of the reconciled event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorEvent {
    TranscoderActivated {
        transcoder: Address,
        activation_round: u64,
    },
    TranscoderDeactivated {
        transcoder: Address,
        deactivation_round: u64,
    },
}

impl OrchestratorEvent {
    /// The orchestrator this event is about.
    pub fn transcoder(&self) -> Address {
        match self {
            Self::TranscoderActivated { transcoder, .. }
            | Self::TranscoderDeactivated { transcoder, .. } => *transcoder,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::TranscoderActivated { .. } => EventKind::TranscoderActivated,
            Self::TranscoderDeactivated { .. } => EventKind::TranscoderDeactivated,
        }
    }
}

/// Resolves and decodes raw logs of the watched contract.
///
/// Implementations are scoped to one contract address; logs emitted by any
/// other contract resolve to an error.
pub trait EventDecoder: Send + Sync {
    /// Resolve the ABI event name of `log`.
    fn find_event_name(&self, log: &RawLog) -> Result<String, DecodeError>;

    /// Decode `log` as an event of `kind`.
    fn decode(&self, kind: EventKind, log: &RawLog) -> Result<OrchestratorEvent, DecodeError>;
}
