//! Result Decoding
//!
//! Result payloads carry no type information: the schema is implied by the command
//! that produced them. The caller builds a [`DecoderSet`] mapping each
//! [`CommandKind`] to its decoder and looks the decoder up with the kind recorded
//! at dispatch time.

mod execute;
mod interfaces;

pub use execute::{ExecuteDecoder, ExecuteOutput};
pub use interfaces::{display_label, AddressCandidate, InterfaceDecoder, InterfaceReport};

use crate::agent::Agent;
use crate::config::DecodeConfig;
use crate::dispatch::CommandKind;
use crate::error::FleetError;
use std::collections::HashMap;

/// Typed result of one agent's command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedResult {
    Execute(ExecuteOutput),
    Interfaces(InterfaceReport),
}

/// Decoder for the payload schema of one command kind
pub trait ResultDecoder: Send + Sync {
    fn kind(&self) -> CommandKind;

    /// Decode `payload` produced by `agent`, or fail with `MalformedPayload`.
    fn decode(&self, agent: &Agent, payload: &[u8]) -> Result<DecodedResult, FleetError>;
}

/// Explicit command kind → decoder mapping
#[derive(Default)]
pub struct DecoderSet {
    decoders: HashMap<CommandKind, Box<dyn ResultDecoder>>,
}

impl DecoderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoders for every built-in command kind
    pub fn standard(config: &DecodeConfig) -> Self {
        let mut set = Self::new();
        set.register(Box::new(ExecuteDecoder));
        set.register(Box::new(InterfaceDecoder::new(config)));
        set
    }

    pub fn register(&mut self, decoder: Box<dyn ResultDecoder>) {
        self.decoders.insert(decoder.kind(), decoder);
    }

    pub fn decode(
        &self,
        kind: CommandKind,
        agent: &Agent,
        payload: &[u8],
    ) -> Result<DecodedResult, FleetError> {
        let decoder = self.decoders.get(&kind).ok_or_else(|| FleetError::MalformedPayload {
            agent: agent.display_name(),
            kind: kind.to_string(),
            reason: "no decoder registered for command kind".to_string(),
        })?;
        decoder.decode(agent, payload)
    }
}

pub(crate) fn malformed(agent: &Agent, kind: CommandKind, err: impl std::fmt::Display) -> FleetError {
    FleetError::MalformedPayload {
        agent: agent.display_name(),
        kind: kind.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, AgentKind};
    use crate::types::AgentId;

    fn agent() -> Agent {
        Agent::new(
            AgentKind::Connected,
            AgentInfo {
                id: AgentId::from("s1"),
                name: "S1".to_string(),
                hostname: "db1".to_string(),
                is_dead: false,
            },
        )
    }

    #[test]
    fn test_standard_set_routes_by_kind() {
        let set = DecoderSet::standard(&DecodeConfig::default());
        let result = set
            .decode(CommandKind::Execute, &agent(), br#"{"stdout":"ok\n"}"#)
            .unwrap();
        assert!(matches!(result, DecodedResult::Execute(_)));

        let result = set
            .decode(
                CommandKind::Ifconfig,
                &agent(),
                br#"{"net_interfaces":[{"name":"eth0","ip_addresses":["10.1.1.1/24"]}]}"#,
            )
            .unwrap();
        assert!(matches!(result, DecodedResult::Interfaces(_)));
    }

    #[test]
    fn test_missing_decoder_is_malformed() {
        let set = DecoderSet::new();
        let err = set.decode(CommandKind::Execute, &agent(), b"{}").unwrap_err();
        assert!(matches!(err, FleetError::MalformedPayload { .. }));
    }
}
