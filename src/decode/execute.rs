//! Decoder for plain command execution output.

use super::{malformed, DecodedResult, ResultDecoder};
use crate::agent::Agent;
use crate::dispatch::CommandKind;
use crate::error::FleetError;
use serde::Deserialize;

/// Captured output of an executed command
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ExecuteOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub status: Option<i32>,
}

pub struct ExecuteDecoder;

impl ResultDecoder for ExecuteDecoder {
    fn kind(&self) -> CommandKind {
        CommandKind::Execute
    }

    fn decode(&self, agent: &Agent, payload: &[u8]) -> Result<DecodedResult, FleetError> {
        let output: ExecuteOutput = serde_json::from_slice(payload)
            .map_err(|e| malformed(agent, CommandKind::Execute, e))?;
        Ok(DecodedResult::Execute(output))
    }
}
