//! Error types for fan-out dispatch and reconciliation.

use crate::types::{AgentId, TaskId};
use thiserror::Error;

/// Errors surfaced by the engine and its collaborators.
#[derive(Error, Debug)]
pub enum FleetError {
    /// Any failure talking to the control plane (transport, status, body).
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    #[error("Dispatch to {agent} failed: {reason}")]
    DispatchFailed { agent: String, reason: String },

    /// Payload could not be decoded against the schema of its command kind.
    #[error("Malformed {kind} payload from {agent}: {reason}")]
    MalformedPayload {
        agent: String,
        kind: String,
        reason: String,
    },

    #[error("Agent {agent} already has pending task {task_id}")]
    AlreadyPending { agent: AgentId, task_id: TaskId },

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    pub fn control_plane(context: &str, err: impl std::fmt::Display) -> Self {
        FleetError::ControlPlane(format!("{}: {}", context, err))
    }
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        FleetError::ControlPlane(err.to_string())
    }
}
