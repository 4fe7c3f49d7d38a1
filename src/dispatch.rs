//! Command Dispatch
//!
//! Issues one command per agent. Connected agents answer with the encoded result in
//! the reply; store-and-forward agents only acknowledge that the work was queued and
//! hand back a task identifier. Failed dispatches are reported and never retried.

use crate::agent::Agent;
use crate::control_plane::{ControlPlane, DispatchReply};
use crate::error::FleetError;
use crate::types::TaskId;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Command issued to every targeted agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Run a program on the agent and capture its output
    Execute { path: String, args: Vec<String> },
    /// Enumerate network interfaces and their addresses
    Ifconfig,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Execute { .. } => CommandKind::Execute,
            Command::Ifconfig => CommandKind::Ifconfig,
        }
    }
}

/// Command kind, selecting the schema its result payload is decoded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Execute,
    Ifconfig,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Execute => f.write_str("execute"),
            CommandKind::Ifconfig => f.write_str("ifconfig"),
        }
    }
}

/// One command addressed to one agent
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub agent: Agent,
    pub command: Command,
    /// Result timeout for the agent-side execution, independent of the poll budget
    pub timeout: Duration,
    /// Set for store-and-forward agents: queue the work instead of waiting for it
    pub asynchronous: bool,
}

impl DispatchRequest {
    pub fn new(agent: Agent, command: Command, timeout: Duration) -> Self {
        let asynchronous = !agent.completes_synchronously();
        Self {
            agent,
            command,
            timeout,
            asynchronous,
        }
    }
}

/// Result of dispatching to a single agent
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Connected agent: encoded output, ready for decoding
    Immediate(Vec<u8>),
    /// Store-and-forward agent: work queued under this task identifier
    Accepted(TaskId),
    /// The dispatch call itself failed; the agent is dropped from this run.
    /// Always a [`FleetError::DispatchFailed`].
    Failed(FleetError),
}

/// Issues commands through the control plane
pub struct Dispatcher<'a> {
    plane: &'a dyn ControlPlane,
    result_timeout: Duration,
    concurrency: usize,
}

impl<'a> Dispatcher<'a> {
    pub fn new(plane: &'a dyn ControlPlane, result_timeout: Duration, concurrency: usize) -> Self {
        Self {
            plane,
            result_timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Dispatch `command` to a single agent.
    pub async fn dispatch(&self, agent: &Agent, command: &Command) -> DispatchOutcome {
        let request = DispatchRequest::new(agent.clone(), command.clone(), self.result_timeout);
        debug!(
            agent = %agent.display_name(),
            command = %command.kind(),
            asynchronous = request.asynchronous,
            "Dispatching command"
        );

        match self.plane.dispatch(&request).await {
            Ok(DispatchReply::Immediate(payload)) if agent.completes_synchronously() => {
                DispatchOutcome::Immediate(payload)
            }
            Ok(DispatchReply::Queued(task_id)) if !agent.completes_synchronously() => {
                info!(
                    agent = %agent.display_name(),
                    task_id = %task_id,
                    "Work queued, will check back with this agent"
                );
                DispatchOutcome::Accepted(task_id)
            }
            Ok(reply) => {
                let reason = format!("unexpected {} reply for {} agent", reply_label(&reply), agent.kind());
                warn!(agent = %agent.display_name(), reason = %reason, "Dispatch failed");
                failed(agent, reason)
            }
            Err(e) => {
                warn!(agent = %agent.display_name(), error = %e, "Dispatch failed");
                failed(agent, e.to_string())
            }
        }
    }

    /// Dispatch `command` to every agent, keeping at most `concurrency` calls in flight.
    ///
    /// Outcomes are returned in the order of `agents`.
    pub async fn dispatch_all(
        &self,
        agents: &[Agent],
        command: &Command,
    ) -> Vec<(Agent, DispatchOutcome)> {
        stream::iter(agents)
            .map(|agent| async move { (agent.clone(), self.dispatch(agent, command).await) })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

fn failed(agent: &Agent, reason: String) -> DispatchOutcome {
    DispatchOutcome::Failed(FleetError::DispatchFailed {
        agent: agent.display_name(),
        reason,
    })
}

fn reply_label(reply: &DispatchReply) -> &'static str {
    match reply {
        DispatchReply::Immediate(_) => "immediate",
        DispatchReply::Queued(_) => "queued",
    }
}
