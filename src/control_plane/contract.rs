//! Control-plane contract consumed by the dispatch engine.

use crate::agent::{Agent, AgentKind};
use crate::dispatch::DispatchRequest;
use crate::error::FleetError;
use crate::types::TaskId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Execution state of a queued work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Sent,
    Completed,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// A work item queued for a store-and-forward agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(alias = "task_id")]
    pub id: TaskId,
    pub state: TaskState,
}

impl WorkItem {
    pub fn new(id: impl Into<TaskId>, state: TaskState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    /// Only completed items are eligible for reconciliation
    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }
}

/// Reply to a dispatch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReply {
    /// Output of a command executed synchronously, still encoded
    Immediate(Vec<u8>),
    /// Work accepted and queued; completion is observed by polling
    Queued(TaskId),
}

/// Operations the engine needs from the command-and-control server.
///
/// Every method is a single blocking RPC from the engine's point of view; the
/// engine decides ordering and concurrency.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List every known agent of one kind, dead agents included.
    async fn list_agents(&self, kind: AgentKind) -> Result<Vec<Agent>, FleetError>;

    /// Issue one command to one agent.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReply, FleetError>;

    /// List the work items queued for a store-and-forward agent.
    async fn list_work_items(&self, agent: &Agent) -> Result<Vec<WorkItem>, FleetError>;

    /// Fetch the encoded result of a completed work item.
    async fn fetch_payload(&self, agent: &Agent, item: &WorkItem) -> Result<Vec<u8>, FleetError>;

    /// Rename an agent.
    async fn rename(&self, agent: &Agent, name: &str) -> Result<(), FleetError>;
}
