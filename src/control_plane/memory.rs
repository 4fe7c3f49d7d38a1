//! Scripted in-memory control plane.
//!
//! Store-and-forward completion is modeled by poll count: an agent scripted with
//! `complete_after(id, n)` reports its task completed from its n-th work-item
//! listing onward. Unscripted agents never complete.

use super::contract::{ControlPlane, DispatchReply, TaskState, WorkItem};
use crate::agent::{Agent, AgentKind};
use crate::dispatch::{Command, DispatchRequest};
use crate::error::FleetError;
use crate::types::{AgentId, TaskId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct State {
    agents: Vec<Agent>,
    payloads: HashMap<AgentId, Vec<u8>>,
    completes_after: HashMap<AgentId, u32>,
    queued: HashMap<AgentId, TaskId>,
    polls: HashMap<AgentId, u32>,
    extra_items: HashMap<AgentId, Vec<WorkItem>>,
    duplicated: HashSet<AgentId>,
    failing_listings: HashSet<AgentKind>,
    failing_dispatch: HashSet<AgentId>,
    failing_work_items: HashSet<AgentId>,
    failing_fetch: HashSet<AgentId>,
    failing_rename: HashSet<AgentId>,
    dispatched: Vec<(AgentId, Command)>,
    fetched: Vec<(AgentId, TaskId)>,
    renames: Vec<(AgentId, String)>,
    next_task: u64,
}

/// Control plane backed by in-process state
#[derive(Default)]
pub struct InMemoryControlPlane {
    state: Mutex<State>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&self, agent: Agent) {
        self.state.lock().agents.push(agent);
    }

    /// Encoded result returned for this agent (dispatch reply or task content)
    pub fn set_payload(&self, agent: &AgentId, payload: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .payloads
            .insert(agent.clone(), payload.into());
    }

    /// Report the agent's queued task completed from its `polls`-th listing on
    pub fn complete_after(&self, agent: &AgentId, polls: u32) {
        self.state
            .lock()
            .completes_after
            .insert(agent.clone(), polls);
    }

    /// List the completed task twice, as a re-delivered notification would
    pub fn duplicate_completion(&self, agent: &AgentId) {
        self.state.lock().duplicated.insert(agent.clone());
    }

    /// Add an item to every listing for this agent
    pub fn add_work_item(&self, agent: &AgentId, item: WorkItem) {
        self.state
            .lock()
            .extra_items
            .entry(agent.clone())
            .or_default()
            .push(item);
    }

    pub fn fail_listing(&self, kind: AgentKind) {
        self.state.lock().failing_listings.insert(kind);
    }

    pub fn fail_dispatch(&self, agent: &AgentId) {
        self.state.lock().failing_dispatch.insert(agent.clone());
    }

    pub fn fail_work_items(&self, agent: &AgentId) {
        self.state.lock().failing_work_items.insert(agent.clone());
    }

    pub fn fail_fetch(&self, agent: &AgentId) {
        self.state.lock().failing_fetch.insert(agent.clone());
    }

    pub fn fail_rename(&self, agent: &AgentId) {
        self.state.lock().failing_rename.insert(agent.clone());
    }

    /// Commands dispatched so far, in order
    pub fn dispatched(&self) -> Vec<(AgentId, Command)> {
        self.state.lock().dispatched.clone()
    }

    /// Payload fetches so far, in order
    pub fn fetched(&self) -> Vec<(AgentId, TaskId)> {
        self.state.lock().fetched.clone()
    }

    /// Successful renames so far, in order
    pub fn renames(&self) -> Vec<(AgentId, String)> {
        self.state.lock().renames.clone()
    }

    /// Number of work-item listings requested for an agent
    pub fn polls(&self, agent: &AgentId) -> u32 {
        self.state.lock().polls.get(agent).copied().unwrap_or(0)
    }

    pub fn queued_task(&self, agent: &AgentId) -> Option<TaskId> {
        self.state.lock().queued.get(agent).cloned()
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn list_agents(&self, kind: AgentKind) -> Result<Vec<Agent>, FleetError> {
        let state = self.state.lock();
        if state.failing_listings.contains(&kind) {
            return Err(FleetError::ControlPlane(format!(
                "listing {} unavailable",
                kind.collection()
            )));
        }
        Ok(state
            .agents
            .iter()
            .filter(|a| a.kind() == kind)
            .cloned()
            .collect())
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReply, FleetError> {
        let mut state = self.state.lock();
        let agent_id = request.agent.id().clone();
        if state.failing_dispatch.contains(&agent_id) {
            return Err(FleetError::ControlPlane(format!(
                "agent {} rejected the request",
                agent_id
            )));
        }
        state
            .dispatched
            .push((agent_id.clone(), request.command.clone()));

        if request.asynchronous {
            state.next_task += 1;
            let task_id = TaskId::new(format!("task-{}", state.next_task));
            state.queued.insert(agent_id, task_id.clone());
            Ok(DispatchReply::Queued(task_id))
        } else {
            let payload = state.payloads.get(&agent_id).cloned().unwrap_or_default();
            Ok(DispatchReply::Immediate(payload))
        }
    }

    async fn list_work_items(&self, agent: &Agent) -> Result<Vec<WorkItem>, FleetError> {
        let mut state = self.state.lock();
        let agent_id = agent.id().clone();
        let polls = {
            let count = state.polls.entry(agent_id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if state.failing_work_items.contains(&agent_id) {
            return Err(FleetError::ControlPlane(format!(
                "work items for {} unavailable",
                agent_id
            )));
        }

        let mut items = state.extra_items.get(&agent_id).cloned().unwrap_or_default();
        if let Some(task_id) = state.queued.get(&agent_id) {
            let completed = state
                .completes_after
                .get(&agent_id)
                .map(|after| polls >= *after)
                .unwrap_or(false);
            let item_state = if completed {
                TaskState::Completed
            } else {
                TaskState::Pending
            };
            items.push(WorkItem::new(task_id.clone(), item_state.clone()));
            if completed && state.duplicated.contains(&agent_id) {
                items.push(WorkItem::new(task_id.clone(), item_state));
            }
        }
        Ok(items)
    }

    async fn fetch_payload(&self, agent: &Agent, item: &WorkItem) -> Result<Vec<u8>, FleetError> {
        let mut state = self.state.lock();
        let agent_id = agent.id().clone();
        if state.failing_fetch.contains(&agent_id) {
            return Err(FleetError::ControlPlane(format!(
                "content of {} unavailable",
                item.id
            )));
        }
        state.fetched.push((agent_id.clone(), item.id.clone()));
        Ok(state.payloads.get(&agent_id).cloned().unwrap_or_default())
    }

    async fn rename(&self, agent: &Agent, name: &str) -> Result<(), FleetError> {
        let mut state = self.state.lock();
        let agent_id = agent.id().clone();
        if state.failing_rename.contains(&agent_id) {
            return Err(FleetError::ControlPlane(format!(
                "rename of {} refused",
                agent_id
            )));
        }
        state.renames.push((agent_id, name.to_string()));
        Ok(())
    }
}
