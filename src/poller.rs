//! Bounded Completion Polling
//!
//! Drives the wait for store-and-forward agents. Each cycle sleeps a fixed
//! interval, asks the control plane for every still-pending agent's work items,
//! fetches the payloads of completed ones and reconciles them in registry order.
//! The loop ends when the registry empties or the cycle budget runs out; whatever
//! is still pending then is handed back as unresponsive.
//!
//! Within a cycle, per-agent queries may overlap up to the configured concurrency.
//! Cycles never overlap: every query of cycle N is reconciled before the sleep of
//! cycle N+1 starts.

use crate::agent::Agent;
use crate::config::PollingConfig;
use crate::control_plane::ControlPlane;
use crate::decode::{DecodedResult, DecoderSet};
use crate::error::FleetError;
use crate::pending::{PendingRegistry, PendingTask};
use crate::reconcile::{CompletedWorkItem, Reconciler, Reconciliation};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Receives each agent's result as soon as it is available
#[async_trait]
pub trait ResultHandler: Send {
    /// `Err` carries the decode failure of an agent that did respond.
    async fn handle(&mut self, agent: &Agent, outcome: Result<DecodedResult, FleetError>);
}

/// Poll loop timing
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Sleep before every cycle, the first included
    pub interval: Duration,
    pub max_cycles: u32,
    /// Per-agent queries in flight within one cycle
    pub concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            max_cycles: config.max_cycles,
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Outcome of one polling run
#[derive(Debug, Default)]
pub struct PollSummary {
    pub cycles: u32,
    /// Tasks closed by a completion, decodable or not
    pub reconciled: usize,
    pub undecodable: usize,
    /// Tasks still pending when the budget ran out, in dispatch order
    pub unresponsive: Vec<PendingTask>,
}

pub struct Poller<'a> {
    plane: &'a dyn ControlPlane,
    reconciler: Reconciler<'a>,
    config: PollConfig,
}

impl<'a> Poller<'a> {
    pub fn new(plane: &'a dyn ControlPlane, decoders: &'a DecoderSet, config: PollConfig) -> Self {
        Self {
            plane,
            reconciler: Reconciler::new(decoders),
            config,
        }
    }

    /// Poll until every pending task is reconciled or the cycle budget is spent.
    ///
    /// The registry is empty when this returns; leftovers are in
    /// [`PollSummary::unresponsive`].
    pub async fn run(
        &self,
        registry: &mut PendingRegistry,
        handler: &mut dyn ResultHandler,
    ) -> PollSummary {
        let mut summary = PollSummary::default();

        while summary.cycles < self.config.max_cycles && !registry.is_empty() {
            info!(
                pending = registry.len(),
                interval_secs = self.config.interval.as_secs(),
                "Waiting before next poll cycle"
            );
            sleep(self.config.interval).await;
            summary.cycles += 1;

            let completions = self.poll_cycle(registry.snapshot(), summary.cycles).await;
            for item in completions {
                match self.reconciler.reconcile(registry, item) {
                    Reconciliation::Decoded { task, result } => {
                        summary.reconciled += 1;
                        handler.handle(&task.agent, Ok(result)).await;
                    }
                    Reconciliation::Undecodable { task, error } => {
                        summary.reconciled += 1;
                        summary.undecodable += 1;
                        handler.handle(&task.agent, Err(error)).await;
                    }
                    Reconciliation::Unmatched => {}
                }
            }

            if registry.is_empty() {
                info!(cycle = summary.cycles, "Every pending agent responded");
            }
        }

        summary.unresponsive = registry.drain();
        if !summary.unresponsive.is_empty() {
            warn!(
                cycles = summary.cycles,
                unresponsive = summary.unresponsive.len(),
                "Poll budget exhausted with agents still pending"
            );
        }
        summary
    }

    /// Query every agent in `snapshot`; completions come back in snapshot order.
    async fn poll_cycle(&self, snapshot: Vec<PendingTask>, cycle: u32) -> Vec<CompletedWorkItem> {
        stream::iter(snapshot)
            .map(|task| self.poll_agent(task, cycle))
            .buffered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Fetch the payload of `task` if the listing shows it completed.
    /// Repeated copies of the same id in one listing cost a single fetch.
    async fn poll_agent(&self, task: PendingTask, cycle: u32) -> Option<CompletedWorkItem> {
        let items = match self.plane.list_work_items(&task.agent).await {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    cycle,
                    agent = %task.agent.display_name(),
                    error = %e,
                    "Failed to list work items"
                );
                return None;
            }
        };

        let Some(item) = items
            .into_iter()
            .find(|item| item.is_completed() && item.id == task.task_id)
        else {
            debug!(cycle, agent = %task.agent.display_name(), "No completion yet");
            return None;
        };
        match self.plane.fetch_payload(&task.agent, &item).await {
            Ok(payload) => Some(CompletedWorkItem {
                task_id: item.id,
                state: item.state,
                payload,
            }),
            Err(e) => {
                warn!(
                    cycle,
                    agent = %task.agent.display_name(),
                    task_id = %item.id,
                    error = %e,
                    "Failed to fetch task payload, will retry next cycle"
                );
                None
            }
        }
    }
}
