//! Fan-Out Orchestration
//!
//! One run issues one command to every selected live agent and follows it to
//! completion:
//!
//! 1. List agents of each selected kind (sessions before beacons). A listing failure
//!    aborts the run before anything is dispatched.
//! 2. Dispatch to the live agents. Connected agents' results are decoded and handled
//!    on the spot; store-and-forward agents get a pending task.
//! 3. Poll until every pending task is reconciled or the cycle budget runs out, then
//!    report each agent still pending as unresponsive.
//!
//! What happens with a decoded result depends on the [`Operation`]: printing it,
//! renaming the agent after its address, or pushing its addresses to notification
//! sinks. The registry and all counters live for the duration of a single run.

use crate::agent::{Agent, AgentDirectory, AgentSelector};
use crate::config::FleetConfig;
use crate::control_plane::ControlPlane;
use crate::decode::{DecodedResult, DecoderSet};
use crate::dispatch::{Command, DispatchOutcome, Dispatcher};
use crate::error::FleetError;
use crate::notify::{Discovery, NotificationSink};
use crate::pending::{PendingRegistry, PendingTask};
use crate::poller::{PollConfig, Poller, ResultHandler};
use crate::report::{ReportEvent, Reporter};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What a fan-out does with each agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Execute a program and print its output
    RunCommand { path: String, args: Vec<String> },
    /// Rename each agent after its routable address and hostname
    Rename,
    /// Push each agent's routable addresses to the notification sinks
    Notify,
}

impl Operation {
    /// Command dispatched to every agent for this operation
    pub fn command(&self) -> Command {
        match self {
            Operation::RunCommand { path, args } => Command::Execute {
                path: path.clone(),
                args: args.clone(),
            },
            Operation::Rename | Operation::Notify => Command::Ifconfig,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::RunCommand { path, .. } => write!(f, "command {}", path),
            Operation::Rename => f.write_str("rename"),
            Operation::Notify => f.write_str("notify"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FanOutSettings {
    pub result_timeout: Duration,
    pub dispatch_concurrency: usize,
    pub poll: PollConfig,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self::from(&FleetConfig::default())
    }
}

impl From<&FleetConfig> for FanOutSettings {
    fn from(config: &FleetConfig) -> Self {
        Self {
            result_timeout: Duration::from_secs(config.dispatch.result_timeout_secs),
            dispatch_concurrency: config.dispatch.concurrency,
            poll: PollConfig::from(&config.polling),
        }
    }
}

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FanOutSummary {
    /// Live agents a command was addressed to
    pub targeted: usize,
    pub dead: usize,
    pub dispatch_failed: usize,
    /// Agents whose result came back, decodable or not
    pub responded: usize,
    pub undecodable: usize,
    pub unresponsive: usize,
    pub renamed: usize,
    /// Discovered addresses accepted by at least one sink
    pub notified: usize,
    pub cycles: u32,
}

impl fmt::Display for FanOutSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} targeted, {} responded, {} unresponsive, {} dispatch failures, {} dead skipped ({} poll cycles)",
            self.targeted,
            self.responded,
            self.unresponsive,
            self.dispatch_failed,
            self.dead,
            self.cycles
        )
    }
}

pub struct FanOut<'a> {
    plane: &'a dyn ControlPlane,
    decoders: &'a DecoderSet,
    settings: FanOutSettings,
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl<'a> FanOut<'a> {
    pub fn new(plane: &'a dyn ControlPlane, decoders: &'a DecoderSet, settings: FanOutSettings) -> Self {
        Self {
            plane,
            decoders,
            settings,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run `operation` against every live agent admitted by `selector`.
    ///
    /// Fails only when the agent directory cannot be listed.
    pub async fn run(
        &self,
        operation: &Operation,
        selector: &AgentSelector,
        reporter: &mut dyn Reporter,
    ) -> Result<FanOutSummary, FleetError> {
        let directory = AgentDirectory::new(self.plane);
        let mut listings = Vec::new();
        for kind in selector.kinds() {
            listings.push(directory.listing(kind, selector).await?);
        }

        if matches!(operation, Operation::Notify) && self.sinks.is_empty() {
            warn!("No notification sinks configured, discoveries will only be reported");
        }

        let command = operation.command();
        let dispatcher = Dispatcher::new(
            self.plane,
            self.settings.result_timeout,
            self.settings.dispatch_concurrency,
        );
        let mut registry = PendingRegistry::new();
        let mut handler = OperationHandler {
            operation,
            plane: self.plane,
            sinks: &self.sinks,
            reporter,
            summary: FanOutSummary::default(),
        };

        info!(operation = %operation, "Starting fan-out");
        for listing in listings {
            for agent in listing.dead {
                handler.summary.dead += 1;
                handler.reporter.report(ReportEvent::Dead { agent });
            }
            handler.summary.targeted += listing.live.len();

            for (agent, outcome) in dispatcher.dispatch_all(&listing.live, &command).await {
                match outcome {
                    DispatchOutcome::Immediate(payload) => {
                        let decoded = self.decoders.decode(command.kind(), &agent, &payload);
                        handler.handle(&agent, decoded).await;
                    }
                    DispatchOutcome::Accepted(task_id) => {
                        let task = PendingTask {
                            task_id: task_id.clone(),
                            agent: agent.clone(),
                            command: command.kind(),
                        };
                        match registry.insert(task) {
                            Ok(()) => handler
                                .reporter
                                .report(ReportEvent::Awaiting { agent, task_id }),
                            Err(e) => {
                                error!(agent = %agent.display_name(), error = %e, "Refusing second pending task");
                                handler.summary.dispatch_failed += 1;
                                handler.reporter.report(ReportEvent::DispatchFailed {
                                    agent,
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                    DispatchOutcome::Failed(err) => {
                        let reason = match err {
                            FleetError::DispatchFailed { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        handler.summary.dispatch_failed += 1;
                        handler
                            .reporter
                            .report(ReportEvent::DispatchFailed { agent, reason });
                    }
                }
            }
        }

        let poll = Poller::new(self.plane, self.decoders, self.settings.poll.clone())
            .run(&mut registry, &mut handler)
            .await;

        let mut summary = handler.summary;
        summary.cycles = poll.cycles;
        summary.unresponsive = poll.unresponsive.len();
        for task in poll.unresponsive {
            handler.reporter.report(ReportEvent::Unresponsive { agent: task.agent });
        }

        info!(summary = %summary, "Fan-out finished");
        Ok(summary)
    }
}

/// Applies the operation to each result as it arrives
struct OperationHandler<'a, 'r> {
    operation: &'a Operation,
    plane: &'a dyn ControlPlane,
    sinks: &'a [Arc<dyn NotificationSink>],
    reporter: &'r mut dyn Reporter,
    summary: FanOutSummary,
}

impl OperationHandler<'_, '_> {
    async fn rename(&mut self, agent: &Agent, result: &DecodedResult) {
        let DecodedResult::Interfaces(report) = result else {
            return;
        };
        for candidate in &report.candidates {
            let name = candidate.label.clone();
            match self.plane.rename(agent, &name).await {
                Ok(()) => {
                    info!(agent = %agent.display_name(), name = %name, "Renamed agent");
                    self.summary.renamed += 1;
                    self.reporter.report(ReportEvent::Renamed {
                        agent: agent.clone(),
                        name,
                    });
                }
                Err(e) => {
                    warn!(agent = %agent.display_name(), name = %name, error = %e, "Rename failed");
                    self.reporter.report(ReportEvent::RenameFailed {
                        agent: agent.clone(),
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn notify(&mut self, agent: &Agent, result: &DecodedResult) {
        let DecodedResult::Interfaces(report) = result else {
            return;
        };
        for candidate in &report.candidates {
            let discovery = Discovery {
                address: candidate.address,
                agent_kind: agent.kind(),
            };
            let mut delivered = false;
            for sink in self.sinks {
                match sink.notify(&discovery).await {
                    Ok(()) => delivered = true,
                    Err(e) => warn!(
                        agent = %agent.display_name(),
                        address = %candidate.address,
                        error = %e,
                        "Notification sink failed"
                    ),
                }
            }
            if !delivered {
                continue;
            }
            self.summary.notified += 1;
            self.reporter.report(ReportEvent::Notified {
                agent: agent.clone(),
                address: candidate.address,
            });
        }
    }
}

#[async_trait]
impl<'a, 'r> ResultHandler for OperationHandler<'a, 'r> {
    async fn handle(&mut self, agent: &Agent, outcome: Result<DecodedResult, FleetError>) {
        self.summary.responded += 1;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.summary.undecodable += 1;
                self.reporter.report(ReportEvent::Undecodable {
                    agent: agent.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        match self.operation {
            Operation::RunCommand { .. } => {}
            Operation::Rename => self.rename(agent, &result).await,
            Operation::Notify => self.notify(agent, &result).await,
        }
        self.reporter.report(ReportEvent::Result {
            agent: agent.clone(),
            result,
        });
    }
}
