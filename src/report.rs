//! Operator-facing output.
//!
//! Everything the operator is meant to read goes through a [`Reporter`]; engine
//! diagnostics go through `tracing`. Results are reported as they are reconciled.
//! Unresponsive notices arrive only once the poll budget is spent.

use crate::agent::Agent;
use crate::decode::DecodedResult;
use crate::types::TaskId;
use chrono::Utc;
use owo_colors::OwoColorize;
use serde_json::json;
use std::io::Write;
use std::net::Ipv4Addr;

/// Something the operator should see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// Excluded from the run by its liveness snapshot
    Dead { agent: Agent },
    DispatchFailed { agent: Agent, reason: String },
    /// Work queued; the result arrives during polling
    Awaiting { agent: Agent, task_id: TaskId },
    Result { agent: Agent, result: DecodedResult },
    /// The agent responded but its payload could not be decoded
    Undecodable { agent: Agent, reason: String },
    Renamed { agent: Agent, name: String },
    RenameFailed { agent: Agent, name: String, reason: String },
    Notified { agent: Agent, address: Ipv4Addr },
    /// Still pending when the poll budget ran out
    Unresponsive { agent: Agent },
}

impl ReportEvent {
    pub fn agent(&self) -> &Agent {
        match self {
            ReportEvent::Dead { agent }
            | ReportEvent::DispatchFailed { agent, .. }
            | ReportEvent::Awaiting { agent, .. }
            | ReportEvent::Result { agent, .. }
            | ReportEvent::Undecodable { agent, .. }
            | ReportEvent::Renamed { agent, .. }
            | ReportEvent::RenameFailed { agent, .. }
            | ReportEvent::Notified { agent, .. }
            | ReportEvent::Unresponsive { agent } => agent,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReportEvent::Dead { .. } => "dead",
            ReportEvent::DispatchFailed { .. } => "dispatch_failed",
            ReportEvent::Awaiting { .. } => "awaiting",
            ReportEvent::Result { .. } => "result",
            ReportEvent::Undecodable { .. } => "undecodable",
            ReportEvent::Renamed { .. } => "renamed",
            ReportEvent::RenameFailed { .. } => "rename_failed",
            ReportEvent::Notified { .. } => "notified",
            ReportEvent::Unresponsive { .. } => "unresponsive",
        }
    }
}

pub trait Reporter: Send {
    fn report(&mut self, event: ReportEvent);
}

/// Human-readable lines, colored when `color` is set
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    color: bool,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        Self::new(std::io::stdout(), color)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn heading(&self, agent: &Agent) -> String {
        let name = agent.display_name();
        if self.color {
            format!("[{}] {}", agent.kind().cyan(), name.bold())
        } else {
            format!("[{}] {}", agent.kind(), name)
        }
    }

    fn notice(&self, text: String) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text
        }
    }

    fn render(&self, event: &ReportEvent) -> String {
        let agent = event.agent();
        match event {
            ReportEvent::Dead { .. } => {
                self.notice(format!("{} is dead, skipping", agent.display_name()))
            }
            ReportEvent::DispatchFailed { reason, .. } => self.notice(format!(
                "dispatch to {} failed: {}",
                agent.display_name(),
                reason
            )),
            ReportEvent::Awaiting { task_id, .. } => {
                format!("{} queued task {}", self.heading(agent), task_id)
            }
            ReportEvent::Result { result, .. } => {
                let mut text = self.heading(agent);
                match result {
                    DecodedResult::Execute(output) => {
                        if !output.stdout.is_empty() {
                            text.push('\n');
                            text.push_str(output.stdout.trim_end());
                        }
                        if !output.stderr.is_empty() {
                            text.push('\n');
                            text.push_str(&self.notice(output.stderr.trim_end().to_string()));
                        }
                    }
                    DecodedResult::Interfaces(report) => {
                        for candidate in &report.candidates {
                            text.push_str(&format!(
                                "\n  {} {} ({})",
                                candidate.interface, candidate.address, candidate.label
                            ));
                        }
                    }
                }
                text
            }
            ReportEvent::Undecodable { reason, .. } => self.notice(format!(
                "unreadable result from {}: {}",
                agent.display_name(),
                reason
            )),
            ReportEvent::Renamed { name, .. } => {
                format!("{} renamed to {}", self.heading(agent), name)
            }
            ReportEvent::RenameFailed { name, reason, .. } => self.notice(format!(
                "rename of {} to {} failed: {}",
                agent.display_name(),
                name,
                reason
            )),
            ReportEvent::Notified { address, .. } => {
                format!("{} reported {}", self.heading(agent), address)
            }
            ReportEvent::Unresponsive { .. } => {
                let text = format!("no response from {}", agent.display_name());
                if self.color {
                    text.red().to_string()
                } else {
                    text
                }
            }
        }
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&mut self, event: ReportEvent) {
        let line = self.render(&event);
        if let Err(e) = writeln!(self.out, "{}", line) {
            tracing::warn!(error = %e, "Failed to write report line");
        }
    }
}

/// One JSON object per line
pub struct JsonReporter<W: Write + Send> {
    out: W,
}

impl JsonReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn to_value(event: &ReportEvent) -> serde_json::Value {
        let agent = event.agent();
        let mut value = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event.label(),
            "agent": {
                "id": agent.id(),
                "kind": agent.kind(),
                "name": agent.name(),
                "hostname": agent.hostname(),
            },
        });
        let detail = match event {
            ReportEvent::DispatchFailed { reason, .. }
            | ReportEvent::Undecodable { reason, .. } => json!({ "reason": reason }),
            ReportEvent::Awaiting { task_id, .. } => json!({ "task_id": task_id }),
            ReportEvent::Result { result, .. } => match result {
                DecodedResult::Execute(output) => json!({
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                    "status": output.status,
                }),
                DecodedResult::Interfaces(report) => json!({
                    "candidates": report
                        .candidates
                        .iter()
                        .map(|c| json!({
                            "interface": c.interface,
                            "address": c.address.to_string(),
                            "label": c.label,
                        }))
                        .collect::<Vec<_>>(),
                }),
            },
            ReportEvent::Renamed { name, .. } => json!({ "name": name }),
            ReportEvent::RenameFailed { name, reason, .. } => {
                json!({ "name": name, "reason": reason })
            }
            ReportEvent::Notified { address, .. } => json!({ "address": address.to_string() }),
            ReportEvent::Dead { .. } | ReportEvent::Unresponsive { .. } => json!({}),
        };
        if let (Some(obj), serde_json::Value::Object(extra)) = (value.as_object_mut(), detail) {
            obj.extend(extra);
        }
        value
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&mut self, event: ReportEvent) {
        let value = Self::to_value(&event);
        if let Err(e) = writeln!(self.out, "{}", value) {
            tracing::warn!(error = %e, "Failed to write report line");
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Vec<ReportEvent>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }

    /// Names of agents with a decoded result, in report order
    pub fn results(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| matches!(e, ReportEvent::Result { .. }))
            .map(|e| e.agent().name().to_string())
            .collect()
    }

    /// Names of agents reported unresponsive, in report order
    pub fn unresponsive(&self) -> Vec<String> {
        self.events
            .iter()
            .filter(|e| matches!(e, ReportEvent::Unresponsive { .. }))
            .map(|e| e.agent().name().to_string())
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&mut self, event: ReportEvent) {
        self.events.push(event);
    }
}
