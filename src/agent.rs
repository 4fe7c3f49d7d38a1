//! Agent Model
//!
//! Remote agents reachable through the control plane come in two kinds: connected
//! agents that answer requests synchronously, and store-and-forward agents that only
//! check in periodically and complete queued work later. Both share the same identity
//! and liveness data; only their completion model differs.

mod directory;

pub use directory::{AgentDirectory, AgentSelector, DirectoryListing};

use crate::types::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent kind, determining how dispatched work completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Open channel to the control plane (a "session")
    Connected,
    /// Periodic check-in only (a "beacon")
    StoreAndForward,
}

impl AgentKind {
    /// Listing order used by every fan-out: connected agents first.
    pub const ALL: [AgentKind; 2] = [AgentKind::Connected, AgentKind::StoreAndForward];

    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Connected => "session",
            AgentKind::StoreAndForward => "beacon",
        }
    }

    /// Collection name used by the control-plane gateway routes
    pub fn collection(&self) -> &'static str {
        match self {
            AgentKind::Connected => "sessions",
            AgentKind::StoreAndForward => "beacons",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity and liveness snapshot reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: AgentId,
    pub name: String,
    pub hostname: String,
    /// Liveness at listing time; never re-checked during polling
    #[serde(default)]
    pub is_dead: bool,
}

/// A remote agent, tagged by completion model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Agent {
    Connected(AgentInfo),
    StoreAndForward(AgentInfo),
}

impl Agent {
    pub fn new(kind: AgentKind, info: AgentInfo) -> Self {
        match kind {
            AgentKind::Connected => Agent::Connected(info),
            AgentKind::StoreAndForward => Agent::StoreAndForward(info),
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            Agent::Connected(_) => AgentKind::Connected,
            Agent::StoreAndForward(_) => AgentKind::StoreAndForward,
        }
    }

    pub fn info(&self) -> &AgentInfo {
        match self {
            Agent::Connected(info) | Agent::StoreAndForward(info) => info,
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.info().id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn hostname(&self) -> &str {
        &self.info().hostname
    }

    pub fn is_live(&self) -> bool {
        !self.info().is_dead
    }

    /// Whether dispatched work returns its result in the dispatch reply
    pub fn completes_synchronously(&self) -> bool {
        matches!(self, Agent::Connected(_))
    }

    /// Operator-facing `name,hostname` label
    pub fn display_name(&self) -> String {
        format!("{},{}", self.name(), self.hostname())
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dead: bool) -> AgentInfo {
        AgentInfo {
            id: AgentId::from("a1"),
            name: "QUIET_OTTER".to_string(),
            hostname: "web1".to_string(),
            is_dead: dead,
        }
    }

    #[test]
    fn test_kind_round_trips_through_constructor() {
        for kind in AgentKind::ALL {
            let agent = Agent::new(kind, info(false));
            assert_eq!(agent.kind(), kind);
        }
    }

    #[test]
    fn test_shared_capabilities() {
        let agent = Agent::new(AgentKind::StoreAndForward, info(true));
        assert!(!agent.is_live());
        assert!(!agent.completes_synchronously());
        assert_eq!(agent.display_name(), "QUIET_OTTER,web1");
        assert_eq!(agent.to_string(), "beacon QUIET_OTTER,web1");

        let agent = Agent::new(AgentKind::Connected, info(false));
        assert!(agent.is_live());
        assert!(agent.completes_synchronously());
    }

    #[test]
    fn test_agent_info_defaults_liveness() {
        let parsed: AgentInfo =
            serde_json::from_str(r#"{"id":"x","name":"n","hostname":"h"}"#).unwrap();
        assert!(!parsed.is_dead);
    }
}
