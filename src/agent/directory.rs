//! Agent directory: lists agents of each kind and classifies them by liveness.

use super::{Agent, AgentKind};
use crate::control_plane::ControlPlane;
use crate::error::FleetError;
use tracing::{debug, error, warn};

/// Which agents a fan-out targets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AgentSelector {
    /// Every agent of every kind
    #[default]
    All,
    /// Only agents of one kind whose name is listed
    Named { kind: AgentKind, names: Vec<String> },
}

impl AgentSelector {
    /// Kinds to list, in processing order
    pub fn kinds(&self) -> Vec<AgentKind> {
        match self {
            AgentSelector::All => AgentKind::ALL.to_vec(),
            AgentSelector::Named { kind, .. } => vec![*kind],
        }
    }

    pub fn admits(&self, agent: &Agent) -> bool {
        match self {
            AgentSelector::All => true,
            AgentSelector::Named { kind, names } => {
                agent.kind() == *kind && names.iter().any(|n| n == agent.name())
            }
        }
    }
}

/// Agents of one kind split by liveness snapshot
#[derive(Debug, Clone, Default)]
pub struct DirectoryListing {
    pub live: Vec<Agent>,
    pub dead: Vec<Agent>,
}

/// Read-only view of the agents known to the control plane
pub struct AgentDirectory<'a> {
    plane: &'a dyn ControlPlane,
}

impl<'a> AgentDirectory<'a> {
    pub fn new(plane: &'a dyn ControlPlane) -> Self {
        Self { plane }
    }

    /// List every agent of `kind`, dead ones included.
    ///
    /// A failure here is fatal to the run: a partial directory is never used.
    pub async fn list_agents(&self, kind: AgentKind) -> Result<Vec<Agent>, FleetError> {
        let agents = self.plane.list_agents(kind).await.map_err(|e| {
            error!(kind = %kind, error = %e, "Failed to list agents");
            e
        })?;
        debug!(kind = %kind, count = agents.len(), "Listed agents");
        Ok(agents)
    }

    /// List agents of `kind` admitted by `selector`, split into live and dead.
    pub async fn listing(
        &self,
        kind: AgentKind,
        selector: &AgentSelector,
    ) -> Result<DirectoryListing, FleetError> {
        let mut listing = DirectoryListing::default();
        for agent in self.list_agents(kind).await? {
            if !selector.admits(&agent) {
                continue;
            }
            if agent.is_live() {
                listing.live.push(agent);
            } else {
                warn!(agent = %agent.display_name(), kind = %kind, "Skipping dead agent");
                listing.dead.push(agent);
            }
        }
        Ok(listing)
    }
}
