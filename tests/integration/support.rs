use fleet_dispatch::agent::{Agent, AgentInfo, AgentKind};
use fleet_dispatch::control_plane::InMemoryControlPlane;
use fleet_dispatch::types::AgentId;

pub const WHOAMI_OUTPUT: &[u8] = br#"{"stdout":"root\n","stderr":"","status":0}"#;

pub fn agent(kind: AgentKind, name: &str) -> Agent {
    Agent::new(
        kind,
        AgentInfo {
            id: AgentId::new(format!("{}-id", name)),
            name: name.to_string(),
            hostname: format!("{}.corp", name),
            is_dead: false,
        },
    )
}

pub fn dead_agent(kind: AgentKind, name: &str) -> Agent {
    let mut info = agent(kind, name).info().clone();
    info.is_dead = true;
    Agent::new(kind, info)
}

/// Register a beacon that completes on `cycle`, or never when `None`
pub fn beacon(plane: &InMemoryControlPlane, name: &str, cycle: Option<u32>) -> Agent {
    let beacon = agent(AgentKind::StoreAndForward, name);
    plane.add_agent(beacon.clone());
    plane.set_payload(beacon.id(), WHOAMI_OUTPUT.to_vec());
    if let Some(cycle) = cycle {
        plane.complete_after(beacon.id(), cycle);
    }
    beacon
}

pub fn session(plane: &InMemoryControlPlane, name: &str) -> Agent {
    let session = agent(AgentKind::Connected, name);
    plane.add_agent(session.clone());
    plane.set_payload(session.id(), WHOAMI_OUTPUT.to_vec());
    session
}
