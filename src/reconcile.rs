//! Completion Reconciliation
//!
//! Correlates a completed work item with the pending task that issued it. A task
//! identifier is matched at most once: the entry is removed on the first match, so
//! re-delivered or stale completions find nothing and change nothing. A payload
//! that fails to decode still closes its task.

use crate::control_plane::TaskState;
use crate::decode::{DecodedResult, DecoderSet};
use crate::error::FleetError;
use crate::pending::{PendingRegistry, PendingTask};
use crate::types::TaskId;
use tracing::{debug, warn};

/// A completed work item with its payload fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedWorkItem {
    pub task_id: TaskId,
    pub state: TaskState,
    pub payload: Vec<u8>,
}

/// What reconciling one completed item did
#[derive(Debug)]
pub enum Reconciliation {
    /// Matched and decoded; the task is closed
    Decoded {
        task: PendingTask,
        result: DecodedResult,
    },
    /// Matched but the payload could not be interpreted; the task is closed anyway
    Undecodable { task: PendingTask, error: FleetError },
    /// No pending task carries this identifier; nothing changed
    Unmatched,
}

pub struct Reconciler<'a> {
    decoders: &'a DecoderSet,
}

impl<'a> Reconciler<'a> {
    pub fn new(decoders: &'a DecoderSet) -> Self {
        Self { decoders }
    }

    pub fn reconcile(
        &self,
        registry: &mut PendingRegistry,
        item: CompletedWorkItem,
    ) -> Reconciliation {
        if item.state != TaskState::Completed {
            return Reconciliation::Unmatched;
        }
        let Some(task) = registry.remove(&item.task_id) else {
            debug!(task_id = %item.task_id, "Ignoring completion with no pending task");
            return Reconciliation::Unmatched;
        };

        match self
            .decoders
            .decode(task.command, &task.agent, &item.payload)
        {
            Ok(result) => {
                debug!(
                    task_id = %task.task_id,
                    agent = %task.agent.display_name(),
                    remaining = registry.len(),
                    "Reconciled task"
                );
                Reconciliation::Decoded { task, result }
            }
            Err(error) => {
                warn!(
                    task_id = %task.task_id,
                    agent = %task.agent.display_name(),
                    error = %error,
                    "Agent responded but its payload could not be decoded"
                );
                Reconciliation::Undecodable { task, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentInfo, AgentKind};
    use crate::config::DecodeConfig;
    use crate::dispatch::CommandKind;
    use crate::types::AgentId;

    fn pending(n: usize) -> PendingTask {
        PendingTask {
            task_id: TaskId::new(format!("t{}", n)),
            agent: Agent::new(
                AgentKind::StoreAndForward,
                AgentInfo {
                    id: AgentId::new(format!("b{}", n)),
                    name: format!("B{}", n),
                    hostname: format!("h{}", n),
                    is_dead: false,
                },
            ),
            command: CommandKind::Execute,
        }
    }

    fn completed(id: &str, payload: &[u8]) -> CompletedWorkItem {
        CompletedWorkItem {
            task_id: TaskId::from(id),
            state: TaskState::Completed,
            payload: payload.to_vec(),
        }
    }

    fn setup() -> (DecoderSet, PendingRegistry) {
        let mut registry = PendingRegistry::new();
        for n in 0..3 {
            registry.insert(pending(n)).unwrap();
        }
        (DecoderSet::standard(&DecodeConfig::default()), registry)
    }

    #[test]
    fn test_match_removes_and_decodes() {
        let (decoders, mut registry) = setup();
        let reconciler = Reconciler::new(&decoders);
        match reconciler.reconcile(&mut registry, completed("t1", br#"{"stdout":"hi"}"#)) {
            Reconciliation::Decoded { task, result } => {
                assert_eq!(task.agent.name(), "B1");
                assert!(matches!(result, DecodedResult::Execute(ref out) if out.stdout == "hi"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains(&TaskId::from("t1")));
    }

    #[test]
    fn test_unmatched_item_changes_nothing() {
        let (decoders, mut registry) = setup();
        let before = registry.snapshot();
        let outcome = Reconciler::new(&decoders)
            .reconcile(&mut registry, completed("unknown", br#"{"stdout":"x"}"#));
        assert!(matches!(outcome, Reconciliation::Unmatched));
        assert_eq!(registry.snapshot(), before);
    }

    #[test]
    fn test_second_completion_is_noop() {
        let (decoders, mut registry) = setup();
        let reconciler = Reconciler::new(&decoders);
        let first = reconciler.reconcile(&mut registry, completed("t0", br#"{}"#));
        let second = reconciler.reconcile(&mut registry, completed("t0", br#"{}"#));
        assert!(matches!(first, Reconciliation::Decoded { .. }));
        assert!(matches!(second, Reconciliation::Unmatched));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_malformed_payload_still_closes_task() {
        let (decoders, mut registry) = setup();
        let outcome =
            Reconciler::new(&decoders).reconcile(&mut registry, completed("t2", b"not json"));
        match outcome {
            Reconciliation::Undecodable { task, error } => {
                assert_eq!(task.task_id, TaskId::from("t2"));
                assert!(matches!(error, FleetError::MalformedPayload { .. }));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(!registry.contains(&TaskId::from("t2")));
    }

    #[test]
    fn test_incomplete_item_is_not_matched() {
        let (decoders, mut registry) = setup();
        let mut item = completed("t0", br#"{}"#);
        item.state = TaskState::Pending;
        let outcome = Reconciler::new(&decoders).reconcile(&mut registry, item);
        assert!(matches!(outcome, Reconciliation::Unmatched));
        assert_eq!(registry.len(), 3);
    }
}
