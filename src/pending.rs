//! Pending Work Registry
//!
//! Ordered set of outstanding store-and-forward tasks for one fan-out. Entries are
//! appended on successful dispatch and only ever removed: by reconciliation when
//! the task completes, or by draining once the poll budget is exhausted.
//!
//! Traversal never holds a live position into the collection while removing.
//! Callers either walk a [`snapshot`](PendingRegistry::snapshot) and remove by task
//! identifier afterwards, or use [`sweep`](PendingRegistry::sweep), which visits
//! every entry exactly once in order and applies each removal in place.

use crate::agent::Agent;
use crate::dispatch::CommandKind;
use crate::error::FleetError;
use crate::types::TaskId;
use tracing::debug;

/// Work accepted by a store-and-forward agent and not yet reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTask {
    pub task_id: TaskId,
    pub agent: Agent,
    /// Command kind recorded at dispatch; selects the result decoder
    pub command: CommandKind,
}

/// Decision returned by a [`sweep`](PendingRegistry::sweep) visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Remove,
}

/// Outstanding tasks in dispatch order
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: Vec<PendingTask>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. An agent may own at most one pending task per fan-out.
    pub fn insert(&mut self, task: PendingTask) -> Result<(), FleetError> {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|t| t.agent.id() == task.agent.id() || t.task_id == task.task_id)
        {
            return Err(FleetError::AlreadyPending {
                agent: existing.agent.id().clone(),
                task_id: existing.task_id.clone(),
            });
        }
        debug!(
            task_id = %task.task_id,
            agent = %task.agent.display_name(),
            pending = self.entries.len() + 1,
            "Registered pending task"
        );
        self.entries.push(task);
        Ok(())
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.entries.iter().any(|t| &t.task_id == task_id)
    }

    /// Remove the entry for `task_id`, preserving the order of the rest.
    ///
    /// Returns `None` when the identifier is unknown or already removed.
    pub fn remove(&mut self, task_id: &TaskId) -> Option<PendingTask> {
        let index = self.entries.iter().position(|t| &t.task_id == task_id)?;
        Some(self.entries.remove(index))
    }

    /// Owned copy of the current entries, for traversals that remove as they go
    pub fn snapshot(&self) -> Vec<PendingTask> {
        self.entries.clone()
    }

    /// Visit every entry once in order, removing those the visitor marks.
    ///
    /// Removing the current entry never skips its successor or revisits its
    /// predecessor, wherever it sits in the collection.
    pub fn sweep<F>(&mut self, mut visit: F) -> Vec<PendingTask>
    where
        F: FnMut(&PendingTask) -> Visit,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for task in self.entries.drain(..) {
            match visit(&task) {
                Visit::Keep => kept.push(task),
                Visit::Remove => removed.push(task),
            }
        }
        self.entries = kept;
        removed
    }

    /// Remove and return every remaining entry
    pub fn drain(&mut self) -> Vec<PendingTask> {
        std::mem::take(&mut self.entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingTask> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, AgentKind};
    use crate::types::AgentId;
    use proptest::prelude::*;

    fn task(n: usize) -> PendingTask {
        PendingTask {
            task_id: TaskId::new(format!("task-{}", n)),
            agent: Agent::new(
                AgentKind::StoreAndForward,
                AgentInfo {
                    id: AgentId::new(format!("beacon-{}", n)),
                    name: format!("B{}", n),
                    hostname: format!("host{}", n),
                    is_dead: false,
                },
            ),
            command: CommandKind::Execute,
        }
    }

    fn registry(n: usize) -> PendingRegistry {
        let mut registry = PendingRegistry::new();
        for i in 0..n {
            registry.insert(task(i)).unwrap();
        }
        registry
    }

    fn ids(registry: &PendingRegistry) -> Vec<String> {
        registry.iter().map(|t| t.task_id.to_string()).collect()
    }

    #[test]
    fn test_insert_then_remove_leaves_no_entry() {
        let mut registry = PendingRegistry::new();
        registry.insert(task(7)).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&TaskId::from("task-7")));

        let removed = registry.remove(&TaskId::from("task-7")).unwrap();
        assert_eq!(removed.agent.name(), "B7");
        assert!(registry.is_empty());
        assert!(registry.remove(&TaskId::from("task-7")).is_none());
    }

    #[test]
    fn test_one_pending_task_per_agent() {
        let mut registry = registry(1);
        let mut again = task(0);
        again.task_id = TaskId::from("task-other");
        let err = registry.insert(again).unwrap_err();
        assert!(matches!(err, FleetError::AlreadyPending { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut registry = registry(3);
        assert!(registry.remove(&TaskId::from("stale")).is_none());
        assert_eq!(ids(&registry), vec!["task-0", "task-1", "task-2"]);
    }

    #[test]
    fn test_snapshot_traversal_with_removal_of_first_middle_last() {
        for victim in 0..3 {
            let mut registry = registry(3);
            let mut visited = Vec::new();
            for entry in registry.snapshot() {
                visited.push(entry.task_id.to_string());
                if entry.task_id.as_str() == format!("task-{}", victim) {
                    registry.remove(&entry.task_id);
                }
            }
            assert_eq!(visited, vec!["task-0", "task-1", "task-2"]);
            assert_eq!(registry.len(), 2);
            assert!(!registry.contains(&TaskId::new(format!("task-{}", victim))));
        }
    }

    #[test]
    fn test_sweep_single_entry() {
        let mut registry = registry(1);
        let removed = registry.sweep(|_| Visit::Remove);
        assert_eq!(removed.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = registry(4);
        let drained = registry.drain();
        assert_eq!(drained.len(), 4);
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn sweep_visits_each_entry_once_in_order(mask in prop::collection::vec(any::<bool>(), 0..32)) {
            let mut registry = registry(mask.len());
            let mut visited = Vec::new();
            let removed = registry.sweep(|t| {
                let index = visited.len();
                visited.push(t.task_id.to_string());
                if mask[index] { Visit::Remove } else { Visit::Keep }
            });

            let expected: Vec<String> = (0..mask.len()).map(|i| format!("task-{}", i)).collect();
            prop_assert_eq!(visited, expected.clone());

            let kept: Vec<String> = expected.iter().zip(&mask).filter(|(_, m)| !**m).map(|(id, _)| id.clone()).collect();
            let gone: Vec<String> = expected.iter().zip(&mask).filter(|(_, m)| **m).map(|(id, _)| id.clone()).collect();
            prop_assert_eq!(ids(&registry), kept);
            prop_assert_eq!(removed.iter().map(|t| t.task_id.to_string()).collect::<Vec<_>>(), gone);
        }

        #[test]
        fn removal_during_snapshot_traversal_strands_nothing(mask in prop::collection::vec(any::<bool>(), 0..32)) {
            let mut registry = registry(mask.len());
            let mut visited = 0usize;
            for (index, entry) in registry.snapshot().into_iter().enumerate() {
                visited += 1;
                if mask[index] {
                    prop_assert!(registry.remove(&entry.task_id).is_some());
                }
            }
            prop_assert_eq!(visited, mask.len());
            prop_assert_eq!(registry.len(), mask.iter().filter(|m| !**m).count());
            for (index, removed) in mask.iter().enumerate() {
                prop_assert_eq!(registry.contains(&TaskId::new(format!("task-{}", index))), !removed);
            }
        }
    }
}
