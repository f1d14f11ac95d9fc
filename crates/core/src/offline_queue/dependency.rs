//! Dependency tracking between queued operations
//!
//! - Forward edges: operation -> operations it waits for
//! - Reverse edges: operation -> operations waiting for it
//!
//! Both maps are always updated together. The tracker holds only the
//! relation; whether a blocker has completed is read from the store (or a
//! snapshot of it) at query time.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use super::errors::QueueResult;
use super::ports::PersistentStore;
use super::types::OperationStatus;

#[derive(Debug, Default)]
struct DependencyGraph {
    edges: HashMap<String, HashSet<String>>,
    reverse_edges: HashMap<String, HashSet<String>>,
}

/// Thread-safe dependency relation
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: RwLock<DependencyGraph>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `op_id` waits for every id in `blocking_ids`
    pub fn register_dependencies<I, S>(&self, op_id: &str, blocking_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut graph = self.graph.write();
        for blocker in blocking_ids {
            let blocker = blocker.into();
            if blocker == op_id {
                continue;
            }
            graph.reverse_edges.entry(blocker.clone()).or_default().insert(op_id.to_string());
            graph.edges.entry(op_id.to_string()).or_default().insert(blocker);
        }
    }

    /// Drop the forward edges of `op_id` once it no longer waits for anything
    /// (terminal or deleted)
    pub fn release(&self, op_id: &str) {
        let mut graph = self.graph.write();
        let Some(blockers) = graph.edges.remove(op_id) else {
            return;
        };
        for blocker in blockers {
            if let Entry::Occupied(mut waiting) = graph.reverse_edges.entry(blocker) {
                waiting.get_mut().remove(op_id);
                if waiting.get().is_empty() {
                    waiting.remove_entry();
                }
            }
        }
    }

    /// Ids `op_id` waits for
    pub fn blocking_ids(&self, op_id: &str) -> Vec<String> {
        self.graph.read().edges.get(op_id).map(|deps| deps.iter().cloned().collect()).unwrap_or_default()
    }

    /// Ids waiting for `op_id`
    pub fn dependents(&self, op_id: &str) -> Vec<String> {
        self.graph.read().reverse_edges.get(op_id).map(|ids| ids.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn has_dependents(&self, op_id: &str) -> bool {
        self.graph.read().reverse_edges.get(op_id).is_some_and(|ids| !ids.is_empty())
    }

    /// Number of operations with registered dependencies
    pub fn len(&self) -> usize {
        self.graph.read().edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Satisfaction against a status lookup (e.g. a loaded snapshot)
    ///
    /// No registered dependencies means satisfied. A blocker that the lookup
    /// does not know counts as unmet.
    pub fn are_satisfied_with<F>(&self, op_id: &str, status_of: F) -> bool
    where
        F: Fn(&str) -> Option<OperationStatus>,
    {
        let graph = self.graph.read();
        graph.edges.get(op_id).map_or(true, |blockers| {
            blockers.iter().all(|id| status_of(id) == Some(OperationStatus::Completed))
        })
    }

    /// Satisfaction against the store's current records
    pub async fn are_satisfied(&self, op_id: &str, store: &dyn PersistentStore) -> QueueResult<bool> {
        // Copy the ids out; the lock must not be held across awaits
        for blocker in self.blocking_ids(op_id) {
            let completed = store.get(&blocker).await?.is_some_and(|op| op.status == OperationStatus::Completed);
            if !completed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn clear(&self) {
        let mut graph = self.graph.write();
        graph.edges.clear();
        graph.reverse_edges.clear();
    }
}
