//! Per-call lock table
//!
//! A top-level call locks every node it will touch before processing the
//! first frame and holds those locks until it returns. Locks are always
//! taken in ascending `NodeId` order, so two calls over overlapping trees
//! (in any nesting order) cannot deadlock. Traversal then reads node state
//! through the table instead of locking again, which keeps a node that
//! occurs twice in one tree from being locked twice.

use std::cell::RefCell;
use std::collections::BTreeMap;

use parking_lot::ReentrantMutexGuard;

use crate::error::{PedalError, Result};
use crate::graph::node::NodeState;
use crate::graph::{Node, NodeId};

/// Processing locks held by one call, keyed by node id
pub struct LockSet<'a> {
    guards: BTreeMap<NodeId, ReentrantMutexGuard<'a, RefCell<NodeState>>>,
}

impl<'a> LockSet<'a> {
    /// Lock every node of `roster` in ascending id order
    ///
    /// Duplicates in the roster are locked once.
    pub fn acquire(roster: &'a [Node]) -> Self {
        let mut ordered: Vec<&'a Node> = roster.iter().collect();
        ordered.sort_by_key(|node| node.id());
        ordered.dedup_by_key(|node| node.id());

        let mut guards = BTreeMap::new();
        for node in ordered {
            guards.insert(node.id(), node.state().lock());
        }
        Self { guards }
    }

    /// Number of nodes locked
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// True if `node` is locked by this set
    pub fn holds(&self, node: &Node) -> bool {
        self.guards.contains_key(&node.id())
    }

    /// State of a locked node
    pub(crate) fn state(&self, node: &Node) -> Result<&RefCell<NodeState>> {
        self.guards
            .get(&node.id())
            .map(|guard| &**guard)
            .ok_or_else(|| PedalError::ProcessingError {
                reason: format!("{} was reached without holding its lock", node),
            })
    }
}

/// Sorted, deduplicated union of two rosters
pub(crate) fn merge_rosters(a: &[Node], b: &[Node]) -> Vec<Node> {
    let mut all: Vec<Node> = a.iter().chain(b).cloned().collect();
    all.sort_by_key(|node| node.id());
    all.dedup_by_key(|node| node.id());
    all
}
