//! Execution plans
//!
//! A plan is an immutable snapshot of a node tree taken for one chunk.
//! Containers are read under their structural lock one at a time, so the
//! live tree may be edited between chunks without ever being seen half
//! changed. Traversal only reaches node state through a [`LockSet`].

use std::cell::RefMut;

use crate::engine::{AudioBuffer, LockSet};
use crate::error::{PedalError, Result};
use crate::graph::mix::BranchOutput;
use crate::graph::node::{Children, NodeKind, NodeState};
use crate::graph::Node;

/// Per-call processing context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecContext {
    pub sample_rate: f64,
    /// Largest chunk the driver hands to the tree
    pub max_block_size: usize,
}

/// Snapshot of a node tree
#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Leaf(Node),
    Chain { node: Node, children: Vec<Plan> },
    Mix { node: Node, branches: Vec<Plan> },
}

fn borrow_state<'l>(locks: &'l LockSet<'_>, node: &Node) -> Result<RefMut<'l, NodeState>> {
    locks
        .state(node)?
        .try_borrow_mut()
        .map_err(|_| PedalError::ProcessingError {
            reason: format!("{} was re-entered while it was processing", node),
        })
}

impl Plan {
    /// Snapshot `node` and everything below it
    pub(crate) fn snapshot(node: &Node, max_depth: usize) -> Result<Plan> {
        Self::snapshot_at(node, 0, max_depth)
    }

    fn snapshot_at(node: &Node, depth: usize, max_depth: usize) -> Result<Plan> {
        if depth > max_depth {
            return Err(PedalError::NestingTooDeep { limit: max_depth });
        }
        let expand = |children: &Children| -> Result<Vec<Plan>> {
            children
                .snapshot()
                .iter()
                .map(|child| Self::snapshot_at(child, depth + 1, max_depth))
                .collect()
        };
        Ok(match node.kind() {
            NodeKind::Leaf(_) => Plan::Leaf(node.clone()),
            NodeKind::Chain(children) => Plan::Chain {
                node: node.clone(),
                children: expand(children)?,
            },
            NodeKind::Mix(children) => Plan::Mix {
                node: node.clone(),
                branches: expand(children)?,
            },
        })
    }

    pub(crate) fn node(&self) -> &Node {
        match self {
            Plan::Leaf(node) | Plan::Chain { node, .. } | Plan::Mix { node, .. } => node,
        }
    }

    fn visit<F: FnMut(&Node)>(&self, f: &mut F) {
        f(self.node());
        if let Plan::Chain { children: inner, .. } | Plan::Mix { branches: inner, .. } = self {
            for plan in inner {
                plan.visit(f);
            }
        }
    }

    /// Every node in the plan, sorted by id and deduplicated
    pub(crate) fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        self.visit(&mut |node| nodes.push(node.clone()));
        nodes.sort_by_key(|node| node.id());
        nodes.dedup_by_key(|node| node.id());
        nodes
    }

    /// True if every node in the plan is locked by `locks`
    pub(crate) fn covered_by(&self, locks: &LockSet<'_>) -> bool {
        let mut covered = true;
        self.visit(&mut |node| covered &= locks.holds(node));
        covered
    }

    /// Chain latency is additive; Mix latency is that of its slowest branch
    pub(crate) fn latency(&self, locks: &LockSet<'_>) -> Result<usize> {
        match self {
            Plan::Leaf(node) => Ok(borrow_state(locks, node)?.leaf(node)?.latency()),
            Plan::Chain { children, .. } => children
                .iter()
                .try_fold(0usize, |total, child| Ok(total + child.latency(locks)?)),
            Plan::Mix { branches, .. } => branches
                .iter()
                .try_fold(0usize, |worst, branch| Ok(worst.max(branch.latency(locks)?))),
        }
    }

    /// Upper bound on frames held back by fixed-block leaves
    pub(crate) fn buffering(&self, locks: &LockSet<'_>) -> Result<usize> {
        match self {
            Plan::Leaf(node) => Ok(borrow_state(locks, node)?.leaf(node)?.buffering()),
            Plan::Chain { children, .. } => children
                .iter()
                .try_fold(0usize, |total, child| Ok(total + child.buffering(locks)?)),
            Plan::Mix { branches, .. } => branches
                .iter()
                .try_fold(0usize, |worst, branch| Ok(worst.max(branch.buffering(locks)?))),
        }
    }

    /// Reset every node once, however often it appears
    pub(crate) fn reset(&self, locks: &LockSet<'_>) -> Result<()> {
        for node in self.nodes() {
            borrow_state(locks, &node)?.reset();
        }
        Ok(())
    }

    /// Prepare every leaf for the given format
    pub(crate) fn prepare(
        &self,
        sample_rate: f64,
        num_channels: usize,
        max_block_size: usize,
        locks: &LockSet<'_>,
    ) -> Result<()> {
        for node in self.nodes().iter().filter(|node| node.is_leaf()) {
            borrow_state(locks, node)?.leaf_mut(node)?.ensure_prepared(
                node,
                sample_rate,
                num_channels,
                max_block_size,
            )?;
        }
        Ok(())
    }

    /// Prepare leaves that have never been prepared, so that latencies
    /// reported by `prepare` are known before the first chunk reaches them
    ///
    /// A leaf that rejects the call's channel count is left unprepared; it
    /// is prepared with whatever format its first block carries.
    pub(crate) fn prime(
        &self,
        num_channels: usize,
        ctx: &ExecContext,
        locks: &LockSet<'_>,
    ) -> Result<()> {
        for node in self.nodes().iter().filter(|node| node.is_leaf()) {
            let mut state = borrow_state(locks, node)?;
            let leaf = state.leaf_mut(node)?;
            if leaf.is_prepared() {
                continue;
            }
            match leaf.ensure_prepared(node, ctx.sample_rate, num_channels, ctx.max_block_size) {
                Ok(()) | Err(PedalError::UnsupportedChannels { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Push one chunk through the plan
    pub(crate) fn execute(
        &self,
        input: AudioBuffer,
        ctx: &ExecContext,
        locks: &LockSet<'_>,
    ) -> Result<AudioBuffer> {
        match self {
            Plan::Leaf(node) => borrow_state(locks, node)?
                .leaf_mut(node)?
                .process(node, input, ctx),
            Plan::Chain { children, .. } => children
                .iter()
                .try_fold(input, |signal, child| child.execute(signal, ctx, locks)),
            Plan::Mix { node, branches } => {
                let num_channels = input.num_channels();
                let num_frames = input.num_samples();
                let mut outputs = Vec::with_capacity(branches.len());
                for branch in branches {
                    let audio = branch.execute(input.clone(), ctx, locks)?;
                    let latency = branch.latency(locks)?;
                    outputs.push(BranchOutput {
                        branch: branch.node().id(),
                        latency,
                        audio,
                    });
                }
                let mut state = borrow_state(locks, node)?;
                let mixed = state
                    .mix_mut(node)?
                    .combine(node, outputs, num_channels, num_frames);
                Ok(mixed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{Delay, Gain, Plugin, Reverb};
    use crate::graph::{Chain, Mix};

    fn prepared(node: &Node, locks: &LockSet<'_>) -> bool {
        borrow_state(locks, node).unwrap().leaf(node).unwrap().is_prepared()
    }

    #[test]
    fn test_nodes_are_deduplicated() {
        let shared = Gain::new(0.0).into_node();
        let chain = Chain::new(vec![shared.clone(), shared.clone()]);
        let plan = Plan::snapshot(chain.as_node(), 64).unwrap();
        assert_eq!(plan.nodes().len(), 2);
    }

    #[test]
    fn test_latency_rules() {
        let chain = Chain::new(vec![Delay::new(10).into_node(), Delay::new(5).into_node()]);
        let mix = Mix::new(vec![Delay::new(3).into_node(), chain.clone().into()]);
        let plan = Plan::snapshot(mix.as_node(), 64).unwrap();
        let roster = plan.nodes();
        let locks = LockSet::acquire(&roster);
        assert_eq!(plan.latency(&locks).unwrap(), 15);
    }

    #[test]
    fn test_depth_limit() {
        let mut node = Gain::new(0.0).into_node();
        for _ in 0..5 {
            node = Node::from(vec![node]);
        }
        assert!(Plan::snapshot(&node, 5).is_ok());
        assert!(matches!(
            Plan::snapshot(&node, 4),
            Err(PedalError::NestingTooDeep { limit: 4 })
        ));
    }

    #[test]
    fn test_uncovered_plan_detected() {
        let chain = Chain::new(vec![Gain::new(0.0).into_node()]);
        let plan = Plan::snapshot(chain.as_node(), 64).unwrap();
        let partial = vec![chain.as_node().clone()];
        let locks = LockSet::acquire(&partial);
        assert!(!plan.covered_by(&locks));
    }

    #[test]
    fn test_prime_prepares_unprepared_leaves() {
        let gain = Gain::new(0.0).into_node();
        let reverb = Reverb::new().into_node();
        let mix = Mix::new(vec![gain.clone(), reverb.clone()]);
        let plan = Plan::snapshot(mix.as_node(), 64).unwrap();
        let roster = plan.nodes();
        let locks = LockSet::acquire(&roster);
        let ctx = ExecContext {
            sample_rate: 48000.0,
            max_block_size: 256,
        };

        // Reverb is stereo only; it waits for a block it can take
        plan.prime(6, &ctx, &locks).unwrap();
        assert!(prepared(&gain, &locks));
        assert!(!prepared(&reverb, &locks));

        plan.prime(2, &ctx, &locks).unwrap();
        assert!(prepared(&reverb, &locks));
    }
}
