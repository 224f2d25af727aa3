//! Node handles
//!
//! A [`Node`] is a cheap, clonable handle to one processing unit. Cloning
//! the handle never clones the unit: every clone shares the same identity,
//! the same state and the same processing lock, so one effect instance can
//! sit in several trees at once.
//!
//! Each node carries:
//! - a process-unique [`NodeId`], used as the global lock order;
//! - its variant (leaf, chain or mix), with the child list of containers
//!   behind a structural lock;
//! - its mutable processing state behind a reentrant lock.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::leaf::LeafState;
use super::mix::MixState;
use crate::config::DEFAULT_MAX_DEPTH;
use crate::dsp::{NoteEvent, Plugin, PluginKind};
use crate::engine::plan::Plan;
use crate::engine::stream::StreamCursor;
use crate::engine::{self, AudioBuffer, LockSet};
use crate::error::{PedalError, Result};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity
///
/// Ids are handed out in creation order and never reused, which makes them
/// a stable global order for lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of a node
pub(crate) enum NodeKind {
    Leaf(PluginKind),
    Chain(Children),
    Mix(Children),
}

/// Copy-on-write child list guarded by the container's structural lock
pub(crate) struct Children {
    list: Mutex<Arc<Vec<Node>>>,
    effects_only: bool,
}

impl Children {
    fn new(nodes: Vec<Node>, effects_only: bool) -> Self {
        Self {
            list: Mutex::new(Arc::new(nodes)),
            effects_only,
        }
    }

    /// Consistent view of the child list; later edits do not affect it
    pub(crate) fn snapshot(&self) -> Arc<Vec<Node>> {
        Arc::clone(&self.list.lock())
    }

    fn edit<R>(&self, f: impl FnOnce(&mut Vec<Node>) -> R) -> R {
        let mut guard = self.list.lock();
        f(Arc::make_mut(&mut guard))
    }
}

/// Mutable state of a node, guarded by its processing lock
pub(crate) struct NodeState {
    pub(crate) cursor: StreamCursor,
    pub(crate) body: StateBody,
}

pub(crate) enum StateBody {
    Leaf(LeafState),
    Chain,
    Mix(MixState),
}

impl NodeState {
    /// Clear processing state; configuration is kept
    pub(crate) fn reset(&mut self) {
        self.cursor.reset();
        match &mut self.body {
            StateBody::Leaf(leaf) => leaf.reset(),
            StateBody::Chain => {}
            StateBody::Mix(mix) => mix.reset(),
        }
    }

    pub(crate) fn leaf(&self, node: &Node) -> Result<&LeafState> {
        match &self.body {
            StateBody::Leaf(leaf) => Ok(leaf),
            _ => Err(state_mismatch(node, "leaf")),
        }
    }

    pub(crate) fn leaf_mut(&mut self, node: &Node) -> Result<&mut LeafState> {
        match &mut self.body {
            StateBody::Leaf(leaf) => Ok(leaf),
            _ => Err(state_mismatch(node, "leaf")),
        }
    }

    pub(crate) fn mix_mut(&mut self, node: &Node) -> Result<&mut MixState> {
        match &mut self.body {
            StateBody::Mix(mix) => Ok(mix),
            _ => Err(state_mismatch(node, "mix")),
        }
    }
}

fn state_mismatch(node: &Node, expected: &str) -> PedalError {
    PedalError::ProcessingError {
        reason: format!("{} does not hold {} state", node, expected),
    }
}

pub(crate) struct NodeShared {
    id: NodeId,
    name: String,
    kind: NodeKind,
    state: ReentrantMutex<RefCell<NodeState>>,
}

/// Shared handle to a processing unit
#[derive(Clone)]
pub struct Node {
    shared: Arc<NodeShared>,
}

impl Node {
    fn from_parts(name: String, kind: NodeKind, body: StateBody) -> Self {
        Self {
            shared: Arc::new(NodeShared {
                id: NodeId::next(),
                name,
                kind,
                state: ReentrantMutex::new(RefCell::new(NodeState {
                    cursor: StreamCursor::default(),
                    body,
                })),
            }),
        }
    }

    /// Wrap a plugin as a leaf node
    pub fn leaf(plugin: impl Plugin + 'static) -> Self {
        Self::leaf_boxed(Box::new(plugin))
    }

    /// Wrap an already boxed plugin as a leaf node
    pub fn leaf_boxed(plugin: Box<dyn Plugin>) -> Self {
        let name = plugin.name().to_string();
        let kind = plugin.kind();
        Self::from_parts(
            name,
            NodeKind::Leaf(kind),
            StateBody::Leaf(LeafState::new(plugin)),
        )
    }

    pub(crate) fn chain_with(name: &str, nodes: Vec<Node>, effects_only: bool) -> Self {
        Self::from_parts(
            name.to_string(),
            NodeKind::Chain(Children::new(nodes, effects_only)),
            StateBody::Chain,
        )
    }

    pub(crate) fn mix_with(name: &str, nodes: Vec<Node>) -> Self {
        Self::from_parts(
            name.to_string(),
            NodeKind::Mix(Children::new(nodes, false)),
            StateBody::Mix(MixState::default()),
        )
    }

    /// Stable identity of this node
    #[inline]
    pub fn id(&self) -> NodeId {
        self.shared.id
    }

    /// Name of the plugin or container
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub(crate) fn kind(&self) -> &NodeKind {
        &self.shared.kind
    }

    pub(crate) fn state(&self) -> &ReentrantMutex<RefCell<NodeState>> {
        &self.shared.state
    }

    fn children_list(&self) -> Option<&Children> {
        match &self.shared.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Chain(children) | NodeKind::Mix(children) => Some(children),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.shared.kind, NodeKind::Leaf(_))
    }

    pub fn is_chain(&self) -> bool {
        matches!(self.shared.kind, NodeKind::Chain(_))
    }

    pub fn is_mix(&self) -> bool {
        matches!(self.shared.kind, NodeKind::Mix(_))
    }

    /// True for instrument leaves and for containers holding one
    pub fn is_instrument(&self) -> bool {
        self.find_instrument().is_some()
    }

    /// True when the node processes audio: an effect leaf, or a container
    /// holding no instrument
    pub fn is_effect(&self) -> bool {
        !self.is_instrument()
    }

    /// First instrument leaf found in this subtree (including itself)
    pub fn find_instrument(&self) -> Option<Node> {
        self.find_instrument_at(0)
    }

    fn find_instrument_at(&self, depth: usize) -> Option<Node> {
        if depth > DEFAULT_MAX_DEPTH {
            return None;
        }
        match &self.shared.kind {
            NodeKind::Leaf(PluginKind::Instrument) => Some(self.clone()),
            NodeKind::Leaf(PluginKind::Effect) => None,
            NodeKind::Chain(children) | NodeKind::Mix(children) => children
                .snapshot()
                .iter()
                .find_map(|child| child.find_instrument_at(depth + 1)),
        }
    }

    /// Snapshot of the direct children (empty for leaves)
    pub fn children(&self) -> Vec<Node> {
        self.children_list()
            .map(|children| children.snapshot().as_ref().clone())
            .unwrap_or_default()
    }

    /// True if `other` is this node or appears anywhere below it
    pub fn contains(&self, other: &Node) -> bool {
        self.contains_at(other.id(), 0)
    }

    fn contains_at(&self, id: NodeId, depth: usize) -> bool {
        if self.id() == id {
            return true;
        }
        if depth > DEFAULT_MAX_DEPTH {
            return true;
        }
        match self.children_list() {
            Some(children) => children
                .snapshot()
                .iter()
                .any(|child| child.contains_at(id, depth + 1)),
            None => false,
        }
    }

    /// Total latency of this node in samples
    pub fn latency_samples(&self) -> Result<usize> {
        let plan = Plan::snapshot(self, DEFAULT_MAX_DEPTH)?;
        let roster = plan.nodes();
        let locks = LockSet::acquire(&roster);
        plan.latency(&locks)
    }

    /// Clear the state of this node and everything below it
    pub fn reset(&self) -> Result<()> {
        let plan = Plan::snapshot(self, DEFAULT_MAX_DEPTH)?;
        let roster = plan.nodes();
        let locks = LockSet::acquire(&roster);
        plan.reset(&locks)
    }

    /// Prepare every leaf below this node ahead of the first block
    pub fn prepare(&self, sample_rate: f64, num_channels: usize, max_block_size: usize) -> Result<()> {
        let plan = Plan::snapshot(self, DEFAULT_MAX_DEPTH)?;
        let roster = plan.nodes();
        let locks = LockSet::acquire(&roster);
        plan.prepare(sample_rate, num_channels, max_block_size, &locks)
    }

    /// Run audio through this node; see [`engine::process`]
    pub fn process(
        &self,
        input: &AudioBuffer,
        sample_rate: f64,
        buffer_size: Option<usize>,
        reset: bool,
    ) -> Result<AudioBuffer> {
        engine::process(self, input, sample_rate, buffer_size, reset)
    }

    /// Render note events through an instrument leaf; see [`engine::render`]
    pub fn render(
        &self,
        events: &[NoteEvent],
        duration: f64,
        sample_rate: f64,
        num_channels: usize,
        buffer_size: Option<usize>,
        reset: bool,
    ) -> Result<AudioBuffer> {
        engine::render(self, events, duration, sample_rate, num_channels, buffer_size, reset)
    }

    /// Borrow the plugin of a leaf as its concrete type
    ///
    /// Returns None for containers, for plugins of another type and when
    /// called from inside this node's own processing. The node's processing
    /// lock is held while `f` runs.
    pub fn with_plugin<P, R>(&self, f: impl FnOnce(&mut P) -> R) -> Option<R>
    where
        P: Plugin + 'static,
    {
        let guard = self.state().lock();
        let mut state = guard.try_borrow_mut().ok()?;
        match &mut state.body {
            StateBody::Leaf(leaf) => leaf.plugin_mut().as_any_mut().downcast_mut::<P>().map(f),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Structural mutation (containers only)
    // ------------------------------------------------------------------

    fn require_children(&self) -> Result<&Children> {
        self.children_list().ok_or_else(|| PedalError::ProcessingError {
            reason: format!("{} is not a container", self),
        })
    }

    /// Check that `child` may be placed inside this container
    ///
    /// Runs before the structural lock is taken and only reads cached leaf
    /// kinds and child snapshots.
    fn validate_child(&self, children: &Children, child: &Node) -> Result<()> {
        if child.contains(self) {
            return Err(PedalError::CyclicComposition {
                node: child.to_string(),
                container: self.to_string(),
            });
        }
        if children.effects_only {
            if let Some(instrument) = child.find_instrument() {
                return Err(PedalError::InstrumentNotAllowed {
                    node: instrument.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn validate_initial(&self) -> Result<()> {
        let children = self.require_children()?;
        for child in children.snapshot().iter() {
            self.validate_child(children, child)?;
        }
        Ok(())
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children_list()
            .map(|children| children.snapshot().len())
            .unwrap_or(0)
    }

    pub(crate) fn child_at(&self, index: usize) -> Result<Node> {
        let list = self.require_children()?.snapshot();
        list.get(index).cloned().ok_or(PedalError::IndexOutOfRange {
            index,
            len: list.len(),
        })
    }

    pub(crate) fn set_child(&self, index: usize, child: Node) -> Result<Node> {
        let children = self.require_children()?;
        self.validate_child(children, &child)?;
        children.edit(|list| {
            let len = list.len();
            match list.get_mut(index) {
                Some(slot) => Ok(std::mem::replace(slot, child)),
                None => Err(PedalError::IndexOutOfRange { index, len }),
            }
        })
    }

    pub(crate) fn insert_child(&self, index: usize, child: Node) -> Result<()> {
        let children = self.require_children()?;
        self.validate_child(children, &child)?;
        children.edit(|list| {
            if index > list.len() {
                return Err(PedalError::IndexOutOfRange {
                    index,
                    len: list.len(),
                });
            }
            list.insert(index, child);
            Ok(())
        })
    }

    pub(crate) fn append_child(&self, child: Node) -> Result<()> {
        let children = self.require_children()?;
        self.validate_child(children, &child)?;
        children.edit(|list| list.push(child));
        Ok(())
    }

    pub(crate) fn remove_child(&self, index: usize) -> Result<Node> {
        self.require_children()?.edit(|list| {
            if index >= list.len() {
                return Err(PedalError::IndexOutOfRange {
                    index,
                    len: list.len(),
                });
            }
            Ok(list.remove(index))
        })
    }

    pub(crate) fn clear_children(&self) -> Result<()> {
        self.require_children()?.edit(|list| list.clear());
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (node {})", self.name(), self.id())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.shared.kind {
            NodeKind::Leaf(PluginKind::Effect) => "effect",
            NodeKind::Leaf(PluginKind::Instrument) => "instrument",
            NodeKind::Chain(_) => "chain",
            NodeKind::Mix(_) => "mix",
        };
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("kind", &kind)
            .finish()
    }
}

/// A list of nodes composes serially
impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::chain_with("Chain", nodes, false)
    }
}

/// A set of nodes composes in parallel
impl From<HashSet<Node>> for Node {
    fn from(nodes: HashSet<Node>) -> Self {
        let mut nodes: Vec<Node> = nodes.into_iter().collect();
        nodes.sort_by_key(|node| node.id());
        Node::mix_with("Mix", nodes)
    }
}
