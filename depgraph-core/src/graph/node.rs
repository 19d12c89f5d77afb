//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//!
//! A node only knows about its own state: its two directional dirty flags,
//! the ids of the nodes it reads from and the nodes that read from it, and
//! the epoch it was last visited in. It never reaches into its neighbors.
//! Keeping both sides of an edge consistent is the graph's job.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline capacity for ancestor/descendant lists. Scene nodes rarely have
/// more than a handful of direct dependencies.
pub(crate) type NodeList = SmallVec<[NodeId; 4]>;

/// Handle to a node in the dependency graph.
///
/// The handle pairs an arena slot with the generation the slot had when the
/// node was created, so a handle to a removed node never resolves to a node
/// created later in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Get the arena slot of this node.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Get the slot generation this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Traversal direction through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Toward dependents. Dirtying downstream reaches every node that reads
    /// from the marked node.
    Downstream,

    /// Toward dependencies. Dirtying upstream reaches every node the marked
    /// node reads from.
    Upstream,
}

impl Direction {
    /// Both directions, in the order evaluation passes run.
    pub const ALL: [Direction; 2] = [Direction::Downstream, Direction::Upstream];

    /// The other direction.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Downstream => Direction::Upstream,
            Direction::Upstream => Direction::Downstream,
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Direction::Downstream => 0,
            Direction::Upstream => 1,
        }
    }
}

/// Per-direction evaluation state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// The node's cached result is up-to-date.
    Clean,

    /// The node must be re-evaluated before its result is used.
    Dirty,

    /// The node's callback is running (or its inputs are being settled)
    /// in the current pass.
    Evaluating,
}

/// Which partition of the graph a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Membership {
    /// No ancestors, at least one descendant.
    Root,

    /// Both ancestors and descendants.
    Intermediate,

    /// No descendants. Isolated nodes land here too, so they take part in
    /// the downstream pass.
    Terminal,
}

impl Membership {
    /// Derive the membership from the presence of edges.
    pub fn classify(has_ancestors: bool, has_descendants: bool) -> Self {
        match (has_ancestors, has_descendants) {
            (_, false) => Membership::Terminal,
            (false, true) => Membership::Root,
            (true, true) => Membership::Intermediate,
        }
    }
}

/// A node in the dependency graph.
///
/// The payload `N` is the owner-supplied object whose evaluation callback
/// the graph drives.
#[derive(Debug)]
pub struct Node<N> {
    /// Owner data and evaluation callback.
    payload: N,

    /// Nodes that this node depends on (reads from).
    ancestors: NodeList,

    /// Nodes that depend on this node (read from it).
    descendants: NodeList,

    /// Evaluation state, indexed by [`Direction::slot`].
    states: [NodeState; 2],

    /// Epoch of the last traversal that reached this node.
    visited_id: u32,

    /// Current partition.
    membership: Membership,

    /// False while the node sits in a pruned branch.
    attached: bool,
}

impl<N> Node<N> {
    /// Create a new, clean, isolated node.
    pub(crate) fn new(payload: N) -> Self {
        Self {
            payload,
            ancestors: NodeList::new(),
            descendants: NodeList::new(),
            states: [NodeState::Clean; 2],
            visited_id: 0,
            membership: Membership::Terminal,
            attached: true,
        }
    }

    /// Borrow the owner payload.
    pub fn payload(&self) -> &N {
        &self.payload
    }

    /// Mutably borrow the owner payload.
    pub fn payload_mut(&mut self) -> &mut N {
        &mut self.payload
    }

    pub(crate) fn payload_and_links(&mut self) -> (&mut N, &[NodeId], &[NodeId]) {
        (&mut self.payload, &self.ancestors, &self.descendants)
    }

    pub(crate) fn into_payload(self) -> N {
        self.payload
    }

    /// Nodes this node reads from.
    pub fn ancestors(&self) -> &[NodeId] {
        &self.ancestors
    }

    /// Nodes that read from this node.
    pub fn descendants(&self) -> &[NodeId] {
        &self.descendants
    }

    /// Neighbors reached when walking in `direction`.
    pub fn neighbors(&self, direction: Direction) -> &[NodeId] {
        match direction {
            Direction::Downstream => &self.descendants,
            Direction::Upstream => &self.ancestors,
        }
    }

    /// Nodes that must settle before this node evaluates in `direction`.
    ///
    /// This is the reverse of [`Node::neighbors`]: a downstream pass
    /// settles ancestors first, an upstream pass settles descendants first.
    pub fn inputs(&self, direction: Direction) -> &[NodeId] {
        self.neighbors(direction.opposite())
    }

    /// Add an ancestor. Returns false if it was already present.
    pub(crate) fn add_ancestor(&mut self, id: NodeId) -> bool {
        insert_unique(&mut self.ancestors, id)
    }

    /// Remove an ancestor. Returns false if it was not present.
    pub(crate) fn remove_ancestor(&mut self, id: NodeId) -> bool {
        remove_item(&mut self.ancestors, id)
    }

    /// Add a descendant. Returns false if it was already present.
    pub(crate) fn add_descendant(&mut self, id: NodeId) -> bool {
        insert_unique(&mut self.descendants, id)
    }

    /// Remove a descendant. Returns false if it was not present.
    pub(crate) fn remove_descendant(&mut self, id: NodeId) -> bool {
        remove_item(&mut self.descendants, id)
    }

    pub(crate) fn take_links(&mut self) -> (NodeList, NodeList) {
        (
            std::mem::take(&mut self.ancestors),
            std::mem::take(&mut self.descendants),
        )
    }

    /// Get the evaluation state for a direction.
    pub fn state(&self, direction: Direction) -> NodeState {
        self.states[direction.slot()]
    }

    pub(crate) fn set_state(&mut self, direction: Direction, state: NodeState) {
        self.states[direction.slot()] = state;
    }

    /// Whether the node still needs evaluation in `direction`.
    pub fn is_dirty(&self, direction: Direction) -> bool {
        self.state(direction) != NodeState::Clean
    }

    /// Mark dirty in `direction`. Returns true if the node was clean before.
    pub(crate) fn set_dirty(&mut self, direction: Direction) -> bool {
        let was_clean = self.state(direction) == NodeState::Clean;
        if was_clean {
            self.set_state(direction, NodeState::Dirty);
        }
        was_clean
    }

    /// Mark clean in `direction`.
    pub(crate) fn clear_dirty(&mut self, direction: Direction) {
        self.set_state(direction, NodeState::Clean);
    }

    /// Epoch of the last traversal that reached this node.
    pub fn visited_id(&self) -> u32 {
        self.visited_id
    }

    pub(crate) fn set_visited_id(&mut self, id: u32) {
        self.visited_id = id;
    }

    /// Current partition.
    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// Recompute the partition from the current edges. Returns the new value.
    pub(crate) fn reclassify(&mut self) -> Membership {
        self.membership =
            Membership::classify(!self.ancestors.is_empty(), !self.descendants.is_empty());
        self.membership
    }

    /// Whether the node is part of the live graph (not in a pruned branch).
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }
}

fn insert_unique(list: &mut NodeList, id: NodeId) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

fn remove_item(list: &mut NodeList, id: NodeId) -> bool {
    match list.iter().position(|&other| other == id) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}
