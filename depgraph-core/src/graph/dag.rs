//! Dependency Graph
//!
//! The node arena, edge bookkeeping, partitions and dirty propagation.
//! Evaluation lives in `scheduler.rs`, branch pruning in `branch.rs`.

use super::epoch::{VisitEpoch, UNVISITED};
use super::node::{Direction, Membership, Node, NodeId, NodeList, NodeState};
use super::partition::Partitions;
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::eval::GraphStats;
use crate::notify::{EvaluationEvent, Listeners, Subscription};

/// One arena slot. The generation survives the node so stale ids can be
/// told apart from the slot's next occupant.
#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    node: Option<Node<N>>,
}

/// Incremental dependency graph.
///
/// The graph owns every node's payload. Edges are stored on both endpoints
/// and only ever changed through the graph, so "A is an ancestor of B" and
/// "B is a descendant of A" always agree for attached nodes.
///
/// # Example
///
/// ```rust,ignore
/// let mut graph = Graph::new();
/// let x = graph.add_node(transform);
/// let y = graph.add_node(mesh);
/// graph.add_dependency(x, y)?;
///
/// graph.evaluate_graph(false)?;   // x, then y
/// graph.dirty(x);
/// graph.evaluate_graph(false)?;   // x, then y again
/// ```
#[derive(Debug)]
pub struct Graph<N> {
    slots: Vec<Slot<N>>,
    free_list: Vec<u32>,
    len: usize,
    pub(crate) partitions: Partitions,
    epoch: VisitEpoch,
    pub(crate) config: GraphConfig,
    pub(crate) listeners: Listeners,
    pub(crate) stats: GraphStats,
}

impl<N> Graph<N> {
    /// Create an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            partitions: Partitions::new(),
            epoch: VisitEpoch::new(config.epoch_limit),
            config,
            listeners: Listeners::new(),
            stats: GraphStats::default(),
        }
    }

    /// The configuration this graph was built with.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Running totals across every pass.
    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    // --- Nodes ---

    /// Add a node.
    ///
    /// The node starts isolated (a terminal) and dirty in both directions,
    /// so the next pass evaluates it at least once.
    pub fn add_node(&mut self, payload: N) -> NodeId {
        let mut node = Node::new(payload);
        for direction in Direction::ALL {
            node.set_dirty(direction);
        }

        let id = match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId::new(index, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("node arena exceeds u32 slots");
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId::new(index, 0)
            }
        };
        self.len += 1;
        self.partitions.classify(id, Membership::Terminal);
        tracing::debug!(node = %id, "node added");
        id
    }

    /// Remove a node and every edge touching it.
    ///
    /// Former descendants are dirtied downstream and former ancestors
    /// upstream, since their inputs changed.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn remove_node(&mut self, id: NodeId) -> N {
        match self.try_remove_node(id) {
            Ok(payload) => payload,
            Err(err) => panic!("remove_node: {err}"),
        }
    }

    /// Remove a node, returning [`GraphError::StaleNode`] for unknown ids.
    pub fn try_remove_node(&mut self, id: NodeId) -> Result<N> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .ok_or(GraphError::StaleNode(id))?;
        let mut node = slot.node.take().ok_or(GraphError::StaleNode(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index() as u32);
        self.len -= 1;
        self.partitions.remove(id);

        let (ancestors, descendants) = node.take_links();
        for ancestor in ancestors {
            if let Some(other) = self.get_mut(ancestor) {
                other.remove_descendant(id);
                self.reclassify(ancestor);
                self.dirty_if_attached(ancestor, Direction::Upstream);
            }
        }
        for descendant in descendants {
            if let Some(other) = self.get_mut(descendant) {
                other.remove_ancestor(id);
                self.reclassify(descendant);
                self.dirty_if_attached(descendant, Direction::Downstream);
            }
        }

        tracing::debug!(node = %id, "node removed");
        Ok(node.into_payload())
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node<N>> {
        self.get(id)
    }

    /// Look up a node mutably (for payload access).
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<N>> {
        self.get_mut(id)
    }

    /// Whether `id` refers to a node in the graph (attached or pruned).
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of nodes, including pruned ones.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over every node.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node<N>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeId::new(index as u32, slot.generation), node))
        })
    }

    // --- Edges ---

    /// Make `descendant` depend on `ancestor`.
    ///
    /// Both endpoints are updated and reclassified together. The descendant
    /// is dirtied downstream and the ancestor upstream.
    ///
    /// The ancestor is not dirtied downstream: gaining a dependent does not
    /// change what it reads, so its downstream result stays valid. Owners
    /// whose evaluation depends on the set of dependents should call
    /// [`Graph::dirty`] on the ancestor themselves.
    pub fn add_dependency(&mut self, ancestor: NodeId, descendant: NodeId) -> Result<()> {
        self.attached(ancestor)?;
        if self.attached(descendant)?.ancestors().contains(&ancestor) {
            return Err(GraphError::DuplicateDependency {
                ancestor,
                descendant,
            });
        }
        if ancestor == descendant {
            return Err(GraphError::SelfDependency(ancestor));
        }
        if self.reaches(descendant, ancestor, Direction::Downstream) {
            return Err(GraphError::Cycle {
                ancestor,
                descendant,
            });
        }

        self.expect_node_mut(ancestor).add_descendant(descendant);
        self.expect_node_mut(descendant).add_ancestor(ancestor);
        self.reclassify(ancestor);
        self.reclassify(descendant);

        self.dirty_node(descendant, Direction::Downstream);
        self.dirty_node(ancestor, Direction::Upstream);
        tracing::debug!(%ancestor, %descendant, "dependency added");
        Ok(())
    }

    /// Remove the edge created by [`Graph::add_dependency`].
    ///
    /// Dirties the same way as [`Graph::add_dependency`], so the ancestor
    /// keeps its downstream result.
    pub fn remove_dependency(&mut self, ancestor: NodeId, descendant: NodeId) -> Result<()> {
        self.attached(ancestor)?;
        if !self.attached(descendant)?.ancestors().contains(&ancestor) {
            return Err(GraphError::MissingDependency {
                ancestor,
                descendant,
            });
        }

        self.expect_node_mut(ancestor).remove_descendant(descendant);
        self.expect_node_mut(descendant).remove_ancestor(ancestor);
        self.reclassify(ancestor);
        self.reclassify(descendant);

        self.dirty_node(descendant, Direction::Downstream);
        self.dirty_node(ancestor, Direction::Upstream);
        tracing::debug!(%ancestor, %descendant, "dependency removed");
        Ok(())
    }

    /// Whether `descendant` directly depends on `ancestor`.
    pub fn depends_on(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        self.get(descendant)
            .is_some_and(|node| node.ancestors().contains(&ancestor))
    }

    /// Direct ancestors of a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn ancestors(&self, id: NodeId) -> &[NodeId] {
        self.expect_node(id).ancestors()
    }

    /// Direct descendants of a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn descendants(&self, id: NodeId) -> &[NodeId] {
        self.expect_node(id).descendants()
    }

    // --- Partitions ---

    /// Partition of an attached node. `None` for stale or pruned ids.
    pub fn membership(&self, id: NodeId) -> Option<Membership> {
        self.partitions.membership_of(id)
    }

    /// Attached nodes with descendants but no ancestors.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.partitions.roots().iter().copied()
    }

    /// Attached nodes with both ancestors and descendants.
    pub fn intermediates(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.partitions.intermediates().iter().copied()
    }

    /// Attached nodes with no descendants, including isolated ones.
    pub fn terminals(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.partitions.terminals().iter().copied()
    }

    /// Direct access to the three partition sets.
    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    // --- Dirty state ---

    /// Mark `id` dirty in `direction` along with everything reachable from
    /// it in that direction.
    ///
    /// The walk uses an explicit stack and stops at nodes that are already
    /// dirty in `direction`, so each node is touched at most once however
    /// many paths lead to it. Returns how many nodes went from clean to
    /// dirty. Pruned nodes cannot be dirtied and report 0.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn dirty_node(&mut self, id: NodeId, direction: Direction) -> usize {
        let node = self.expect_node_mut(id);
        if !node.is_attached() {
            tracing::warn!(node = %id, "ignoring dirty request for pruned node");
            return 0;
        }

        let mut count = usize::from(node.set_dirty(direction));
        let mut stack: Vec<NodeId> = node.neighbors(direction).to_vec();
        while let Some(next) = stack.pop() {
            let Some(node) = self.get_mut(next) else {
                continue;
            };
            if !node.is_attached() || !node.set_dirty(direction) {
                continue;
            }
            count += 1;
            stack.extend_from_slice(node.neighbors(direction));
        }

        tracing::trace!(node = %id, ?direction, count, "dirtied");
        count
    }

    /// Dirty a node downstream, the usual reaction to an edit of its inputs.
    #[track_caller]
    pub fn dirty(&mut self, id: NodeId) -> usize {
        self.dirty_node(id, Direction::Downstream)
    }

    /// Evaluation state of a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn node_state(&self, id: NodeId, direction: Direction) -> NodeState {
        self.expect_node(id).state(direction)
    }

    /// Whether a node still needs evaluation in `direction`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a node in the graph.
    #[track_caller]
    pub fn is_dirty(&self, id: NodeId, direction: Direction) -> bool {
        self.expect_node(id).is_dirty(direction)
    }

    /// Attached nodes that are dirty in `direction`.
    pub fn dirty_nodes(&self, direction: Direction) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.is_attached() && node.is_dirty(direction))
            .map(|(id, _)| id)
            .collect()
    }

    // --- Epochs ---

    /// Hand out the id for the next traversal.
    ///
    /// Ids increase strictly until the configured limit; the call after that
    /// rewinds the epoch first (see [`Graph::rewind_epoch`]) and returns 1.
    pub fn assign_visited_id(&mut self) -> u32 {
        if self.epoch.is_exhausted() {
            self.rewind_epoch();
        }
        self.epoch.advance()
    }

    /// Zero every node's visited id and restart the epoch counter.
    pub fn rewind_epoch(&mut self) {
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.set_visited_id(UNVISITED);
            }
        }
        self.epoch.rewind();
        tracing::debug!("visit epoch rewound");
    }

    /// The most recently assigned visit id.
    pub fn current_visited_id(&self) -> u32 {
        self.epoch.current()
    }

    /// Drop every node and rewind the epoch.
    ///
    /// Slot generations are kept, so ids handed out before the reset stay
    /// stale. Subscribers and statistics are kept.
    pub fn reset(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free_list.push(index as u32);
        }
        self.free_list.reverse();
        self.len = 0;
        self.partitions.clear();
        self.epoch.rewind();
        tracing::debug!("graph reset");
    }

    // --- Notifications ---

    /// Register an observer for completed, non-silent passes.
    ///
    /// The observer stays registered until the returned handle is dropped.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: FnMut(&EvaluationEvent<'_>) + Send + 'static,
    {
        self.listeners.subscribe(notify)
    }

    // --- Internals ---

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node<N>> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<N>> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    #[track_caller]
    pub(crate) fn expect_node(&self, id: NodeId) -> &Node<N> {
        match self.get(id) {
            Some(node) => node,
            None => panic!("node {id} is not in the graph"),
        }
    }

    #[track_caller]
    pub(crate) fn expect_node_mut(&mut self, id: NodeId) -> &mut Node<N> {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("node {id} is not in the graph"),
        }
    }

    /// Resolve a node that must be live and attached.
    pub(crate) fn attached(&self, id: NodeId) -> Result<&Node<N>> {
        let node = self.get(id).ok_or(GraphError::StaleNode(id))?;
        if !node.is_attached() {
            return Err(GraphError::Detached(id));
        }
        Ok(node)
    }

    /// Re-derive the partition of an attached node from its edges.
    pub(crate) fn reclassify(&mut self, id: NodeId) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        if node.is_attached() {
            let membership = node.reclassify();
            self.partitions.classify(id, membership);
        }
    }

    pub(crate) fn dirty_if_attached(&mut self, id: NodeId, direction: Direction) {
        if self.get(id).is_some_and(Node::is_attached) {
            self.dirty_node(id, direction);
        }
    }

    /// Whether `target` can be reached from `from` walking in `direction`.
    fn reaches(&mut self, from: NodeId, target: NodeId, direction: Direction) -> bool {
        let epoch = self.assign_visited_id();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            if node.visited_id() == epoch {
                continue;
            }
            node.set_visited_id(epoch);
            stack.extend_from_slice(node.neighbors(direction));
        }
        false
    }

    pub(crate) fn collect_links(&self, id: NodeId, direction: Direction) -> NodeList {
        self.expect_node(id).neighbors(direction).iter().copied().collect()
    }
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self::new()
    }
}
