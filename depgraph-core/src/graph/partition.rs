//! Graph Partitions
//!
//! Every attached node lives in exactly one of three sets: roots,
//! intermediates, or terminals. Evaluation starts from these sets, so they
//! must be kept in step with the edges at all times.

use indexmap::IndexSet;

use super::node::{Membership, NodeId};

/// The three membership sets of a graph.
#[derive(Debug, Default, Clone)]
pub struct Partitions {
    roots: IndexSet<NodeId>,
    intermediates: IndexSet<NodeId>,
    terminals: IndexSet<NodeId>,
}

impl Partitions {
    /// Create empty partitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `id` into the set for `membership`, removing it from the others.
    pub fn classify(&mut self, id: NodeId, membership: Membership) {
        for (set_membership, set) in self.sets_mut() {
            if set_membership == membership {
                set.insert(id);
            } else {
                set.swap_remove(&id);
            }
        }
    }

    /// Remove `id` from whichever set holds it.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let mut removed = false;
        for (_, set) in self.sets_mut() {
            removed |= set.swap_remove(&id);
        }
        removed
    }

    /// Which set holds `id`, if any.
    pub fn membership_of(&self, id: NodeId) -> Option<Membership> {
        if self.roots.contains(&id) {
            Some(Membership::Root)
        } else if self.intermediates.contains(&id) {
            Some(Membership::Intermediate)
        } else if self.terminals.contains(&id) {
            Some(Membership::Terminal)
        } else {
            None
        }
    }

    /// Empty all three sets.
    pub fn clear(&mut self) {
        self.roots.clear();
        self.intermediates.clear();
        self.terminals.clear();
    }

    /// Nodes with descendants but no ancestors.
    pub fn roots(&self) -> &IndexSet<NodeId> {
        &self.roots
    }

    /// Nodes with both ancestors and descendants.
    pub fn intermediates(&self) -> &IndexSet<NodeId> {
        &self.intermediates
    }

    /// Nodes with no descendants.
    pub fn terminals(&self) -> &IndexSet<NodeId> {
        &self.terminals
    }

    /// Total number of classified nodes.
    pub fn len(&self) -> usize {
        self.roots.len() + self.intermediates.len() + self.terminals.len()
    }

    /// True if no node is classified.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sets_mut(&mut self) -> [(Membership, &mut IndexSet<NodeId>); 3] {
        [
            (Membership::Root, &mut self.roots),
            (Membership::Intermediate, &mut self.intermediates),
            (Membership::Terminal, &mut self.terminals),
        ]
    }
}
