//! Branch pruning and re-insertion.
//!
//! Deleting a scene object takes everything that depends on it out of the
//! live graph, and undoing the delete has to put it all back. Pruning keeps
//! the branch's internal edges and each member's ancestor list, and only
//! cuts the descendant links held by ancestors outside the branch. Those
//! one-way ancestor links are what [`Graph::insert`] uses to reconnect.

use super::dag::Graph;
use super::node::{Direction, NodeId};
use crate::error::{GraphError, Result};

impl<N> Graph<N> {
    /// Detach `id` and everything downstream of it.
    ///
    /// Pruned nodes keep their payloads and stay addressable, but leave every
    /// partition, are skipped by dirtying and evaluation, and reject edge
    /// edits. Returns the pruned nodes, `id` first.
    pub fn prune(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.attached(id)?;
        let epoch = self.assign_visited_id();
        let branch = self.collect_branch(id, epoch);

        for &member in &branch {
            for ancestor in self.collect_links(member, Direction::Upstream) {
                let outside = self
                    .get(ancestor)
                    .is_some_and(|node| node.visited_id() != epoch);
                if outside {
                    self.expect_node_mut(ancestor).remove_descendant(member);
                    self.reclassify(ancestor);
                    self.dirty_node(ancestor, Direction::Upstream);
                }
            }
        }

        for &member in &branch {
            self.partitions.remove(member);
            self.expect_node_mut(member).set_attached(false);
        }

        tracing::debug!(node = %id, size = branch.len(), "branch pruned");
        Ok(branch)
    }

    /// Re-attach a branch detached by [`Graph::prune`].
    ///
    /// Ancestors outside the branch get their descendant links back;
    /// ancestors that were removed in the meantime are forgotten. Every
    /// branch member is dirtied in both directions. Fails without changing
    /// anything if an outside ancestor is itself pruned.
    pub fn insert(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.get(id).ok_or(GraphError::StaleNode(id))?;
        if node.is_attached() {
            return Err(GraphError::AlreadyAttached(id));
        }

        let epoch = self.assign_visited_id();
        let branch = self.collect_branch(id, epoch);

        let mut reconnect = Vec::new();
        let mut forget = Vec::new();
        for &member in &branch {
            for ancestor in self.collect_links(member, Direction::Upstream) {
                match self.get(ancestor) {
                    None => forget.push((member, ancestor)),
                    Some(node) if node.visited_id() == epoch => {}
                    Some(node) if !node.is_attached() => {
                        return Err(GraphError::Detached(ancestor));
                    }
                    Some(_) => reconnect.push((member, ancestor)),
                }
            }
        }

        for (member, ancestor) in forget {
            self.expect_node_mut(member).remove_ancestor(ancestor);
        }
        for &member in &branch {
            self.expect_node_mut(member).set_attached(true);
        }
        for &(member, ancestor) in &reconnect {
            self.expect_node_mut(ancestor).add_descendant(member);
            self.reclassify(ancestor);
        }
        for &member in &branch {
            self.reclassify(member);
        }
        for &member in &branch {
            for direction in Direction::ALL {
                self.dirty_node(member, direction);
            }
        }

        tracing::debug!(node = %id, size = branch.len(), "branch inserted");
        Ok(branch)
    }

    /// Depth-first walk over descendants, tagging each member with `epoch`.
    fn collect_branch(&mut self, id: NodeId, epoch: u32) -> Vec<NodeId> {
        let mut branch = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.expect_node_mut(next);
            if node.visited_id() == epoch {
                continue;
            }
            node.set_visited_id(epoch);
            branch.push(next);
            stack.extend(node.descendants().iter().rev().copied());
        }
        branch
    }
}
