//! Dependency Graph
//!
//! This module implements the scene dependency graph: the nodes, the edges
//! between them, and the incremental evaluator that keeps them up to date.
//!
//! # Overview
//!
//! The graph is a directed acyclic graph where:
//!
//! - Nodes are scene objects whose evaluation depends on other objects
//! - Edges are dependencies: if B reads from A, A is an ancestor of B and
//!   B is a descendant of A
//!
//! An edit marks the edited node dirty, and everything that depends on it
//! with it. The next evaluation pass visits exactly the dirty nodes, each
//! once, inputs before dependents.
//!
//! # Design Decisions
//!
//! 1. Nodes live in an arena and refer to each other through
//!    generation-checked [`NodeId`]s. Neighbor lists hold no ownership, and
//!    a removed node's id can never resolve to a different node.
//!
//! 2. Every node belongs to exactly one partition (roots, intermediates,
//!    terminals), kept current on every edge change. Passes start from
//!    these sets instead of scanning the whole graph.
//!
//! 3. Traversals mark nodes with a visit epoch rather than building a
//!    visited set, so starting a traversal costs nothing. The epoch counter
//!    rewinds every node before it could wrap.

mod branch;
mod dag;
mod epoch;
mod node;
mod partition;
mod scheduler;

pub use dag::Graph;
pub use epoch::{VisitEpoch, UNVISITED};
pub use node::{Direction, Membership, Node, NodeId, NodeState};
pub use partition::Partitions;
