//! Error types for graph edits and evaluation passes.

use thiserror::Error;

use crate::eval::EvalError;
use crate::graph::{Direction, NodeId};

/// Errors returned by fallible graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The id refers to a node that was removed (or never existed).
    #[error("node {0} is not in the graph")]
    StaleNode(NodeId),

    /// The node sits in a pruned branch and cannot be edited or dirtied.
    #[error("node {0} is detached from the graph")]
    Detached(NodeId),

    /// The node is already attached, so there is no branch to insert.
    #[error("node {0} is already attached")]
    AlreadyAttached(NodeId),

    /// A node cannot depend on itself.
    #[error("node {0} cannot depend on itself")]
    SelfDependency(NodeId),

    /// The edge already exists.
    #[error("{descendant} already depends on {ancestor}")]
    DuplicateDependency { ancestor: NodeId, descendant: NodeId },

    /// The edge to remove does not exist.
    #[error("{descendant} does not depend on {ancestor}")]
    MissingDependency { ancestor: NodeId, descendant: NodeId },

    /// Adding the edge would make the graph cyclic.
    #[error("making {descendant} depend on {ancestor} would create a cycle")]
    Cycle { ancestor: NodeId, descendant: NodeId },

    /// A node callback failed and the pass was aborted.
    #[error("evaluating {node} {direction:?} failed: {source}")]
    Evaluation {
        node: NodeId,
        direction: Direction,
        #[source]
        source: EvalError,
    },
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
