//! Depgraph Core
//!
//! This crate provides the dependency graph evaluator behind a scene editor.
//! It implements:
//!
//! - Nodes with upstream and downstream dirty state
//! - Root / intermediate / terminal classification kept in step with edges
//! - Dirty propagation that touches each node at most once
//! - Evaluation passes that visit only dirty nodes, in dependency order
//! - Branch pruning and re-insertion for delete and undo
//! - Notifications to observers after each pass
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: nodes, partitions, visit epochs, edits and the scheduler
//! - `eval`: the node callback trait and pass results
//! - `notify`: subscribers to completed passes
//! - `config`: failure policy and epoch settings
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use depgraph_core::{Direction, EvalContext, EvalError, Evaluate, Graph};
//!
//! struct Layer(&'static str);
//!
//! impl Evaluate for Layer {
//!     fn evaluate(&mut self, cx: &EvalContext<'_>) -> Result<(), EvalError> {
//!         println!("{} {:?}", self.0, cx.direction);
//!         Ok(())
//!     }
//! }
//!
//! let mut graph = Graph::new();
//! let transform = graph.add_node(Layer("transform"));
//! let mesh = graph.add_node(Layer("mesh"));
//! graph.add_dependency(transform, mesh)?;
//!
//! let result = graph.evaluate_graph(false)?;
//! assert_eq!(result.downstream, vec![transform, mesh]);
//!
//! // Editing the transform makes the mesh stale too.
//! assert_eq!(graph.dirty_node(transform, Direction::Downstream), 2);
//! # Ok::<(), depgraph_core::GraphError>(())
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod graph;
pub mod notify;

pub use config::{FailurePolicy, GraphConfig};
pub use error::{GraphError, Result};
pub use eval::{EvalContext, EvalError, Evaluate, EvaluateResult, GraphStats, NodeFailure};
pub use graph::{Direction, Graph, Membership, Node, NodeId, NodeState};
pub use notify::{EvaluationEvent, Subscription};
