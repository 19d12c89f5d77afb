//! Evaluation Callbacks and Pass Results
//!
//! The graph never looks inside a node's payload. It only calls
//! [`Evaluate::evaluate`] once the node's inputs have settled, and reports
//! what happened in an [`EvaluateResult`].

use std::time::Duration;

use serde::Serialize;

use crate::graph::{Direction, NodeId};

/// Error type returned by node callbacks.
pub type EvalError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Read-only view of a node's position in the graph, handed to its callback.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// The node being evaluated.
    pub node: NodeId,

    /// Which pass is running.
    pub direction: Direction,

    /// Nodes this node reads from.
    pub ancestors: &'a [NodeId],

    /// Nodes that read from this node.
    pub descendants: &'a [NodeId],

    /// Visit epoch of the running pass.
    pub epoch: u32,
}

impl EvalContext<'_> {
    /// Nodes that were settled before this callback ran.
    pub fn inputs(&self) -> &[NodeId] {
        match self.direction {
            Direction::Downstream => self.ancestors,
            Direction::Upstream => self.descendants,
        }
    }
}

/// The owner-supplied evaluation callback of a node.
pub trait Evaluate {
    /// Recompute this node for `cx.direction`.
    ///
    /// Returning an error leaves the node dirty so the next pass retries it.
    fn evaluate(&mut self, cx: &EvalContext<'_>) -> Result<(), EvalError>;
}

impl<F> Evaluate for F
where
    F: FnMut(&EvalContext<'_>) -> Result<(), EvalError>,
{
    fn evaluate(&mut self, cx: &EvalContext<'_>) -> Result<(), EvalError> {
        self(cx)
    }
}

/// A callback failure recorded by an isolating pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    /// The node whose callback failed.
    pub node: NodeId,

    /// The pass it failed in.
    pub direction: Direction,

    /// The callback's error message.
    pub message: String,
}

/// Outcome of one [`Graph::evaluate_graph`](crate::graph::Graph::evaluate_graph) call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluateResult {
    /// Nodes evaluated in the downstream pass, in evaluation order.
    pub downstream: Vec<NodeId>,

    /// Nodes evaluated in the upstream pass, in evaluation order.
    pub upstream: Vec<NodeId>,

    /// Callbacks that returned an error.
    pub failures: Vec<NodeFailure>,

    /// Nodes skipped because an input failed or was itself skipped.
    pub blocked: Vec<(NodeId, Direction)>,

    /// Wall time spent in the pass.
    pub total_time: Duration,
}

impl EvaluateResult {
    /// Number of successful callback invocations across both passes.
    pub fn node_count(&self) -> usize {
        self.downstream.len() + self.upstream.len()
    }

    /// Wall time in milliseconds.
    pub fn total_time_millis(&self) -> f64 {
        self.total_time.as_secs_f64() * 1000.0
    }

    /// Nodes evaluated in `direction`.
    pub fn evaluated(&self, direction: Direction) -> &[NodeId] {
        match direction {
            Direction::Downstream => &self.downstream,
            Direction::Upstream => &self.upstream,
        }
    }

    /// True when every visited node evaluated successfully.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.blocked.is_empty()
    }

    pub(crate) fn record(&mut self, node: NodeId, direction: Direction) {
        match direction {
            Direction::Downstream => self.downstream.push(node),
            Direction::Upstream => self.upstream.push(node),
        }
    }
}

/// Running totals across every pass a graph has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Number of completed passes.
    pub passes: u64,

    /// Successful callback invocations.
    pub node_count: u64,

    /// Time spent evaluating.
    pub evaluate_time: Duration,
}

impl GraphStats {
    pub(crate) fn accumulate(&mut self, result: &EvaluateResult) {
        self.passes += 1;
        self.node_count += result.node_count() as u64;
        self.evaluate_time += result.total_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_callback<F>(f: F) -> F
    where
        F: FnMut(&EvalContext<'_>) -> Result<(), EvalError>,
    {
        f
    }

    #[test]
    fn closures_are_callbacks() {
        let mut calls = 0;
        let mut callback = as_callback(|cx| {
            calls += 1;
            assert_eq!(cx.direction, Direction::Upstream);
            Ok(())
        });
        let cx = EvalContext {
            node: NodeId::new(0, 1),
            direction: Direction::Upstream,
            ancestors: &[],
            descendants: &[],
            epoch: 1,
        };
        callback.evaluate(&cx).unwrap();
        callback.evaluate(&cx).unwrap();
        assert_eq!(calls, 2);
    }

    #[test]
    fn context_inputs_follow_direction() {
        let a = [NodeId::new(1, 1)];
        let d = [NodeId::new(2, 1)];
        let mut cx = EvalContext {
            node: NodeId::new(0, 1),
            direction: Direction::Downstream,
            ancestors: &a,
            descendants: &d,
            epoch: 1,
        };
        assert_eq!(cx.inputs(), &a);
        cx.direction = Direction::Upstream;
        assert_eq!(cx.inputs(), &d);
    }

    #[test]
    fn result_counts_and_serializes() {
        let mut result = EvaluateResult::default();
        result.record(NodeId::new(0, 1), Direction::Downstream);
        result.record(NodeId::new(1, 1), Direction::Downstream);
        result.record(NodeId::new(0, 1), Direction::Upstream);
        result.total_time = Duration::from_millis(3);

        assert_eq!(result.node_count(), 3);
        assert_eq!(result.evaluated(Direction::Upstream).len(), 1);
        assert!(result.is_success());
        assert!((result.total_time_millis() - 3.0).abs() < 1e-9);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["downstream"][1]["index"], 1);
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = GraphStats::default();
        let mut result = EvaluateResult::default();
        result.record(NodeId::new(0, 1), Direction::Downstream);
        result.total_time = Duration::from_millis(2);

        stats.accumulate(&result);
        stats.accumulate(&result);
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.node_count, 2);
        assert_eq!(stats.evaluate_time, Duration::from_millis(4));
    }
}
