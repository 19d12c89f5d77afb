//! Evaluation Scheduler
//!
//! The scheduler runs the dirty part of the graph in dependency order.
//! It never sorts the whole graph; it walks back from the partitions and
//! only descends into inputs that are still dirty.
//!
//! # Algorithm
//!
//! One call to [`Graph::evaluate_graph`] runs two passes:
//!
//! 1. Downstream: for every terminal that is dirty downstream, settle its
//!    dirty ancestors first (post-order), then evaluate it.
//! 2. Upstream: the mirror image, starting from roots (and isolated
//!    terminals) and settling dirty descendants first.
//!
//! Each pass takes a fresh visit epoch. A node whose visited id equals the
//! pass epoch has already been handled in this pass: it is either clean
//! (evaluated) or still dirty because it failed or was blocked. The walk
//! uses an explicit frame stack, so deep graphs do not grow the call stack.
//!
//! A node's dirty flag is cleared only after its callback returned `Ok`.
//! Anything that did not evaluate stays dirty and the next pass tries the
//! same work again.

use std::time::Instant;

use super::dag::Graph;
use super::node::{Direction, NodeId, NodeState};
use crate::config::FailurePolicy;
use crate::error::{GraphError, Result};
use crate::eval::{EvalContext, EvalError, Evaluate, EvaluateResult, NodeFailure};
use crate::notify::EvaluationEvent;

/// One node on the evaluation stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    /// Next input to look at.
    cursor: usize,
    /// An input failed or was itself blocked.
    blocked: bool,
}

impl<N: Evaluate> Graph<N> {
    /// Evaluate every dirty node, downstream pass first, then upstream.
    ///
    /// `silent` suppresses the [`EvaluationEvent`] sent to subscribers.
    ///
    /// With [`FailurePolicy::Isolate`] a failing callback is recorded in the
    /// result and only the nodes that read from it are skipped. With
    /// [`FailurePolicy::Abort`] the first failure ends the call with
    /// [`GraphError::Evaluation`]; everything not yet evaluated stays dirty.
    ///
    /// Callbacks only see an [`EvalContext`]. The graph is mutably borrowed
    /// for the whole call, so edits made while a pass is running are
    /// rejected at compile time.
    pub fn evaluate_graph(&mut self, silent: bool) -> Result<EvaluateResult> {
        let _span = tracing::debug_span!("evaluate_graph", silent).entered();
        let start = Instant::now();
        let mut result = EvaluateResult::default();

        let terminals: Vec<NodeId> = self.terminals().collect();
        self.run_pass(Direction::Downstream, &terminals, &mut result)?;

        let mut sources: Vec<NodeId> = self.roots().collect();
        sources.extend(
            self.terminals()
                .filter(|&id| self.expect_node(id).ancestors().is_empty()),
        );
        self.run_pass(Direction::Upstream, &sources, &mut result)?;

        result.total_time = start.elapsed();
        self.stats.accumulate(&result);

        tracing::debug!(
            downstream = result.downstream.len(),
            upstream = result.upstream.len(),
            failures = result.failures.len(),
            blocked = result.blocked.len(),
            millis = result.total_time_millis(),
            "evaluation pass complete"
        );

        if !silent {
            self.listeners.raise(&EvaluationEvent { result: &result });
        }
        Ok(result)
    }

    fn run_pass(
        &mut self,
        direction: Direction,
        starts: &[NodeId],
        result: &mut EvaluateResult,
    ) -> Result<()> {
        let epoch = self.assign_visited_id();
        for &start in starts {
            let Some(node) = self.get(start) else {
                continue;
            };
            if node.is_dirty(direction) && node.visited_id() != epoch {
                self.evaluate_from(start, direction, epoch, result)?;
            }
        }
        Ok(())
    }

    /// Post-order walk from `start`, settling dirty inputs before each node.
    fn evaluate_from(
        &mut self,
        start: NodeId,
        direction: Direction,
        epoch: u32,
        result: &mut EvaluateResult,
    ) -> Result<()> {
        let mut stack = vec![self.enter(start, direction, epoch)];

        while let Some(&Frame { node, cursor, .. }) = stack.last() {
            let top = stack.len() - 1;
            let next = self.expect_node(node).inputs(direction).get(cursor).copied();

            if let Some(input) = next {
                stack[top].cursor += 1;
                let input_node = self.expect_node(input);
                if !input_node.is_dirty(direction) {
                    continue;
                }
                if input_node.visited_id() == epoch {
                    debug_assert_ne!(
                        input_node.state(direction),
                        NodeState::Evaluating,
                        "dependency cycle through {input}"
                    );
                    stack[top].blocked = true;
                    continue;
                }
                let frame = self.enter(input, direction, epoch);
                stack.push(frame);
                continue;
            }

            let Some(frame) = stack.pop() else {
                break;
            };
            let settled = if frame.blocked {
                self.expect_node_mut(frame.node)
                    .set_state(direction, NodeState::Dirty);
                result.blocked.push((frame.node, direction));
                tracing::debug!(node = %frame.node, ?direction, "skipped, input not settled");
                false
            } else {
                match self.invoke(frame.node, direction, epoch) {
                    Ok(()) => {
                        result.record(frame.node, direction);
                        true
                    }
                    Err(source) => {
                        tracing::warn!(node = %frame.node, ?direction, error = %source, "node evaluation failed");
                        match self.config.failure_policy {
                            FailurePolicy::Isolate => {
                                result.failures.push(NodeFailure {
                                    node: frame.node,
                                    direction,
                                    message: source.to_string(),
                                });
                                false
                            }
                            FailurePolicy::Abort => {
                                for pending in &stack {
                                    self.expect_node_mut(pending.node)
                                        .set_state(direction, NodeState::Dirty);
                                }
                                return Err(GraphError::Evaluation {
                                    node: frame.node,
                                    direction,
                                    source,
                                });
                            }
                        }
                    }
                }
            };

            if !settled {
                if let Some(parent) = stack.last_mut() {
                    parent.blocked = true;
                }
            }
        }
        Ok(())
    }

    fn enter(&mut self, id: NodeId, direction: Direction, epoch: u32) -> Frame {
        let node = self.expect_node_mut(id);
        node.set_visited_id(epoch);
        node.set_state(direction, NodeState::Evaluating);
        Frame {
            node: id,
            cursor: 0,
            blocked: false,
        }
    }

    /// Run one callback. The node is clean afterwards only on success.
    fn invoke(
        &mut self,
        id: NodeId,
        direction: Direction,
        epoch: u32,
    ) -> std::result::Result<(), EvalError> {
        let node = self.expect_node_mut(id);
        let outcome = {
            let (payload, ancestors, descendants) = node.payload_and_links();
            let cx = EvalContext {
                node: id,
                direction,
                ancestors,
                descendants,
                epoch,
            };
            payload.evaluate(&cx)
        };

        match outcome {
            Ok(()) => {
                node.clear_dirty(direction);
                tracing::trace!(node = %id, ?direction, "evaluated");
            }
            Err(_) => node.set_state(direction, NodeState::Dirty),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(&'static str, Direction)>>>;

    struct Probe {
        name: &'static str,
        log: Log,
        fail: bool,
    }

    impl Evaluate for Probe {
        fn evaluate(&mut self, cx: &EvalContext<'_>) -> std::result::Result<(), EvalError> {
            if self.fail {
                return Err(format!("{} is broken", self.name).into());
            }
            self.log.borrow_mut().push((self.name, cx.direction));
            Ok(())
        }
    }

    fn probe(graph: &mut Graph<Probe>, log: &Log, name: &'static str) -> NodeId {
        graph.add_node(Probe {
            name,
            log: log.clone(),
            fail: false,
        })
    }

    fn downstream(log: &Log) -> Vec<&'static str> {
        log.borrow()
            .iter()
            .filter(|(_, d)| *d == Direction::Downstream)
            .map(|(name, _)| *name)
            .collect()
    }

    fn upstream(log: &Log) -> Vec<&'static str> {
        log.borrow()
            .iter()
            .filter(|(_, d)| *d == Direction::Upstream)
            .map(|(name, _)| *name)
            .collect()
    }

    #[test]
    fn chain_evaluates_in_dependency_order() {
        let log = Log::default();
        let mut graph = Graph::new();
        let x = probe(&mut graph, &log, "x");
        let y = probe(&mut graph, &log, "y");
        let z = probe(&mut graph, &log, "z");
        graph.add_dependency(x, y).unwrap();
        graph.add_dependency(y, z).unwrap();

        let result = graph.evaluate_graph(true).unwrap();
        assert_eq!(result.downstream, vec![x, y, z]);
        assert_eq!(result.upstream, vec![z, y, x]);
        assert_eq!(downstream(&log), ["x", "y", "z"]);
        assert_eq!(upstream(&log), ["z", "y", "x"]);
        assert!(graph.dirty_nodes(Direction::Downstream).is_empty());
        assert!(graph.dirty_nodes(Direction::Upstream).is_empty());
    }

    #[test]
    fn clean_graph_does_nothing() {
        let log = Log::default();
        let mut graph = Graph::new();
        probe(&mut graph, &log, "a");
        graph.evaluate_graph(true).unwrap();
        log.borrow_mut().clear();

        let result = graph.evaluate_graph(true).unwrap();
        assert_eq!(result.node_count(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn isolated_node_runs_both_passes() {
        let log = Log::default();
        let mut graph = Graph::new();
        let a = probe(&mut graph, &log, "a");

        let result = graph.evaluate_graph(true).unwrap();
        assert_eq!(result.downstream, vec![a]);
        assert_eq!(result.upstream, vec![a]);
    }

    #[test]
    fn isolate_policy_skips_dependents_only() {
        let log = Log::default();
        let mut graph = Graph::new();
        let a = probe(&mut graph, &log, "a");
        let b = probe(&mut graph, &log, "b");
        let c = probe(&mut graph, &log, "c");
        let other = probe(&mut graph, &log, "other");
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, c).unwrap();
        graph.node_mut(b).unwrap().payload_mut().fail = true;

        let result = graph.evaluate_graph(true).unwrap();
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.failures[0].node, b);
        assert_eq!(result.failures[0].message, "b is broken");
        assert!(result.blocked.contains(&(c, Direction::Downstream)));
        assert!(result.blocked.contains(&(a, Direction::Upstream)));
        assert!(result.downstream.contains(&a));
        assert!(result.downstream.contains(&other));
        assert!(!result.is_success());

        assert!(graph.is_dirty(b, Direction::Downstream));
        assert!(graph.is_dirty(c, Direction::Downstream));
        assert!(!graph.is_dirty(a, Direction::Downstream));
        assert_eq!(graph.node_state(b, Direction::Downstream), NodeState::Dirty);

        // Fixing the node lets the next pass finish the same work.
        graph.node_mut(b).unwrap().payload_mut().fail = false;
        let result = graph.evaluate_graph(true).unwrap();
        assert_eq!(result.downstream, vec![b, c]);
        assert_eq!(result.upstream, vec![b, a]);
        assert!(result.is_success());
    }

    #[test]
    fn abort_policy_stops_the_pass() {
        let log = Log::default();
        let mut graph =
            Graph::with_config(GraphConfig::default().with_failure_policy(FailurePolicy::Abort));
        let a = probe(&mut graph, &log, "a");
        let b = probe(&mut graph, &log, "b");
        let c = probe(&mut graph, &log, "c");
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(b, c).unwrap();
        graph.node_mut(b).unwrap().payload_mut().fail = true;

        let err = graph.evaluate_graph(true).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Evaluation { node, direction: Direction::Downstream, .. } if node == b
        ));
        assert_eq!(downstream(&log), ["a"]);
        assert!(upstream(&log).is_empty());

        assert_eq!(graph.node_state(b, Direction::Downstream), NodeState::Dirty);
        assert_eq!(graph.node_state(c, Direction::Downstream), NodeState::Dirty);
        assert!(!graph.is_dirty(a, Direction::Downstream));
        assert_eq!(graph.stats().passes, 0);
    }

    #[test]
    fn diamond_evaluates_shared_node_once() {
        let log = Log::default();
        let mut graph = Graph::new();
        let a = probe(&mut graph, &log, "a");
        let b = probe(&mut graph, &log, "b");
        let c = probe(&mut graph, &log, "c");
        let d = probe(&mut graph, &log, "d");
        graph.add_dependency(a, b).unwrap();
        graph.add_dependency(a, c).unwrap();
        graph.add_dependency(b, d).unwrap();
        graph.add_dependency(c, d).unwrap();
        graph.evaluate_graph(true).unwrap();
        log.borrow_mut().clear();

        assert_eq!(graph.dirty_node(a, Direction::Downstream), 4);
        graph.evaluate_graph(true).unwrap();
        let order = downstream(&log);
        assert_eq!(order.iter().filter(|&&n| n == "d").count(), 1);
        assert_eq!(order.iter().filter(|&&n| n == "a").count(), 1);
        assert_eq!(order.first(), Some(&"a"));
        assert_eq!(order.last(), Some(&"d"));
    }

    #[test]
    fn stats_accumulate_across_passes() {
        let log = Log::default();
        let mut graph = Graph::new();
        let a = probe(&mut graph, &log, "a");
        graph.evaluate_graph(true).unwrap();
        graph.dirty(a);
        graph.evaluate_graph(true).unwrap();

        let stats = graph.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.node_count, 3);
    }
}
