//! This module recovers a Process Structure Tree from a flow graph.
//!
//! The walk has two levels. The backbone follows the main path from the start node and
//! stops with a [`Pst::Loopback`] as soon as it revisits a node. Every split on the way is
//! expanded branch by branch up to its join; a branch that leads back into one of the splits
//! currently being expanded is closed as a [`Pst::Loop`].

use std::collections::{HashSet, VecDeque};

use log::{debug, trace};
use serde::Deserialize;

use super::Pst;
use crate::flow_graph::{FlowGraph, GatewayKind, NodeId, NodeKind};
use crate::Error;

/// Limits which make structuring fail predictably on pathological inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructureOptions {
    /// How deeply splits may nest inside each other
    pub max_depth: usize,
    /// How many nodes may be visited in total. Nested splits can revisit nodes.
    pub max_steps: usize,
}

impl Default for StructureOptions {
    fn default() -> Self {
        Self {
            max_depth: 256,
            max_steps: 100_000,
        }
    }
}

impl FlowGraph {
    /// Build the process structure tree of this graph with default limits
    pub fn structure(&self) -> Result<Pst, Error> {
        self.structure_with(StructureOptions::default())
    }

    pub fn structure_with(&self, options: StructureOptions) -> Result<Pst, Error> {
        let start = self.start_node().ok_or(Error::EmptyGraph)?;
        debug!("structuring '{}' from {}", self.id(), self.node(start).id);
        Structurer {
            graph: self,
            options,
            steps: 0,
        }
        .backbone(start)
    }
}

struct Structurer<'g> {
    graph: &'g FlowGraph,
    options: StructureOptions,
    steps: usize,
}

impl<'g> Structurer<'g> {
    fn tick(&mut self) -> Result<(), Error> {
        self.steps += 1;
        if self.steps > self.options.max_steps {
            return Err(Error::WorkBudgetExceeded(self.options.max_steps));
        }
        Ok(())
    }

    fn leaf(&self, node: NodeId) -> Option<Pst> {
        let label = self.graph.qualified_label(node);
        match self.graph.kind_of(node) {
            NodeKind::Task => Some(Pst::Task(label)),
            NodeKind::Event(_) => Some(Pst::Event(label)),
            NodeKind::Gateway(_) => None,
        }
    }

    /// The top-level chain. Its queue only ever holds the single node that comes next.
    fn backbone(&mut self, start: NodeId) -> Result<Pst, Error> {
        let graph = self.graph;
        let mut children = Vec::new();
        let mut emitted = HashSet::with_hasher(ahash::RandomState::new());
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if !emitted.insert(current) {
                debug!("backbone returned to {}", graph.node(current).id);
                children.push(Pst::Loopback(graph.qualified_label(current)));
                break;
            }
            self.tick()?;

            let successors = graph.successors(current);
            let split_kind = match graph.kind_of(current) {
                NodeKind::Task | NodeKind::Event(_) => {
                    children.extend(self.leaf(current));
                    // A task or event with several outgoing edges acts as an exclusive split
                    (successors.len() > 1).then_some(GatewayKind::Exclusive)
                }
                NodeKind::Gateway(kind) => (successors.len() > 1).then_some(kind),
            };

            match split_kind {
                Some(kind) => {
                    let (branch, join) = self.split(current, kind, &[], 0)?;
                    children.push(branch);
                    // Without a join there is no well-defined place to continue
                    let Some(join) = join else { break };
                    queue.extend(graph.successors(join).first());
                }
                None => queue.extend(successors.first()),
            }
        }

        Ok(Pst::sequence(children))
    }

    /// Expand every outgoing edge of `split` up to its join.
    /// Returns the branch node and the join the caller should continue after.
    fn split(
        &mut self,
        split: NodeId,
        kind: GatewayKind,
        enclosing: &[NodeId],
        depth: usize,
    ) -> Result<(Pst, Option<NodeId>), Error> {
        let graph = self.graph;
        let join = graph.find_join(split, kind).filter(|&join| join != split);

        let mut enclosing = enclosing.to_vec();
        enclosing.push(split);

        let mut children = Vec::with_capacity(graph.out_degree(split));
        for &origin in graph.successors(split) {
            if origin == split {
                children.push(Pst::Null);
            } else {
                children.push(self.branch(origin, join, &enclosing, depth + 1)?);
            }
        }
        trace!("split {} expanded into {} branches", graph.node(split).id, children.len());

        let branch = Pst::Branch {
            kind,
            label: Some(graph.qualified_label(split)),
            children,
        };
        Ok((branch, join))
    }

    /// Walk one branch from `start` until `stop` (exclusive), a dead end, or a node seen before.
    /// `enclosing` holds the splits being expanded around this branch; an edge back to one of
    /// them closes a loop.
    fn branch(
        &mut self,
        start: NodeId,
        stop: Option<NodeId>,
        enclosing: &[NodeId],
        depth: usize,
    ) -> Result<Pst, Error> {
        if depth > self.options.max_depth {
            return Err(Error::NestingTooDeep(self.options.max_depth));
        }
        let graph = self.graph;
        let mut children = Vec::new();
        let mut seen = HashSet::with_hasher(ahash::RandomState::new());
        let mut current = Some(start);

        while let Some(node) = current {
            if Some(node) == stop || !seen.insert(node) {
                break;
            }
            self.tick()?;

            let successors = graph.successors(node);
            if let Some(&target) = successors.iter().find(|s| enclosing.contains(s)) {
                debug!("loop from {} back to split {}", graph.node(node).id, graph.node(target).id);
                // The body is approximated by a single placeholder for one pass through the loop
                let body = if start == target {
                    Pst::Null
                } else {
                    Pst::Task(format!("Body_of_{}", graph.qualified_label(target)))
                };
                return Ok(Pst::Loop {
                    condition: Box::new(Pst::sequence(children)),
                    body: Box::new(body),
                });
            }

            let split_kind = match graph.kind_of(node) {
                NodeKind::Task | NodeKind::Event(_) => {
                    children.extend(self.leaf(node));
                    (successors.len() > 1).then_some(GatewayKind::Exclusive)
                }
                NodeKind::Gateway(kind) => (successors.len() > 1).then_some(kind),
            };

            current = match split_kind {
                Some(kind) => {
                    let (branch, join) = self.split(node, kind, enclosing, depth)?;
                    children.push(branch);
                    join.and_then(|join| graph.successors(join).first().copied())
                }
                None => successors.first().copied(),
            };
        }

        Ok(Pst::sequence(children))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flow_graph::test::{graph, AND, END, START, TASK, XOR};

    fn task(label: &str) -> Pst {
        Pst::Task(label.to_string())
    }

    fn event(label: &str) -> Pst {
        Pst::Event(label.to_string())
    }

    fn xor(label: &str, children: Vec<Pst>) -> Pst {
        Pst::Branch {
            kind: GatewayKind::Exclusive,
            label: Some(label.to_string()),
            children,
        }
    }

    #[test]
    fn test_linear_process() {
        let g = graph(
            &[("a", TASK), ("s", START), ("e", END)],
            &[("s", "a"), ("a", "e")],
        );
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![event("s"), task("a"), event("e")])
        );
    }

    #[test]
    fn test_exclusive_diamond() {
        let g = graph(
            &[("A", TASK), ("B", TASK), ("C", TASK), ("D", TASK), ("Start", START), ("End", END), ("X", XOR), ("J", XOR)],
            &[
                ("Start", "A"),
                ("A", "X"),
                ("X", "B"),
                ("X", "C"),
                ("B", "J"),
                ("C", "J"),
                ("J", "D"),
                ("D", "End"),
            ],
        );
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![
                event("Start"),
                task("A"),
                xor("X", vec![task("B"), task("C")]),
                task("D"),
                event("End"),
            ])
        );
    }

    #[test]
    fn test_structuring_is_deterministic() {
        let g = graph(
            &[("s", START), ("p", AND), ("a", TASK), ("b", TASK), ("c", TASK), ("j", AND), ("e", END)],
            &[("s", "p"), ("p", "a"), ("p", "b"), ("p", "c"), ("a", "j"), ("b", "j"), ("c", "j"), ("j", "e")],
        );
        let first = g.structure().unwrap();
        assert_eq!(first, g.structure().unwrap());
        assert!(matches!(
            &first,
            Pst::Sequence(children) if matches!(
                &children[1],
                Pst::Branch { kind: GatewayKind::Parallel, children, .. } if children.len() == 3
            )
        ));
    }

    #[test]
    fn test_unjoined_split_keeps_separate_ends() {
        let g = graph(
            &[("s", START), ("x", XOR), ("b", TASK), ("c", TASK), ("e1", END), ("e2", END)],
            &[("s", "x"), ("x", "b"), ("x", "c"), ("b", "e1"), ("c", "e2")],
        );
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![
                event("s"),
                xor(
                    "x",
                    vec![
                        Pst::Sequence(vec![task("b"), event("e1")]),
                        Pst::Sequence(vec![task("c"), event("e2")]),
                    ]
                ),
            ])
        );
    }

    #[test]
    fn test_loop_back_to_split() {
        // Start -> A -> X -> B -> A, X -> End
        let g = graph(
            &[("A", TASK), ("B", TASK), ("Start", START), ("End", END), ("X", XOR)],
            &[("Start", "A"), ("A", "X"), ("X", "B"), ("B", "A"), ("X", "End")],
        );
        let tree = g.structure().unwrap();
        assert_eq!(
            tree,
            Pst::Sequence(vec![
                event("Start"),
                task("A"),
                xor(
                    "X",
                    vec![
                        Pst::Loop {
                            condition: Box::new(task("B")),
                            body: Box::new(task("Body_of_X")),
                        },
                        event("End"),
                    ]
                ),
            ])
        );
    }

    #[test]
    fn test_cycle_through_pass_through_gateway_closes_with_loopback() {
        // Start -> A -> X -> B -> A: X has a single outgoing edge, so it never splits
        let g = graph(
            &[("A", TASK), ("B", TASK), ("Start", START), ("X", XOR)],
            &[("Start", "A"), ("A", "X"), ("X", "B"), ("B", "A")],
        );
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![event("Start"), task("A"), task("B"), Pst::Loopback("A".into())])
        );
    }

    #[test]
    fn test_split_into_itself_yields_null_branch() {
        let g = graph(
            &[("s", START), ("x", XOR), ("e", END)],
            &[("s", "x"), ("x", "x"), ("x", "e")],
        );
        let tree = g.structure().unwrap();
        assert_eq!(
            tree,
            Pst::Sequence(vec![event("s"), xor("x", vec![Pst::Null, event("e")])])
        );
    }

    #[test]
    fn test_backbone_cycle_becomes_loopback() {
        let g = graph(
            &[("a", TASK), ("b", TASK), ("m", XOR)],
            &[("m", "a"), ("a", "b"), ("b", "m")],
        );
        // No start event and no source node: structuring starts at the first node
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![task("a"), task("b"), Pst::Loopback("a".into())])
        );
    }

    #[test]
    fn test_task_with_two_outgoing_edges_splits() {
        let g = graph(
            &[("t", TASK), ("b", TASK), ("c", TASK), ("j", XOR), ("e", END)],
            &[("t", "b"), ("t", "c"), ("b", "j"), ("c", "j"), ("j", "e")],
        );
        assert_eq!(
            g.structure().unwrap(),
            Pst::Sequence(vec![task("t"), xor("t", vec![task("b"), task("c")]), event("e")])
        );
    }

    #[test]
    fn test_nested_splits() {
        let g = graph(
            &[
                ("s", START), ("x", XOR), ("p", AND), ("a", TASK), ("b", TASK),
                ("pj", AND), ("c", TASK), ("xj", XOR), ("e", END),
            ],
            &[
                ("s", "x"), ("x", "p"), ("x", "c"), ("p", "a"), ("p", "b"), ("a", "pj"),
                ("b", "pj"), ("pj", "xj"), ("c", "xj"), ("xj", "e"),
            ],
        );
        let tree = g.structure().unwrap();
        let inner = Pst::Branch {
            kind: GatewayKind::Parallel,
            label: Some("p".into()),
            children: vec![task("a"), task("b")],
        };
        assert_eq!(
            tree,
            Pst::Sequence(vec![event("s"), xor("x", vec![inner, task("c")]), event("e")])
        );
        // Every task and event shows up exactly once
        let mut labels = tree.leaf_labels();
        labels.sort_unstable();
        assert_eq!(labels, ["a", "b", "c", "e", "s"]);
    }

    #[test]
    fn test_empty_graph_is_an_error() {
        assert!(matches!(graph(&[], &[]).structure(), Err(Error::EmptyGraph)));
    }

    #[test]
    fn test_guards() {
        let g = graph(
            &[("s", START), ("x", XOR), ("y", XOR), ("a", TASK), ("b", TASK), ("c", TASK)],
            &[("s", "x"), ("x", "y"), ("x", "a"), ("y", "b"), ("y", "c")],
        );
        let shallow = StructureOptions { max_depth: 1, ..Default::default() };
        assert!(matches!(g.structure_with(shallow), Err(Error::NestingTooDeep(1))));

        let tiny = StructureOptions { max_steps: 2, ..Default::default() };
        assert!(matches!(g.structure_with(tiny), Err(Error::WorkBudgetExceeded(2))));

        assert!(g.structure().is_ok());
    }
}
