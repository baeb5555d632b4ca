//! This module renders a process structure tree into a fresh flow graph with a layout.
//!
//! Nodes are placed recursively: sequences run left to right, branches fan out vertically
//! between a split and a join gateway, and loops place their body below and to the right of
//! the condition with an edge back to it.

mod layout;

pub use layout::{Bounds, Connector, Layout, LayoutConfig, Point, Size};

use std::collections::HashMap;

use log::debug;

use crate::flow_graph::{EventRole, FlowGraph, FlowGraphBuilder, GatewayKind, NodeId, NodeKind};
use crate::pst::Pst;
use crate::Error;

/// The output of rendering: a new flow graph and where its nodes and edges are drawn
#[derive(Debug, Clone)]
pub struct Rendering {
    pub graph: FlowGraph,
    pub layout: Layout,
}

/// Render a tree with the default layout
pub fn render(tree: &Pst) -> Result<Rendering, Error> {
    render_with(tree, &LayoutConfig::default())
}

pub fn render_with(tree: &Pst, config: &LayoutConfig) -> Result<Rendering, Error> {
    let mut renderer = Renderer::new(config);
    renderer.place(tree, config.origin, 1)?;
    Ok(renderer.finish())
}

/// Hands out ids from one counter shared by every kind of element, e.g. Task_1, Split_2, Flow_3
#[derive(Debug, Default)]
struct IdAllocator {
    next: usize,
}

impl IdAllocator {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{}_{}", prefix, self.next)
    }
}

/// Where incoming edges attach to a placed subtree, where outgoing edges leave it,
/// and where the next sibling goes
#[derive(Debug, Clone, Copy)]
struct Placement {
    entry: NodeId,
    exit: NodeId,
    next: Point,
}

struct Renderer<'c> {
    config: &'c LayoutConfig,
    ids: IdAllocator,
    builder: FlowGraphBuilder,
    shapes: HashMap<NodeId, Bounds, ahash::RandomState>,
    /// First leaf placed for each label, used to resolve loopbacks
    leaves: HashMap<String, NodeId, ahash::RandomState>,
}

impl<'c> Renderer<'c> {
    fn new(config: &'c LayoutConfig) -> Self {
        Self {
            config,
            ids: IdAllocator::default(),
            builder: FlowGraphBuilder::new("Process_1"),
            shapes: HashMap::default(),
            leaves: HashMap::default(),
        }
    }

    fn add_node(&mut self, prefix: &str, kind: NodeKind, name: String, at: Point, size: Size) -> Result<NodeId, Error> {
        let id = self.ids.allocate(prefix);
        let node = self.builder.add_node(id, kind, Some(name))?;
        self.shapes.insert(node, Bounds::new(at, size));
        Ok(node)
    }

    fn add_flow(&mut self, source: NodeId, target: NodeId) {
        let id = self.ids.allocate("Flow");
        self.builder.connect(id, source, target);
    }

    fn leaf(&mut self, prefix: &str, kind: NodeKind, name: String, label: &str, at: Point, size: Size) -> Result<Placement, Error> {
        let node = self.add_node(prefix, kind, name, at, size)?;
        self.leaves.entry(label.to_string()).or_insert(node);
        Ok(Placement { entry: node, exit: node, next: at })
    }

    fn place(&mut self, tree: &Pst, at: Point, depth: usize) -> Result<Placement, Error> {
        if depth > self.config.max_depth {
            return Err(Error::NestingTooDeep(self.config.max_depth));
        }
        let config = self.config;
        match tree {
            Pst::Task(label) => {
                let name = if label.is_empty() { "Task".to_string() } else { label.clone() };
                self.leaf("Task", NodeKind::Task, name, label, at, config.task)
            }
            Pst::Event(label) => {
                let name = if label.is_empty() { "Event".to_string() } else { label.clone() };
                let kind = NodeKind::Event(event_role(label));
                self.leaf("Event", kind, name, label, at, config.event)
            }
            Pst::Null => {
                let node = self.add_node("Null", NodeKind::Task, "None".to_string(), at, config.null)?;
                Ok(Placement { entry: node, exit: node, next: at })
            }
            Pst::Loopback(label) => match self.leaves.get(label) {
                // Close the cycle on the node we already drew
                Some(&target) => Ok(Placement { entry: target, exit: target, next: at }),
                None => {
                    debug!("loopback target '{}' was never placed, drawing it as a task", label);
                    self.leaf("Task", NodeKind::Task, label.clone(), label, at, config.task)
                }
            },
            Pst::Sequence(children) => {
                let mut cursor = at;
                let mut first: Option<Placement> = None;
                let mut previous: Option<NodeId> = None;
                for child in children {
                    let placed = self.place(child, cursor, depth + 1)?;
                    if let Some(exit) = previous {
                        self.add_flow(exit, placed.entry);
                    }
                    first.get_or_insert(placed);
                    previous = Some(placed.exit);
                    cursor = Point::new(placed.next.x + config.pitch, placed.next.y);
                }
                match (first, previous) {
                    (Some(first), Some(last)) => Ok(Placement { entry: first.entry, exit: last, next: cursor }),
                    _ => self.place(&Pst::Null, at, depth),
                }
            }
            Pst::Branch { kind, label, children } => {
                let gateway = NodeKind::Gateway(*kind);
                let default_name = match kind {
                    GatewayKind::Exclusive => "XOR",
                    GatewayKind::Parallel => "AND",
                };
                let name = label.clone().unwrap_or_else(|| default_name.to_string());
                let split = self.add_node("Split", gateway, name, at, config.gateway)?;

                let mut y = at.y - (children.len().saturating_sub(1) as f64) * config.branch_spacing / 2.0;
                let mut exits = Vec::with_capacity(children.len());
                for child in children {
                    let placed = self.place(child, Point::new(at.x + config.branch_offset, y), depth + 1)?;
                    self.add_flow(split, placed.entry);
                    exits.push(placed.exit);
                    y += config.branch_spacing;
                }

                let join_at = Point::new(at.x + config.join_offset, at.y);
                let join = self.add_node("Join", gateway, "Join".to_string(), join_at, config.gateway)?;
                if exits.is_empty() {
                    self.add_flow(split, join);
                }
                for exit in exits {
                    self.add_flow(exit, join);
                }
                Ok(Placement { entry: split, exit: join, next: join_at })
            }
            Pst::Loop { condition, body } => {
                let condition = self.place(condition, at, depth + 1)?;
                let body_at = Point::new(at.x + config.loop_body_offset.x, at.y + config.loop_body_offset.y);
                let body = self.place(body, body_at, depth + 1)?;
                self.add_flow(condition.exit, body.entry);
                // The back edge, so the condition ends up with two outgoing edges
                self.add_flow(body.exit, condition.entry);
                Ok(Placement {
                    entry: condition.entry,
                    exit: condition.exit,
                    next: Point::new(at.x + config.loop_advance.x, at.y + config.loop_advance.y),
                })
            }
        }
    }

    fn finish(self) -> Rendering {
        let graph = self.builder.build();
        let connectors = graph
            .edges()
            .iter()
            .enumerate()
            .filter_map(|(index, edge)| {
                let source = self.shapes.get(&edge.source)?;
                let target = self.shapes.get(&edge.target)?;
                Some(Connector {
                    edge: index,
                    waypoints: vec![source.right_center(), target.left_center()],
                })
            })
            .collect();
        debug!(
            "rendered {} nodes and {} edges",
            graph.len(),
            graph.edges().len()
        );
        Rendering {
            graph,
            layout: Layout {
                shapes: self.shapes,
                connectors,
            },
        }
    }
}

/// Events have no role in the tree, so it is guessed from the label
fn event_role(label: &str) -> EventRole {
    let label = label.to_lowercase();
    if label.contains("start") {
        EventRole::Start
    } else if label.contains("end") {
        EventRole::End
    } else {
        EventRole::Intermediate
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn task(label: &str) -> Pst {
        Pst::Task(label.to_string())
    }

    fn kinds(graph: &FlowGraph) -> Vec<NodeKind> {
        graph.nodes().map(|(_, node)| node.kind).collect()
    }

    #[test]
    fn test_single_task() {
        let rendering = render(&task("a")).unwrap();
        let (id, node) = rendering.graph.nodes().next().unwrap();
        assert_eq!(node.id, "Task_1");
        assert_eq!(node.name.as_deref(), Some("a"));
        assert_eq!(
            rendering.layout.bounds(id),
            Some(&Bounds { x: 100.0, y: 100.0, width: 100.0, height: 80.0 })
        );
        assert!(rendering.graph.edges().is_empty());
    }

    #[test]
    fn test_sequence_advances_by_pitch() {
        let tree = Pst::Sequence(vec![Pst::Event("start".into()), task("a"), Pst::Event("end".into())]);
        let rendering = render(&tree).unwrap();
        let graph = &rendering.graph;
        assert_eq!(
            kinds(graph),
            [NodeKind::Event(EventRole::Start), NodeKind::Task, NodeKind::Event(EventRole::End)]
        );
        let xs: Vec<f64> = graph.nodes().map(|(id, _)| rendering.layout.bounds(id).unwrap().x).collect();
        assert_eq!(xs, [100.0, 300.0, 500.0]);

        let ids: Vec<&str> = graph.nodes().map(|(_, node)| node.id.as_str()).collect();
        // Flows draw from the same counter as nodes
        assert_eq!(ids, ["Event_1", "Task_2", "Event_4"]);
        let flows: Vec<&str> = graph.edges().iter().map(|edge| edge.id.as_str()).collect();
        assert_eq!(flows, ["Flow_3", "Flow_5"]);

        // Start event box is 36x36 at (100, 100), task box is 100x80 at (300, 100)
        let connector = &rendering.layout.connectors[0];
        assert_eq!(connector.waypoints, [Point::new(136.0, 118.0), Point::new(300.0, 140.0)]);
    }

    #[test]
    fn test_branch_fans_out_between_split_and_join() {
        let tree = Pst::Branch {
            kind: GatewayKind::Parallel,
            label: None,
            children: vec![task("a"), task("b"), task("c")],
        };
        let rendering = render(&tree).unwrap();
        let graph = &rendering.graph;
        let split = graph.lookup("Split_1").unwrap();
        let join = graph.nodes().find(|(_, node)| node.name.as_deref() == Some("Join")).unwrap().0;

        assert_eq!(graph.node(split).name.as_deref(), Some("AND"));
        assert_eq!(graph.kind_of(join), NodeKind::Gateway(GatewayKind::Parallel));
        assert_eq!(graph.out_degree(split), 3);
        assert_eq!(graph.in_degree(join), 3);

        let ys: Vec<f64> = graph
            .successors(split)
            .iter()
            .map(|&id| rendering.layout.bounds(id).unwrap().y)
            .collect();
        assert_eq!(ys, [-100.0, 100.0, 300.0]);
        assert_eq!(rendering.layout.bounds(join).unwrap().x, 600.0);
        assert_eq!(rendering.layout.connectors.len(), 6);
    }

    #[test]
    fn test_loop_adds_back_edge() {
        let tree = Pst::Loop {
            condition: Box::new(task("check")),
            body: Box::new(task("fix")),
        };
        let rendering = render(&tree).unwrap();
        let graph = &rendering.graph;
        let check = graph.lookup("Task_1").unwrap();
        let fix = graph.lookup("Task_2").unwrap();
        assert_eq!(graph.successors(check), [fix]);
        assert_eq!(graph.successors(fix), [check]);
        assert_eq!(
            rendering.layout.bounds(fix),
            Some(&Bounds { x: 300.0, y: 200.0, width: 100.0, height: 80.0 })
        );
    }

    #[test]
    fn test_loopback_reconnects_to_placed_leaf() {
        let tree = Pst::Sequence(vec![task("a"), task("b"), Pst::Loopback("a".into())]);
        let rendering = render(&tree).unwrap();
        let graph = &rendering.graph;
        assert_eq!(graph.len(), 2);
        let a = graph.lookup("Task_1").unwrap();
        let b = graph.lookup("Task_2").unwrap();
        assert_eq!(graph.successors(b), [a]);
    }

    #[test]
    fn test_unresolved_loopback_becomes_task() {
        let tree = Pst::Sequence(vec![task("a"), Pst::Loopback("Gateway_9".into())]);
        let rendering = render(&tree).unwrap();
        assert_eq!(rendering.graph.len(), 2);
        assert_eq!(rendering.graph.edges().len(), 1);
    }

    #[test]
    fn test_event_roles_and_default_names() {
        assert_eq!(event_role("StartEvent_1|Begin"), EventRole::Start);
        assert_eq!(event_role("Order END"), EventRole::End);
        assert_eq!(event_role("Timer"), EventRole::Intermediate);

        let rendering = render(&Pst::Sequence(vec![task(""), Pst::Null])).unwrap();
        let names: Vec<_> = rendering.graph.nodes().map(|(_, n)| n.name.clone().unwrap()).collect();
        assert_eq!(names, ["Task", "None"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut tree = task("a");
        for _ in 0..5 {
            tree = Pst::Sequence(vec![tree, task("b")]);
        }
        let config = LayoutConfig { max_depth: 3, ..Default::default() };
        assert!(matches!(render_with(&tree, &config), Err(Error::NestingTooDeep(3))));
    }
}
