//! This module defines the flow graph: the typed nodes of a process (tasks, events, gateways),
//! the sequence edges between them, and the adjacency derived from those edges.
//!
//! A flow graph is assembled once through a [`FlowGraphBuilder`] and is read-only afterwards.

mod reachability;

pub use reachability::Reach;

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::bpmn::{Bpmn, ElementType};
use crate::Error;

/// An index of a node in a flow graph.
/// This is a newtype around `usize` so it can't be confused with positions in other lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in [`FlowGraph::nodes`]
    pub fn index(self) -> usize {
        self.0
    }
}

/// NodeIds are displayed as N followed by the index, e.g. N0, N1, N2, ...
impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "N{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventRole {
    Start,
    End,
    Intermediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayKind {
    /// Exactly one outgoing branch is taken
    Exclusive,
    /// All outgoing branches are taken
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Task,
    Event(EventRole),
    Gateway(GatewayKind),
}

/// A node has a unique ID, a kind and an optional display name
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: Option<String>,
}

/// A sequence edge from one node to another.
/// Several edges between the same pair of nodes are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone)]
pub struct FlowGraph {
    id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, NodeId, ahash::RandomState>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
}

impl FlowGraph {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Find a node by its document id
    pub fn lookup(&self, id: &str) -> Option<NodeId> {
        self.index.get(id).copied()
    }

    /// Successors of a node in edge insertion order
    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.successors[id.0]
    }

    /// Predecessors of a node in edge insertion order
    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.predecessors[id.0]
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.predecessors[id.0].len()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.successors[id.0].len()
    }

    pub fn kind_of(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn label_of(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].name.as_deref()
    }

    /// The label used for tree leaves: `id|name`, or just `id` for unnamed nodes
    pub fn qualified_label(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        match &node.name {
            Some(name) => format!("{}|{}", node.id, name),
            None => node.id.clone(),
        }
    }

    /// Pick the node where structuring begins.
    /// In order of preference: a start event without predecessors, any start event,
    /// any node without predecessors, the first node.
    pub fn start_node(&self) -> Option<NodeId> {
        let is_start = |id: &NodeId| self.kind_of(*id) == NodeKind::Event(EventRole::Start);
        let ids = || (0..self.nodes.len()).map(NodeId);
        ids()
            .find(|id| is_start(id) && self.in_degree(*id) == 0)
            .or_else(|| ids().find(is_start))
            .or_else(|| ids().find(|id| self.in_degree(*id) == 0))
            .or_else(|| ids().next())
    }
}

/// Collects nodes and edges, then derives the adjacency lists once in [`FlowGraphBuilder::build`]
#[derive(Debug, Default)]
pub struct FlowGraphBuilder {
    id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, NodeId, ahash::RandomState>,
}

impl FlowGraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Add a node, rejecting ids that are already taken
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: NodeKind,
        name: Option<String>,
    ) -> Result<NodeId, Error> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateElement(id));
        }
        let node_id = NodeId(self.nodes.len());
        self.index.insert(id.clone(), node_id);
        self.nodes.push(Node { id, kind, name });
        Ok(node_id)
    }

    /// Add an edge between two nodes referenced by their document ids
    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        source: &str,
        target: &str,
    ) -> Result<(), Error> {
        let id = id.into();
        let resolve = |element: &str| {
            self.index.get(element).copied().ok_or_else(|| Error::DanglingReference {
                flow: id.clone(),
                element: element.to_string(),
            })
        };
        let source = resolve(source)?;
        let target = resolve(target)?;
        self.edges.push(Edge { id, source, target });
        Ok(())
    }

    /// Add an edge between two nodes that were added to this builder
    pub fn connect(&mut self, id: impl Into<String>, source: NodeId, target: NodeId) {
        self.edges.push(Edge {
            id: id.into(),
            source,
            target,
        });
    }

    pub fn build(self) -> FlowGraph {
        let mut successors = vec![Vec::new(); self.nodes.len()];
        let mut predecessors = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            successors[edge.source.0].push(edge.target);
            predecessors[edge.target.0].push(edge.source);
        }
        FlowGraph {
            id: self.id,
            nodes: self.nodes,
            edges: self.edges,
            index: self.index,
            successors,
            predecessors,
        }
    }
}

impl TryFrom<Bpmn> for FlowGraph {
    type Error = Error;

    fn try_from(bpmn: Bpmn) -> Result<Self, Self::Error> {
        let mut builder = FlowGraphBuilder::new(bpmn.id);
        for element in bpmn.elements {
            let kind = match element.element_type {
                ElementType::Task => NodeKind::Task,
                ElementType::StartEvent => NodeKind::Event(EventRole::Start),
                ElementType::EndEvent => NodeKind::Event(EventRole::End),
                ElementType::IntermediateEvent => NodeKind::Event(EventRole::Intermediate),
                ElementType::ExclusiveGateway => NodeKind::Gateway(GatewayKind::Exclusive),
                ElementType::ParallelGateway => NodeKind::Gateway(GatewayKind::Parallel),
                ElementType::Unsupported(element_type) => {
                    return Err(Error::UnsupportedElement {
                        id: element.id,
                        element_type,
                    })
                }
            };
            builder.add_node(element.id, kind, element.name)?;
        }
        for flow in bpmn.sequence_flows {
            builder.add_edge(flow.id, &flow.source_id, &flow.target_id)?;
        }
        let graph = builder.build();
        log::debug!(
            "loaded flow graph '{}' with {} nodes and {} edges",
            graph.id,
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }
}
