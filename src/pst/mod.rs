//! This module defines the Process Structure Tree (PST), a block-structured view of a process:
//! sequences, exclusive/parallel branches and loops over task and event leaves.
//!
//! Trees are produced from flow graphs by [`FlowGraph::structure`](crate::FlowGraph::structure),
//! rendered back into flow graphs by [`render`](crate::render), and read from or written
//! to a parenthesised text notation by the [`notation`] module.

pub mod notation;
mod structure;

pub use structure::StructureOptions;

use crate::flow_graph::GatewayKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pst {
    Task(String),
    Event(String),
    /// An empty branch or loop part
    Null,
    /// Children run one after another
    Sequence(Vec<Pst>),
    /// One (exclusive) or all (parallel) children run
    Branch {
        kind: GatewayKind,
        label: Option<String>,
        children: Vec<Pst>,
    },
    /// The condition runs, then the body, and control returns to the condition
    Loop { condition: Box<Pst>, body: Box<Pst> },
    /// Control returns to an already modelled node with this label
    Loopback(String),
}

impl Pst {
    /// Wrap accumulated nodes: nothing becomes `Null`, a single node stays as it is
    pub fn sequence(mut children: Vec<Pst>) -> Pst {
        match children.len() {
            0 => Pst::Null,
            1 => children.remove(0),
            _ => Pst::Sequence(children),
        }
    }

    /// Direct children in order. A loop yields its condition, then its body.
    pub fn children(&self) -> Vec<&Pst> {
        match self {
            Pst::Sequence(children) | Pst::Branch { children, .. } => children.iter().collect(),
            Pst::Loop { condition, body } => vec![condition.as_ref(), body.as_ref()],
            Pst::Task(_) | Pst::Event(_) | Pst::Null | Pst::Loopback(_) => Vec::new(),
        }
    }

    /// Labels of all task and event leaves, depth first
    pub fn leaf_labels(&self) -> Vec<&str> {
        let mut labels = Vec::new();
        self.collect_leaf_labels(&mut labels);
        labels
    }

    fn collect_leaf_labels<'a>(&'a self, labels: &mut Vec<&'a str>) {
        match self {
            Pst::Task(label) | Pst::Event(label) => labels.push(label),
            _ => {
                for child in self.children() {
                    child.collect_leaf_labels(labels);
                }
            }
        }
    }
}
