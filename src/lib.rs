pub mod error;
pub mod bpmn;
pub mod config;
pub mod flow_graph;
pub mod pst;
pub mod render;

pub use quick_xml::de::from_reader as parse_xml;

pub use error::*;
pub use crate::bpmn::{Bpmn, Definitions};
pub use crate::config::Config;
pub use crate::flow_graph::{FlowGraph, GatewayKind, NodeId, NodeKind};
pub use crate::pst::notation::parse_pst;
pub use crate::pst::Pst;
pub use crate::render::{render, render_with, Layout, LayoutConfig, Rendering};

use std::path::Path;

/// Load a BPMN file and recover its process structure tree
pub fn structure_file(path: impl AsRef<Path>, config: &Config) -> Result<Pst, Error> {
    let graph = FlowGraph::try_from(Bpmn::load(path)?)?;
    graph.structure_with(config.structure)
}

/// Parse a tree in text notation and render it as a BPMN document
pub fn render_text(text: &str, config: &Config) -> Result<Definitions, Error> {
    let tree = pst::notation::parse_pst_with_depth(text, config.layout.max_depth)?;
    let rendering = render_with(&tree, &config.layout)?;
    Ok(Definitions::from(&rendering))
}
