//! This module defines the data structures for BPMN diagrams, provides a parser for BPMN 2.0 XML files
//! and a writer which turns a rendered flow graph back into a BPMN 2.0 document with diagram information.

mod export;
mod parse;

pub use export::Definitions;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::Error;

/// Supported BPMN element types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Task,
    StartEvent,
    EndEvent,
    IntermediateEvent,
    ParallelGateway,
    ExclusiveGateway,
    /// Flow nodes we recognise but cannot structure. They are rejected when building the flow graph.
    Unsupported(&'static str),
}

/// A sequence flow connects a source element to a target element
#[derive(Debug, Clone)]
pub struct SequenceFlow {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
}

/// A BPMN element has a unique ID, an optional name and a type
#[derive(Debug, Clone)]
pub struct BpmnElement {
    pub id: String,
    pub name: Option<String>,
    pub element_type: ElementType,
}

/// A BPMN diagram consists of a unique ID, a list of elements and the sequence flows between them
#[derive(Debug, Clone)]
pub struct Bpmn {
    pub id: String,
    pub elements: Vec<BpmnElement>,
    pub sequence_flows: Vec<SequenceFlow>,
}

impl Bpmn {
    /// Parse a BPMN 2.0 document from a string
    pub fn from_xml(xml: &str) -> Result<Self, Error> {
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Open and parse a BPMN 2.0 file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path).map(BufReader::new)?;
        Ok(crate::parse_xml(file)?)
    }
}
