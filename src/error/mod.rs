//! This module defines the error type for this program.

use thiserror::Error;

use crate::pst::notation::NotationError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported file extension. Supported file extensions are: .bpmn, .xml for structuring and .txt, .pst for rendering")]
    UnsupportedFileExt,
    #[error("Error opening file: {0}")]
    IO(#[from] std::io::Error),
    #[error("Error parsing XML: {0}")]
    Parse(#[from] quick_xml::de::DeError),
    #[error("Error parsing tree notation: {0}")]
    Notation(#[from] NotationError),
    #[error("Error reading config: {0}")]
    Config(#[from] serde_json::Error),
    /// Two elements of the same document share an id
    #[error("Duplicate element id '{0}'")]
    DuplicateElement(String),
    /// A sequence flow names an element that does not exist
    #[error("Sequence flow '{flow}' references unknown element '{element}'")]
    DanglingReference { flow: String, element: String },
    /// A flow node kind we cannot structure, e.g. an inclusive gateway
    #[error("Element '{id}' has unsupported type '{element_type}'")]
    UnsupportedElement { id: String, element_type: &'static str },
    #[error("The flow graph contains no nodes")]
    EmptyGraph,
    #[error("Nesting deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("Structuring visited more than {0} nodes")]
    WorkBudgetExceeded(usize),
}
