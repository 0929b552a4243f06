//! Document error types
//!
//! Failures raised by host documents. None of these are fatal to anchoring:
//! the matcher and scheduler recover from each of them locally.

use thiserror::Error;

/// A candidate range could not be wrapped in a marker
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WrapError {
    /// Nothing is selected in the document
    #[error("No active selection")]
    NoSelection,

    /// Node is unknown to the document or no longer attached
    #[error("Node {0} is detached or unknown")]
    Detached(usize),

    /// Range endpoint is not a text node
    #[error("Node {0} is not a text node")]
    NotText(usize),

    /// Offset is outside the node text or not on a character boundary
    #[error("Offset {offset} is not a valid position in node {node}")]
    InvalidOffset { node: usize, offset: usize },

    /// Range is empty or its end precedes its start
    #[error("Range is empty")]
    EmptyRange,

    /// Range partially selects an element
    #[error("Range crosses an element boundary")]
    CrossesElementBoundary,

    /// Ancestor cannot hold a marker element
    #[error("Cannot split content of <{0}>")]
    Unsplittable(String),

    /// Range is inside, or would enclose, an existing marker
    #[error("Range overlaps marker {0}")]
    OverlapsMarker(u64),
}

/// Mutation notifications cannot be delivered in this context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    #[error("Mutation observer unavailable: {0}")]
    Unavailable(String),
}

/// Failure building or updating a document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Markup could not be tokenized
    #[error("Parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    /// Malformed attribute list
    #[error("Attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Node handle does not name a text node
    #[error("Invalid node: {0}")]
    InvalidNode(usize),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;
