//! Document types shared by hosts, the matcher and the scheduler

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Handle to a node in a host document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position inside a text node (byte offset into the node text)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPoint {
    pub node: NodeId,
    pub offset: usize,
}

/// A contiguous run of characters in the live document
///
/// Transient: valid only until the document is next mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: TextPoint,
    pub end: TextPoint,
}

impl TextRange {
    /// Range within a single text node
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self {
            start: TextPoint { node, offset: start },
            end: TextPoint { node, offset: end },
        }
    }

    /// Whether both endpoints sit in the same text node
    pub fn is_single_node(&self) -> bool {
        self.start.node == self.end.node
    }
}

/// Identifier of a marker inserted by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visible wrapper materialized around a matched range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Marker {
    pub id: MarkerId,
    /// Text covered by the marker
    pub text: String,
}

/// What to bring into view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTarget {
    Marker(MarkerId),
    Node(NodeId),
}

/// Search facilities a host document offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Built-in find that can select text spanning several nodes
    pub native_search: bool,
    /// Enumeration of text nodes in document order
    pub text_walk: bool,
}

impl Capabilities {
    pub const FULL: Self = Self {
        native_search: true,
        text_walk: true,
    };

    pub const TEXT_WALK_ONLY: Self = Self {
        native_search: false,
        text_walk: true,
    };

    pub const NONE: Self = Self {
        native_search: false,
        text_walk: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// Options for the host's built-in find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub case_sensitive: bool,
    pub backwards: bool,
    /// Continue from the top once the end of the document is reached
    pub wrap_around: bool,
    pub whole_word: bool,
    /// Include nested browsing contexts (frames)
    pub search_frames: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            backwards: false,
            wrap_around: true,
            whole_word: false,
            search_frames: true,
        }
    }
}

/// Subscription to document mutations
///
/// Backed by a generation counter, so any number of mutations between two
/// waits collapse into a single wake-up.
#[derive(Debug)]
pub struct MutationFeed {
    receiver: watch::Receiver<u64>,
}

impl MutationFeed {
    pub fn new(mut receiver: watch::Receiver<u64>) -> Self {
        receiver.borrow_and_update();
        Self { receiver }
    }

    /// Wait until the document has changed since the last call
    ///
    /// Returns `false` once the document can no longer report mutations.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Number of mutations the document has reported so far
    pub fn generation(&self) -> u64 {
        *self.receiver.borrow()
    }
}
