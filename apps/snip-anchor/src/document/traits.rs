//! Host document trait
//!
//! The seam between the anchoring engine and whatever renders the page. A host
//! advertises its [`Capabilities`]; the matcher only uses what is offered.

use super::error::{ObserverError, WrapError};
use super::types::{Capabilities, FindOptions, Marker, MutationFeed, NodeId, ScrollTarget, TextRange};

/// A live, mutable document whose text is split across a tree of nodes
pub trait HostDocument {
    /// Search facilities available in this host
    fn capabilities(&self) -> Capabilities;

    /// Built-in find: select the next occurrence of `needle`
    ///
    /// Returns whether a selection was made. Hosts without native search keep
    /// the default.
    fn find_and_select(&mut self, _needle: &str, _options: &FindOptions) -> bool {
        false
    }

    /// Wrap the current selection in a marker labelled `label`
    fn surround_selection(&mut self, _label: &str) -> Result<Marker, WrapError> {
        Err(WrapError::NoSelection)
    }

    /// Text nodes in document order
    fn text_nodes(&self) -> Vec<NodeId>;

    /// Raw text of a text node
    fn node_text(&self, node: NodeId) -> Option<&str>;

    /// Wrap `range` in a marker labelled `label`
    fn surround_range(&mut self, range: &TextRange, label: &str) -> Result<Marker, WrapError>;

    /// Live marker previously created for `label`, if any
    fn marker_for(&self, label: &str) -> Option<Marker>;

    /// Bring a marker or node into view
    fn scroll_into_view(&mut self, target: ScrollTarget);

    /// Subscribe to structural mutations
    fn subscribe_mutations(&self) -> Result<MutationFeed, ObserverError>;
}
