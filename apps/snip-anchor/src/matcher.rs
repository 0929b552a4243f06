//! Document text matcher
//!
//! One matching attempt against the current state of a document. Stages run
//! in a fixed order and the first one that produces a marker wins:
//!
//! 1. Native search: the host's built-in find (can span nodes)
//! 2. Exact walk: literal substring search in each text node
//! 3. Case-insensitive walk, only when enabled
//!
//! Matches that only exist once whitespace is collapsed are reported in the
//! trace log and left alone: offsets in collapsed text do not map back onto
//! the original node reliably, so such hits are never wrapped.

use crate::document::{FindOptions, HostDocument, Marker, NodeId, TextRange};
use crate::snippet::{find_ignore_case, normalize_whitespace, Snippet};

/// Matcher behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Run a case-insensitive walk after the exact stages fail
    pub case_insensitive: bool,
}

/// Stage that produced (or failed to produce) a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    NativeSearch,
    ExactWalk,
    CaseInsensitiveWalk,
}

/// Find the first occurrence of `snippet` and wrap it in a marker
pub fn find_and_mark<D>(doc: &mut D, snippet: &Snippet) -> Option<Marker>
where
    D: HostDocument + ?Sized,
{
    find_and_mark_with(doc, snippet, &MatchOptions::default())
}

/// [`find_and_mark`] with explicit options
pub fn find_and_mark_with<D>(doc: &mut D, snippet: &Snippet, options: &MatchOptions) -> Option<Marker>
where
    D: HostDocument + ?Sized,
{
    let capabilities = doc.capabilities();
    let needle = snippet.as_str();

    let nodes = if capabilities.text_walk {
        let nodes = doc.text_nodes();
        if nodes.is_empty() {
            tracing::trace!("Document has no text nodes");
            return None;
        }
        nodes
    } else {
        Vec::new()
    };

    if capabilities.native_search {
        if let Some(marker) = native_search(doc, needle) {
            log_match(MatchStage::NativeSearch, &marker);
            return Some(marker);
        }
    }

    if !capabilities.text_walk {
        return None;
    }

    if let Some(marker) = walk(doc, &nodes, needle, MatchStage::ExactWalk) {
        log_match(MatchStage::ExactWalk, &marker);
        return Some(marker);
    }

    if options.case_insensitive {
        if let Some(marker) = walk(doc, &nodes, needle, MatchStage::CaseInsensitiveWalk) {
            log_match(MatchStage::CaseInsensitiveWalk, &marker);
            return Some(marker);
        }
    }

    None
}

fn native_search<D>(doc: &mut D, needle: &str) -> Option<Marker>
where
    D: HostDocument + ?Sized,
{
    if !doc.find_and_select(needle, &FindOptions::default()) {
        return None;
    }
    match doc.surround_selection(needle) {
        Ok(marker) => Some(marker),
        Err(e) => {
            tracing::debug!(error = %e, "Native selection could not be wrapped");
            None
        }
    }
}

fn walk<D>(doc: &mut D, nodes: &[NodeId], needle: &str, stage: MatchStage) -> Option<Marker>
where
    D: HostDocument + ?Sized,
{
    let collapsed_needle = normalize_whitespace(needle);

    for &node in nodes {
        let Some(text) = doc.node_text(node) else {
            continue;
        };

        let found = match stage {
            MatchStage::CaseInsensitiveWalk => find_ignore_case(text, needle, 0),
            _ => text.find(needle).map(|start| (start, start + needle.len())),
        };

        let Some((start, end)) = found else {
            if stage == MatchStage::ExactWalk
                && normalize_whitespace(text).contains(collapsed_needle.as_str())
            {
                tracing::trace!(node = %node, "Skipping whitespace-collapsed match");
            }
            continue;
        };

        match doc.surround_range(&TextRange::within(node, start, end), needle) {
            Ok(marker) => return Some(marker),
            Err(e) => {
                tracing::debug!(node = %node, error = %e, ?stage, "Candidate could not be wrapped");
            }
        }
    }

    None
}

fn log_match(stage: MatchStage, marker: &Marker) {
    tracing::debug!(?stage, marker_id = %marker.id, "Snippet matched");
}
