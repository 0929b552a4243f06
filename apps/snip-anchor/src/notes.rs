//! Note capture and reopen
//!
//! The anchoring core only ever sees a note as `{ snippet, sourceLocator }`.
//! Storage, grouping and comments belong to the note store, not here.

use serde::{Deserialize, Serialize};

use crate::locator;
use crate::relay::{PendingHighlight, PendingRelay, RelayError};
use crate::snippet::{normalize_whitespace, Snippet};

/// A captured quote and the locator pointing back at it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub snippet: Snippet,
    pub source_locator: String,
}

impl Note {
    /// Capture a selection made on `page_url`
    ///
    /// The selection is whitespace-collapsed before storing. Returns `None`
    /// for a selection that is blank.
    pub fn capture(page_url: &str, selection: &str) -> Option<Self> {
        let snippet = Snippet::new(normalize_whitespace(selection))?;
        let source_locator = locator::encode(page_url, snippet.as_str());
        tracing::debug!(locator = %source_locator, "Captured note");
        Some(Self {
            snippet,
            source_locator,
        })
    }

    /// Shareable link for the note
    ///
    /// Re-encodes the snippet onto the stored locator, replacing whatever text
    /// directive it already carries, so repeated calls give the same link.
    pub fn link(&self) -> String {
        locator::encode(&self.source_locator, self.snippet.as_str())
    }

    /// Prepare navigation to the note's source
    ///
    /// Leaves the snippet in the relay for the next page load and returns the
    /// address to navigate to.
    pub fn open(&self, relay: &dyn PendingRelay) -> Result<String, RelayError> {
        relay.put(PendingHighlight::new(self.snippet.as_str()))?;
        Ok(self.link())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::MemoryRelay;

    #[test]
    fn test_capture_normalizes_selection() {
        let note = Note::capture("https://ex.com/p", "  hello \n\t world ").unwrap();
        assert_eq!(note.snippet.as_str(), "hello world");
        assert_eq!(note.source_locator, "https://ex.com/p#:~:text=hello%20world");
    }

    #[test]
    fn test_capture_rejects_blank_selection() {
        assert!(Note::capture("https://ex.com/p", "").is_none());
        assert!(Note::capture("https://ex.com/p", " \n ").is_none());
    }

    #[test]
    fn test_link_is_idempotent() {
        let note = Note::capture("https://ex.com/p#section1", "hello world").unwrap();
        assert_eq!(note.link(), note.source_locator);
        assert_eq!(
            note.link(),
            "https://ex.com/p#section1&:~:text=hello%20world"
        );
    }

    #[test]
    fn test_open_writes_pending_record() {
        let relay = MemoryRelay::new();
        let note = Note::capture("https://ex.com/p", "some quote").unwrap();

        let target = note.open(&relay).unwrap();
        assert_eq!(target, note.link());
        assert_eq!(relay.take(), Some(PendingHighlight::new("some quote")));
    }

    #[test]
    fn test_serde_shape() {
        let note = Note::capture("https://ex.com/p", "quote").unwrap();
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["snippet"], "quote");
        assert_eq!(json["sourceLocator"], "https://ex.com/p#:~:text=quote");

        let parsed: Note = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, note);

        let blank = serde_json::json!({ "snippet": "  ", "sourceLocator": "https://ex.com" });
        assert!(serde_json::from_value::<Note>(blank).is_err());
    }
}
