//! Captured snippet text and whitespace normalization
//!
//! Snippets are compared with whitespace runs collapsed, so a quote captured
//! across a line break still names the same text as the single-line version.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on snippet length (in characters) carried inside a locator
pub const MAX_SNIPPET_CHARS: usize = 240;

/// Collapse every whitespace run to a single space and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize and bound a snippet for use in a locator
///
/// Truncation happens after normalization and on character boundaries.
pub fn normalize_snippet(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= MAX_SNIPPET_CHARS {
        return normalized;
    }
    let truncated: String = normalized.chars().take(MAX_SNIPPET_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Whether two texts name the same quote, ignoring whitespace runs and case
///
/// Used to recognize an existing marker whichever matching stage created it.
pub fn same_quote(a: &str, b: &str) -> bool {
    normalize_whitespace(a).to_lowercase() == normalize_whitespace(b).to_lowercase()
}

/// Find `needle` in `haystack` at or after byte `from`, ignoring case
///
/// Returns the byte range of the match in `haystack`. Case folding can change
/// byte lengths, so the comparison walks characters instead of lowercasing
/// both strings up front.
pub fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<(usize, usize)> {
    if needle.is_empty() || from > haystack.len() || !haystack.is_char_boundary(from) {
        return None;
    }

    'outer: for (offset, _) in haystack[from..].char_indices() {
        let start = from + offset;
        let mut candidates = haystack[start..].char_indices();
        let mut end = start;
        for wanted in needle.chars() {
            match candidates.next() {
                Some((i, found)) if chars_eq_ignore_case(found, wanted) => {
                    end = start + i + found.len_utf8();
                }
                _ => continue 'outer,
            }
        }
        return Some((start, end));
    }
    None
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Immutable, non-empty captured text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Snippet(String);

impl Snippet {
    /// Wrap captured text, rejecting text that is blank
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    /// The literal text as captured
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whitespace-collapsed form used for equivalence checks
    pub fn normalized(&self) -> String {
        normalize_whitespace(&self.0)
    }

    /// Whether `other` names the same text once whitespace runs are collapsed
    pub fn matches_normalized(&self, other: &str) -> bool {
        self.normalized() == normalize_whitespace(other)
    }
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Snippet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Snippet::new(value).ok_or_else(|| "snippet must not be empty".to_string())
    }
}

impl From<Snippet> for String {
    fn from(snippet: Snippet) -> Self {
        snippet.0
    }
}

impl AsRef<str> for Snippet {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
