//! Text-fragment locator encoding and decoding
//!
//! A locator is the source address with a text directive appended to its
//! fragment:
//!
//! ```text
//! https://ex.com/p#section1&:~:text=hello%20world
//!                  │        │       └── percent-encoded normalized snippet
//!                  │        └────────── text directive (byte-exact)
//!                  └─────────────────── pre-existing fragment, preserved
//! ```

use url::Url;

use crate::snippet::{normalize_snippet, normalize_whitespace};

/// Fragment directive understood by browsers' native text-fragment support
pub const TEXT_DIRECTIVE: &str = ":~:text=";

/// Separator between fragment segments
const SEGMENT_SEPARATOR: char = '&';

/// Encode a snippet into a locator rooted at `base_url`
///
/// Any text directive already present on `base_url` is replaced, other
/// fragment segments are kept in order. Never fails: an address that does not
/// parse is handled by plain concatenation after dropping its fragment.
pub fn encode(base_url: &str, snippet: &str) -> String {
    let payload = encode_payload(&normalize_snippet(snippet));

    match Url::parse(base_url) {
        Ok(mut url) => {
            let kept = strip_text_directives(url.fragment().unwrap_or_default());
            let fragment = if kept.is_empty() {
                format!("{}{}", TEXT_DIRECTIVE, payload)
            } else {
                format!("{}{}{}{}", kept, SEGMENT_SEPARATOR, TEXT_DIRECTIVE, payload)
            };
            url.set_fragment(Some(&fragment));
            url.into()
        }
        Err(e) => {
            tracing::debug!(base = %base_url, error = %e, "Base address did not parse, concatenating locator");
            let base = base_url.split('#').next().unwrap_or_default();
            format!("{}#{}{}", base, TEXT_DIRECTIVE, payload)
        }
    }
}

/// Recover the snippet carried by a locator
///
/// Returns `None` when the locator has no text directive or its payload is
/// empty or not valid percent-encoded UTF-8.
pub fn decode(locator: &str) -> Option<String> {
    let start = locator.find(TEXT_DIRECTIVE)? + TEXT_DIRECTIVE.len();
    let raw = locator[start..]
        .split(SEGMENT_SEPARATOR)
        .next()
        .unwrap_or_default()
        .replace('+', " ");

    // text=[prefix-,]start[,end][,-suffix]: keep textStart
    let text_start = raw
        .split(',')
        .find(|piece| !piece.is_empty() && !piece.starts_with('-') && !piece.ends_with('-'))
        .unwrap_or(raw.as_str())
        .trim_matches(|c: char| c == '-' || c.is_whitespace());

    if text_start.is_empty() {
        return None;
    }

    match urlencoding::decode(text_start) {
        Ok(decoded) => {
            let snippet = normalize_whitespace(&decoded);
            (!snippet.is_empty()).then_some(snippet)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Text directive payload is not valid UTF-8");
            None
        }
    }
}

/// Remove every text directive from a fragment, keeping other segments
pub(crate) fn strip_text_directives(fragment: &str) -> String {
    let mut in_directive = false;
    let mut kept = Vec::new();

    for segment in fragment.split(SEGMENT_SEPARATOR) {
        if let Some(idx) = segment.find("~:text=") {
            in_directive = true;
            let cut = if segment[..idx].ends_with(':') { idx - 1 } else { idx };
            let prefix = &segment[..cut];
            if !prefix.is_empty() {
                kept.push(prefix);
            }
            continue;
        }
        // Additional text directives chained after the first one
        if in_directive && segment.starts_with("text=") {
            continue;
        }
        if !segment.is_empty() {
            kept.push(segment);
        }
    }

    kept.join("&")
}

/// Percent-encode a normalized snippet for the directive payload
///
/// `-` is escaped as well so a literal hyphen is never read back as a
/// prefix/suffix delimiter.
fn encode_payload(snippet: &str) -> String {
    urlencoding::encode(snippet).replace('-', "%2D")
}
