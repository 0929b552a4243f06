//! Locator module
//!
//! Portable, self-describing source locators: the captured page address with
//! a text-fragment directive naming the snippet. Browsers with native
//! text-fragment support highlight the snippet on their own; everything else
//! decodes the directive and anchors it through [`crate::anchoring`].

mod codec;

use std::fmt;

use serde::Serialize;

pub use codec::{decode, encode, TEXT_DIRECTIVE};

/// Parsed view of a locator: where it points and which text it names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocator {
    /// Address with any text directive removed (other fragment content kept)
    pub address: String,
    /// Snippet carried by the text directive, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SourceLocator {
    /// Split a locator into its address and decoded snippet
    pub fn parse(locator: &str) -> Self {
        let text = decode(locator);
        let address = match locator.split_once('#') {
            Some((base, fragment)) => {
                let kept = codec::strip_text_directives(fragment);
                if kept.is_empty() {
                    base.to_string()
                } else {
                    format!("{}#{}", base, kept)
                }
            }
            None => locator.to_string(),
        };
        Self { address, text }
    }

    /// Origin and path without any fragment
    pub fn base_address(&self) -> &str {
        self.address.split('#').next().unwrap_or_default()
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => f.write_str(&encode(&self.address, text)),
            None => f.write_str(&self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locator() {
        let locator = SourceLocator::parse("https://ex.com/p#section1&:~:text=hello%20world");
        assert_eq!(locator.address, "https://ex.com/p#section1");
        assert_eq!(locator.base_address(), "https://ex.com/p");
        assert_eq!(locator.text.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_parse_plain_address() {
        let locator = SourceLocator::parse("https://ex.com/p");
        assert_eq!(locator.address, "https://ex.com/p");
        assert!(locator.text.is_none());
        assert_eq!(locator.to_string(), "https://ex.com/p");
    }

    #[test]
    fn test_display_reencodes() {
        let raw = "https://ex.com/p#section1&:~:text=hello%20world";
        assert_eq!(SourceLocator::parse(raw).to_string(), raw);
    }
}
