//! Snip Anchor
//!
//! Captures text snippets as portable text-fragment locators and re-anchors
//! them in documents that are still loading.
//!
//! - [`locator`]: encode a snippet into a page address and decode it back
//! - [`matcher`]: one attempt to find a snippet and wrap it in a marker
//! - [`anchoring`]: bounded, cancellable retries driven by time and mutations
//! - [`document`]: the host document abstraction and an XHTML implementation
//! - [`relay`]: the one-slot channel carrying a snippet across navigation
//! - [`notes`]: capture and reopen of `{ snippet, sourceLocator }` notes

pub mod anchoring;
pub mod document;
pub mod locator;
pub mod matcher;
pub mod notes;
pub mod relay;
pub mod snippet;
