//! Anchoring module
//!
//! Re-anchors a captured snippet in a document that may still be rendering:
//! waits for first paint, retries on an interval and on document mutations,
//! and stops at the first marker, on cancellation, or after a bounded number
//! of attempts.
//!
//! Two entry points cover how a snippet reaches a page:
//! - [`start_pending`]: a record left in the relay by a note's "open" action
//! - [`start_from_locator`]: a text directive carried in the page address

mod options;
mod scheduler;
mod session;

use std::sync::Arc;

pub use options::{
    AnchorOptions, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL,
};
pub use scheduler::{anchor, AnchorHandle, AnchorOutcome, SharedDocument};
pub use session::AnchoringSession;

use crate::document::HostDocument;
use crate::locator;
use crate::relay::PendingRelay;
use crate::snippet::Snippet;

/// Anchor the snippet waiting in the relay, if any
///
/// The relay record is consumed here; a page load only ever sees it once.
pub fn start_pending<D>(
    document: SharedDocument<D>,
    relay: &dyn PendingRelay,
    options: AnchorOptions,
) -> Option<AnchorHandle>
where
    D: HostDocument + Send + 'static,
{
    let session = AnchoringSession::from_relay(relay)?;
    tracing::debug!(session_id = %session.id(), "Anchoring pending highlight");
    Some(anchor(document, Arc::new(session), options))
}

/// Anchor the snippet named by a locator's text directive
///
/// Text recovered from a locator has been normalized, so the case-insensitive
/// stage is enabled for this path.
pub fn start_from_locator<D>(
    document: SharedDocument<D>,
    locator: &str,
    options: AnchorOptions,
) -> Option<AnchorHandle>
where
    D: HostDocument + Send + 'static,
{
    let text = locator::decode(locator)?;
    let snippet = Snippet::new(text)?;
    let session = Arc::new(AnchoringSession::new(snippet));
    tracing::debug!(session_id = %session.id(), "Anchoring locator text");
    Some(anchor(
        document,
        session,
        options.with_case_insensitive_fallback(true),
    ))
}
