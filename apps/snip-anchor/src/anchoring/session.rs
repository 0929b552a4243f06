//! Anchoring session state
//!
//! One session per attempt sequence for a snippet. The session is the single
//! source of truth for "has this anchoring finished": termination is a
//! compare-exchange, so whichever trigger wins does so exactly once.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::relay::{PendingHighlight, PendingRelay};
use crate::snippet::Snippet;

/// Ephemeral state for anchoring one snippet
#[derive(Debug)]
pub struct AnchoringSession {
    id: Uuid,
    snippet: Snippet,
    attempts: AtomicU32,
    started: AtomicBool,
    cancelled: AtomicBool,
    terminated: AtomicBool,
    cancel_signal: Notify,
    /// Relay record this session was started from, until termination
    pending: Mutex<Option<PendingHighlight>>,
}

impl AnchoringSession {
    /// Create a session for a snippet
    pub fn new(snippet: Snippet) -> Self {
        Self {
            id: Uuid::new_v4(),
            snippet,
            attempts: AtomicU32::new(0),
            started: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            cancel_signal: Notify::new(),
            pending: Mutex::new(None),
        }
    }

    /// Create a session from the pending relay, consuming its record
    ///
    /// Returns `None` when nothing is pending or the record is blank.
    pub fn from_relay(relay: &dyn PendingRelay) -> Option<Self> {
        let record = relay.take()?;
        let Some(snippet) = Snippet::new(record.highlight_text.clone()) else {
            tracing::debug!("Ignoring blank pending highlight");
            return None;
        };
        let session = Self::new(snippet);
        *session.pending.lock() = Some(record);
        Some(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snippet(&self) -> &Snippet {
        &self.snippet
    }

    /// Matcher invocations so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Pending relay record still held by the session
    pub fn pending(&self) -> Option<PendingHighlight> {
        self.pending.lock().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Stop the session; no attempt that has not started yet will run
    ///
    /// Safe to call at any time, any number of times.
    pub fn cancel(&self) {
        if self.is_terminated() {
            return;
        }
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!(session_id = %self.id, "Anchoring cancelled");
            self.cancel_signal.notify_one();
        }
    }

    /// Claim the session for a scheduler run; false if already claimed
    pub(crate) fn begin(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark the session finished and drop its pending record
    ///
    /// Returns true only for the call that actually terminated it.
    pub(crate) fn terminate(&self) -> bool {
        let won = self
            .terminated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.pending.lock().take();
        }
        won
    }

    /// Resolves once `cancel` has been called
    pub(crate) async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.cancel_signal.notified().await;
    }
}
