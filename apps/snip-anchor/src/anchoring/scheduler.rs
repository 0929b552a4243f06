//! Anchoring scheduler
//!
//! Drives the matcher against a document that may still be loading. Attempts
//! come from two sources, a fixed interval and document mutations, and both
//! go through the same `attempt` entry point inside one task, so attempts are
//! strictly sequential and the first success ends the session.
//!
//! ```text
//! initial delay ──> existing marker? ──> native highlight? ──> attempt loop
//!                        │ yes                 │ yes            ├─ interval tick
//!                        └─> scroll, done      └─> scroll, done ├─ mutation (coalesced)
//!                                                               └─ cancel
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use super::options::AnchorOptions;
use super::session::AnchoringSession;
use crate::document::{HostDocument, Marker, MutationFeed, NodeId, ScrollTarget};
use crate::matcher;
use crate::snippet::Snippet;

const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Document shared between the host and a running scheduler
pub type SharedDocument<D> = Arc<Mutex<D>>;

/// How an anchoring session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// A new marker was created
    Marked(Marker),
    /// A marker for this snippet already existed; it was scrolled into view
    AlreadyMarked(Marker),
    /// The snippet was already present as literal text; it was scrolled into view
    NativeHighlight,
    /// Every attempt failed
    Exhausted { attempts: u32 },
    /// `cancel` was called before a match
    Cancelled,
    /// The session had already been started by another call
    Duplicate,
}

impl AnchorOutcome {
    /// Short name used in logs and API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorOutcome::Marked(_) => "marked",
            AnchorOutcome::AlreadyMarked(_) => "already_marked",
            AnchorOutcome::NativeHighlight => "native_highlight",
            AnchorOutcome::Exhausted { .. } => "exhausted",
            AnchorOutcome::Cancelled => "cancelled",
            AnchorOutcome::Duplicate => "duplicate",
        }
    }
}

/// Handle to a running anchoring session
///
/// Dropping the handle does not stop the session; call [`AnchorHandle::cancel`].
#[derive(Debug)]
pub struct AnchorHandle {
    session: Arc<AnchoringSession>,
    task: Option<JoinHandle<AnchorOutcome>>,
}

impl AnchorHandle {
    pub fn session(&self) -> &Arc<AnchoringSession> {
        &self.session
    }

    /// Stop the session. Safe to call at any time, including after it ended.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the session to end
    pub async fn finished(self) -> AnchorOutcome {
        match self.task {
            Some(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(session_id = %self.session.id(), error = %e, "Anchoring task failed");
                    self.session.terminate();
                    AnchorOutcome::Cancelled
                }
            },
            None => AnchorOutcome::Duplicate,
        }
    }
}

enum Trigger {
    Interval,
    Mutation,
    FeedClosed,
    Cancel,
}

/// Start anchoring `session` against `document`
///
/// Returns immediately; the work runs on a spawned task, so this must be
/// called from within a Tokio runtime. A session can only be started once:
/// later calls return a handle that resolves to [`AnchorOutcome::Duplicate`]
/// without touching the document.
pub fn anchor<D>(
    document: SharedDocument<D>,
    session: Arc<AnchoringSession>,
    options: AnchorOptions,
) -> AnchorHandle
where
    D: HostDocument + Send + 'static,
{
    if !session.begin() {
        tracing::debug!(session_id = %session.id(), "Session already started, ignoring");
        return AnchorHandle {
            session,
            task: None,
        };
    }

    let span = tracing::info_span!("anchor", session_id = %session.id());
    let task = tokio::spawn(run(document, Arc::clone(&session), options).instrument(span));

    AnchorHandle {
        session,
        task: Some(task),
    }
}

async fn run<D>(
    document: SharedDocument<D>,
    session: Arc<AnchoringSession>,
    options: AnchorOptions,
) -> AnchorOutcome
where
    D: HostDocument + Send + 'static,
{
    let outcome = drive(&document, &session, &options).await;
    session.terminate();

    match &outcome {
        AnchorOutcome::Marked(marker) => tracing::info!(
            marker_id = %marker.id,
            attempts = session.attempts(),
            "Snippet anchored"
        ),
        AnchorOutcome::Exhausted { attempts } => {
            tracing::debug!(attempts, "Giving up on snippet")
        }
        other => tracing::debug!(outcome = other.as_str(), "Anchoring finished"),
    }

    outcome
}

async fn drive<D>(
    document: &SharedDocument<D>,
    session: &AnchoringSession,
    options: &AnchorOptions,
) -> AnchorOutcome
where
    D: HostDocument,
{
    tokio::select! {
        biased;
        _ = session.cancelled() => return AnchorOutcome::Cancelled,
        _ = tokio::time::sleep(options.initial_delay) => {}
    }
    if session.is_cancelled() {
        return AnchorOutcome::Cancelled;
    }

    {
        let mut doc = document.lock();

        // Re-running for a snippet that is already marked only scrolls
        if let Some(marker) = doc.marker_for(session.snippet().as_str()) {
            doc.scroll_into_view(ScrollTarget::Marker(marker.id));
            return AnchorOutcome::AlreadyMarked(marker);
        }

        if options.detect_native_highlight {
            if let Some(node) = literal_occurrence(&*doc, session.snippet()) {
                tracing::debug!(node = %node, "Snippet already present, assuming native highlight");
                doc.scroll_into_view(ScrollTarget::Node(node));
                return AnchorOutcome::NativeHighlight;
            }
        }
    }

    if options.max_attempts == 0 {
        return AnchorOutcome::Exhausted { attempts: 0 };
    }

    let subscription = document.lock().subscribe_mutations();
    let mut feed = match subscription {
        Ok(feed) => Some(feed),
        Err(e) => {
            tracing::warn!(error = %e, "Mutation observer unavailable, using interval retries only");
            None
        }
    };

    // A zero period would make `interval` panic
    let period = options.retry_interval.max(MIN_RETRY_INTERVAL);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let trigger = tokio::select! {
            biased;
            _ = session.cancelled() => Trigger::Cancel,
            _ = ticker.tick() => Trigger::Interval,
            alive = next_mutation(&mut feed) => {
                if alive { Trigger::Mutation } else { Trigger::FeedClosed }
            }
        };

        match trigger {
            Trigger::Cancel => return AnchorOutcome::Cancelled,
            Trigger::FeedClosed => {
                tracing::debug!("Mutation feed closed");
                feed = None;
                continue;
            }
            Trigger::Interval | Trigger::Mutation => {}
        }

        let source = if matches!(trigger, Trigger::Mutation) { "mutation" } else { "interval" };
        if let Some(marker) = attempt(document, session, options, source) {
            return AnchorOutcome::Marked(marker);
        }
        if session.is_cancelled() {
            return AnchorOutcome::Cancelled;
        }

        let attempts = session.attempts();
        if attempts >= options.max_attempts {
            return AnchorOutcome::Exhausted { attempts };
        }
    }
}

/// The single entry point for matcher invocations
fn attempt<D>(
    document: &SharedDocument<D>,
    session: &AnchoringSession,
    options: &AnchorOptions,
    source: &'static str,
) -> Option<Marker>
where
    D: HostDocument,
{
    if session.is_cancelled() || session.is_terminated() {
        return None;
    }

    let number = session.record_attempt();
    let mut doc = document.lock();
    let marker =
        matcher::find_and_mark_with(&mut *doc, session.snippet(), &options.match_options());

    match marker {
        Some(marker) => {
            session.terminate();
            doc.scroll_into_view(ScrollTarget::Marker(marker.id));
            Some(marker)
        }
        None => {
            tracing::trace!(attempt = number, source, "No match yet");
            None
        }
    }
}

async fn next_mutation(feed: &mut Option<MutationFeed>) -> bool {
    match feed {
        Some(feed) => feed.changed().await,
        None => std::future::pending().await,
    }
}

/// First text node already containing the literal snippet
fn literal_occurrence<D>(doc: &D, snippet: &Snippet) -> Option<NodeId>
where
    D: HostDocument + ?Sized,
{
    if !doc.capabilities().text_walk {
        return None;
    }
    let needle = snippet.as_str().trim();
    doc.text_nodes()
        .into_iter()
        .find(|node| doc.node_text(*node).is_some_and(|text| text.contains(needle)))
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, Instant};

    use super::*;
    use crate::document::XhtmlDocument;

    fn shared(html: &str) -> SharedDocument<XhtmlDocument> {
        Arc::new(Mutex::new(XhtmlDocument::parse(html).unwrap()))
    }

    fn session(text: &str) -> Arc<AnchoringSession> {
        Arc::new(AnchoringSession::new(Snippet::new(text).unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_snippet_marked_exactly_once() {
        let doc = shared("<body><p>...The <b>quick</b> brown fox jumps...</p></body>");
        let session = session("The quick brown fox");

        let first = anchor(doc.clone(), session.clone(), AnchorOptions::default());
        let second = anchor(doc.clone(), session.clone(), AnchorOptions::default());
        assert!(second.is_finished());
        assert_eq!(second.finished().await, AnchorOutcome::Duplicate);

        let outcome = first.finished().await;
        let AnchorOutcome::Marked(marker) = outcome else {
            panic!("expected a marker, got {:?}", outcome);
        };
        assert_eq!(marker.text, "The quick brown fox");
        assert_eq!(session.attempts(), 1);

        let doc = doc.lock();
        assert_eq!(doc.markers().len(), 1);
        assert_eq!(doc.scrolls(), &[ScrollTarget::Marker(marker.id)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_for_marked_snippet_is_noop() {
        let doc = shared("<body><p>The <b>quick</b> brown fox</p></body>");
        let options = AnchorOptions::default();

        let first = anchor(doc.clone(), session("The quick brown fox"), options)
            .finished()
            .await;
        assert!(matches!(first, AnchorOutcome::Marked(_)));

        let rerun = session("The quick brown fox");
        let second = anchor(doc.clone(), rerun.clone(), options).finished().await;
        assert!(matches!(second, AnchorOutcome::AlreadyMarked(_)));
        assert_eq!(rerun.attempts(), 0);
        assert_eq!(doc.lock().markers().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_literal_counts_as_native_highlight() {
        let doc = shared("<body><p>Intro</p><p>...The quick brown fox jumps...</p></body>");
        let session = session("The quick brown fox");

        let outcome = anchor(doc.clone(), session.clone(), AnchorOptions::default())
            .finished()
            .await;

        assert_eq!(outcome, AnchorOutcome::NativeHighlight);
        assert_eq!(session.attempts(), 0);
        let doc = doc.lock();
        assert!(doc.markers().is_empty());
        let node = doc.text_nodes()[1];
        assert_eq!(doc.scrolls(), &[ScrollTarget::Node(node)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_detection_can_be_disabled() {
        let doc = shared("<body><p>...The quick brown fox jumps...</p></body>");
        let options = AnchorOptions::default().with_native_detection(false);

        let outcome = anchor(doc.clone(), session("The quick brown fox"), options)
            .finished()
            .await;

        assert!(matches!(outcome, AnchorOutcome::Marked(ref m) if m.text == "The quick brown fox"));
        assert_eq!(doc.lock().markers().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let doc = shared("<body><p>nothing relevant</p></body>");
        let session = session("absent text");
        let start = Instant::now();

        let outcome = anchor(doc.clone(), session.clone(), AnchorOptions::default())
            .finished()
            .await;

        assert_eq!(outcome, AnchorOutcome::Exhausted { attempts: 10 });
        // 600ms initial delay, then nine 500ms gaps
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5100));
        assert!(elapsed < Duration::from_millis(5200));
        assert!(doc.lock().markers().is_empty());
        assert!(session.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_triggers_extra_attempt() {
        let doc = shared("<body><p>loading</p></body>");
        let session = session("The quick brown fox");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        sleep(Duration::from_millis(700)).await;
        assert_eq!(session.attempts(), 1);
        doc.lock()
            .append_html("<p>The quick brown fox</p>")
            .unwrap();

        let start = Instant::now();
        let outcome = handle.finished().await;
        assert!(matches!(outcome, AnchorOutcome::Marked(_)));
        assert_eq!(session.attempts(), 2);
        // Found on the mutation, not on the next interval tick
        assert!(start.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_burst_is_coalesced() {
        let doc = shared("<body><p>loading</p></body>");
        let session = session("never appears");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        sleep(Duration::from_millis(700)).await;
        {
            let mut doc = doc.lock();
            for i in 0..5 {
                doc.append_html(&format!("<p>chunk {}</p>", i)).unwrap();
            }
        }
        sleep(Duration::from_millis(300)).await;
        assert_eq!(session.attempts(), 2);

        handle.cancel();
        assert_eq!(handle.finished().await, AnchorOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_attempts_count_toward_limit() {
        let doc = shared("<body><p>loading</p></body>");
        let options = AnchorOptions::default().with_max_attempts(3);
        let session = session("never appears");
        let start = Instant::now();
        let handle = anchor(doc.clone(), session.clone(), options);

        sleep(Duration::from_millis(700)).await;
        doc.lock().append_html("<p>more</p>").unwrap();

        assert_eq!(handle.finished().await, AnchorOutcome::Exhausted { attempts: 3 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1100));
        assert!(elapsed < Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_only_without_observer() {
        let doc = Arc::new(Mutex::new(
            XhtmlDocument::parse("<body><p>loading</p></body>")
                .unwrap()
                .without_observer(),
        ));
        let session = session("late text");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        sleep(Duration::from_millis(700)).await;
        doc.lock().append_html("<p>late text</p>").unwrap();

        let outcome = handle.finished().await;
        assert!(matches!(outcome, AnchorOutcome::Marked(_)));
        // Picked up by the 1100ms tick
        assert_eq!(session.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_all_attempts() {
        let doc = shared("<body><p>loading</p></body>");
        let session = session("text");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        handle.cancel();
        handle.cancel();
        assert_eq!(handle.finished().await, AnchorOutcome::Cancelled);
        assert_eq!(session.attempts(), 0);

        // Late content after cancellation is never marked
        doc.lock().append_html("<p>text</p>").unwrap();
        sleep(Duration::from_secs(10)).await;
        assert!(doc.lock().markers().is_empty());
        session.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_attempts() {
        let doc = shared("<body><p>loading</p></body>");
        let session = session("text that never shows");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        sleep(Duration::from_millis(1200)).await;
        assert_eq!(session.attempts(), 2);
        handle.cancel();

        assert_eq!(handle.finished().await, AnchorOutcome::Cancelled);
        assert_eq!(session.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_recognizes_marker_from_locator_path() {
        let doc = shared("<body><p>Intro</p><p>Say Hello World today</p></body>");
        let link = crate::locator::encode("https://ex.com/p", "hello world");

        let first = crate::anchoring::start_from_locator(doc.clone(), &link, AnchorOptions::default())
            .unwrap()
            .finished()
            .await;
        let AnchorOutcome::Marked(marker) = first else {
            panic!("expected a marker, got {:?}", first);
        };
        assert_eq!(marker.text, "Hello World");

        let rerun = session("Hello  World");
        let options = AnchorOptions::default().with_native_detection(false);
        let second = anchor(doc.clone(), rerun.clone(), options).finished().await;

        assert_eq!(second, AnchorOutcome::AlreadyMarked(marker));
        assert_eq!(rerun.attempts(), 0);
        let doc = doc.lock();
        assert_eq!(doc.markers().len(), 1);
        assert_eq!(doc.to_html().matches("<mark").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_attempts_never_matches() {
        let doc = shared("<body><p>The quick brown fox</p></body>");
        let session = session("The quick brown fox");
        let options = AnchorOptions::default()
            .with_native_detection(false)
            .with_max_attempts(0);

        let outcome = anchor(doc.clone(), session.clone(), options).finished().await;

        assert_eq!(outcome, AnchorOutcome::Exhausted { attempts: 0 });
        assert_eq!(session.attempts(), 0);
        assert!(doc.lock().markers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_success_is_noop() {
        let doc = shared("<body><p>The <b>quick</b> brown fox</p></body>");
        let session = session("The quick brown fox");
        let handle = anchor(doc.clone(), session.clone(), AnchorOptions::default());

        sleep(Duration::from_millis(700)).await;
        assert!(handle.is_finished());
        handle.cancel();
        handle.cancel();
        assert!(!session.is_cancelled());

        let outcome = handle.finished().await;
        assert!(matches!(outcome, AnchorOutcome::Marked(_)));

        // Later content changes do not wake the finished session
        doc.lock()
            .append_html("<p>The quick brown fox again</p>")
            .unwrap();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(session.attempts(), 1);
        assert_eq!(doc.lock().markers().len(), 1);
    }
}
