//! Scheduler options

use std::time::Duration;

use crate::matcher::MatchOptions;

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first attempt, leaving room for first paint
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(600);

/// Spacing between scheduled attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Attempts before giving up (interval and mutation-driven combined)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Timing and matching policy for one anchoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorOptions {
    pub initial_delay: Duration,
    pub retry_interval: Duration,
    /// Upper bound on matcher invocations; zero skips matching entirely
    pub max_attempts: u32,
    /// Treat a literal occurrence already present in a text node as the
    /// host's own highlight and only scroll to it
    pub detect_native_highlight: bool,
    /// Enable the matcher's case-insensitive stage
    pub case_insensitive_fallback: bool,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            detect_native_highlight: true,
            case_insensitive_fallback: false,
        }
    }
}

impl AnchorOptions {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_native_detection(mut self, enabled: bool) -> Self {
        self.detect_native_highlight = enabled;
        self
    }

    pub fn with_case_insensitive_fallback(mut self, enabled: bool) -> Self {
        self.case_insensitive_fallback = enabled;
        self
    }

    pub(crate) fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_insensitive: self.case_insensitive_fallback,
        }
    }
}
