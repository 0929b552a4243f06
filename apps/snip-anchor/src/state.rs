//! Application state management

use std::sync::Arc;

use snip_anchor::anchoring::AnchorOptions;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    anchor_options: AnchorOptions,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let anchor_options = config.anchor.options();
        Self {
            inner: Arc::new(AppStateInner {
                config,
                anchor_options,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Scheduler options for anchoring requests
    pub fn anchor_options(&self) -> AnchorOptions {
        self.inner.anchor_options
    }
}
