//! Shared per-process page context
//!
//! One instance lives for the whole script context. It holds the configuration
//! plus the only mutable state shared between components: the cached control
//! handles, the readiness flag and the preview flag. All of it is cleared by
//! [`PageContext::reset`] on page transition.

use std::sync::{Arc, Mutex};

use log::{debug, info};

use crate::config::Config;
use crate::host::NodeId;

#[derive(Debug, Default)]
struct PageState {
    generation: u64,
    dom_ready: bool,
    next_control: Option<NodeId>,
    previous_control: Option<NodeId>,
    preview: bool,
}

#[derive(Debug)]
pub struct PageContext {
    config: Arc<Config>,
    state: Mutex<PageState>,
}

impl PageContext {
    pub fn new(config: Config) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<Config>) -> Self {
        Self {
            config,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().unwrap().dom_ready
    }

    /// Record the control handles found for the current page
    pub fn mark_ready(&self, next: NodeId, previous: Option<NodeId>) {
        let mut state = self.state.lock().unwrap();
        state.dom_ready = true;
        state.next_control = Some(next);
        state.previous_control = previous;
    }

    pub fn next_control(&self) -> Option<NodeId> {
        self.state.lock().unwrap().next_control
    }

    pub fn previous_control(&self) -> Option<NodeId> {
        self.state.lock().unwrap().previous_control
    }

    pub fn preview_detected(&self) -> bool {
        self.state.lock().unwrap().preview
    }

    /// Raise the preview flag. Returns true the first time it is raised in
    /// this page generation.
    pub fn flag_preview(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.preview {
            return false;
        }
        state.preview = true;
        info!("Detected preview data for {}; remote sync disabled for this page", key);
        true
    }

    /// Start a new page generation. Returns the new generation number.
    pub fn reset(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation + 1;
        *state = PageState {
            generation,
            ..Default::default()
        };
        debug!("Page context reset, generation {}", generation);
        generation
    }
}
