//! Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use survey_bridge::config::Config;
use survey_bridge::error::SyncTransportFailure;
use survey_bridge::host::memory::{NavControls, RecordingAudio, RecordingEngine};
use survey_bridge::host::MemoryDocument;
use survey_bridge::runtime::PageRuntime;
use survey_bridge::sync::NotificationSender;

pub const DOMAIN: &str = "https://platform.example.org";
pub const PARTICIPANT: &str = "Participant_abc";
pub const SURVEY: &str = "Survey_123";

/// Sender that records every probe and fails the first `failures` of them
#[derive(Default)]
pub struct RecordingSender {
    urls: Mutex<Vec<String>>,
    failures: AtomicU32,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            failures: AtomicU32::new(failures),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn probe(&self, url: &str) -> Result<(), SyncTransportFailure> {
        self.urls.lock().unwrap().push(url.to_string());

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncTransportFailure::new(url, "connection refused"));
        }
        Ok(())
    }
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.set_domain(DOMAIN);
    config.set_program("prog-1");
    config
}

/// Render the embedded values and navigation controls of a typical page
pub fn render_page(document: &MemoryDocument, margin: &str) -> NavControls {
    document.add_embedded_data("participant_id", PARTICIPANT);
    document.add_embedded_data("survey_id", SURVEY);
    document.add_embedded_data("blocked_nav_count", "0");
    document.add_nav_controls(margin, true)
}

pub struct Page {
    pub document: MemoryDocument,
    pub engine: Arc<RecordingEngine>,
    pub audio: Arc<RecordingAudio>,
    pub sender: Arc<RecordingSender>,
    pub runtime: PageRuntime,
}

impl Page {
    /// A runtime over an empty document
    pub fn blank(config: Config, sender: RecordingSender) -> Self {
        let document = MemoryDocument::new();
        let engine = Arc::new(RecordingEngine::new());
        let audio = Arc::new(RecordingAudio::default());
        let sender = Arc::new(sender);

        let runtime = PageRuntime::builder(Arc::new(document.clone()), engine.clone())
            .config(config)
            .sender(sender.clone())
            .audio(audio.clone())
            .build()
            .unwrap();

        Self {
            document,
            engine,
            audio,
            sender,
            runtime,
        }
    }

    /// A runtime over a rendered, loaded page
    pub fn rendered(margin: &str) -> (Self, NavControls) {
        Self::rendered_with(config(), margin)
    }

    pub fn rendered_with(config: Config, margin: &str) -> (Self, NavControls) {
        let page = Self::blank(config, RecordingSender::new());
        let controls = render_page(&page.document, margin);
        page.runtime.on_page_load();
        (page, controls)
    }

    /// Host navigation: drop the page, render the next one and load it
    pub fn advance(&self, margin: &str) -> NavControls {
        self.runtime.page_transition();
        self.document.replace_page();
        let controls = render_page(&self.document, margin);
        self.runtime.on_page_load();
        controls
    }
}
