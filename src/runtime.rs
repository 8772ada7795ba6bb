//! Page runtime
//!
//! The single long-lived object a survey page talks to. It is created once
//! per script context, owns the shared [`PageContext`] and the components
//! built on it, and is reset (never torn down) on every page transition.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error, info};
use tokio::time::sleep;

use crate::config::{Config, UrlScheme};
use crate::error::{Result, StratifyError, SurveyError};
use crate::host::{
    AudioControl, Document, ElementSpec, NavDirection, NodeId, SurveyEngine, ids,
};
use crate::nav::NavigationGate;
use crate::page::{DomReadiness, PageContext};
use crate::store::{StateStore, SyncTarget};
use crate::stratify::{Stratifier, StratifyRequest};
use crate::sync::url::done_url;
use crate::sync::{
    HttpProbeSender, NotificationSender, RetryPolicy, SyncDispatcher, SyncOutcome,
    SyncStatsSnapshot,
};
use crate::tasks;

/// Delay between following the platform link and submitting the survey
const REDIRECT_SUBMIT_DELAY: Duration = Duration::from_secs(2);

struct RuntimeInner {
    context: Arc<PageContext>,
    document: Arc<dyn Document>,
    engine: Arc<dyn SurveyEngine>,
    audio: Option<Arc<dyn AudioControl>>,
    readiness: DomReadiness,
    store: StateStore,
    gate: NavigationGate,
}

#[derive(Clone)]
pub struct PageRuntime {
    inner: Arc<RuntimeInner>,
}

pub struct PageRuntimeBuilder {
    document: Arc<dyn Document>,
    engine: Arc<dyn SurveyEngine>,
    config: Config,
    sender: Option<Arc<dyn NotificationSender>>,
    audio: Option<Arc<dyn AudioControl>>,
}

impl PageRuntimeBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replace the HTTP probe sender
    pub fn sender(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn audio(mut self, audio: Arc<dyn AudioControl>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn build(self) -> Result<PageRuntime> {
        let sender = match self.sender {
            Some(sender) => sender,
            None => Arc::new(HttpProbeSender::new(self.config.sync.probe_timeout())?),
        };
        let policy = RetryPolicy::new(self.config.sync.retry_config());

        let context = Arc::new(PageContext::new(self.config));
        let readiness = DomReadiness::new(self.document.clone(), context.clone());
        let dispatcher = SyncDispatcher::new(sender, policy);
        let store = StateStore::new(
            self.document.clone(),
            self.engine.clone(),
            context.clone(),
            dispatcher,
        );
        let gate = NavigationGate::new(
            self.document.clone(),
            context.clone(),
            readiness.clone(),
            store.clone(),
        );

        Ok(PageRuntime {
            inner: Arc::new(RuntimeInner {
                context,
                document: self.document,
                engine: self.engine,
                audio: self.audio,
                readiness,
                store,
                gate,
            }),
        })
    }
}

impl PageRuntime {
    pub fn builder(
        document: Arc<dyn Document>,
        engine: Arc<dyn SurveyEngine>,
    ) -> PageRuntimeBuilder {
        PageRuntimeBuilder {
            document,
            engine,
            config: Config::default(),
            sender: None,
            audio: None,
        }
    }

    fn from_weak(weak: &Weak<RuntimeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn context(&self) -> &PageContext {
        &self.inner.context
    }

    pub fn config(&self) -> &Config {
        self.inner.context.config()
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    pub fn gate(&self) -> &NavigationGate {
        &self.inner.gate
    }

    pub fn readiness(&self) -> &DomReadiness {
        &self.inner.readiness
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.inner.store.dispatcher().stats().snapshot()
    }

    /// Wait for every in-flight sync attempt
    pub async fn flush(&self) -> Vec<SyncOutcome> {
        self.inner.store.dispatcher().flush().await
    }

    /// Get a named value
    pub fn data(&self, key: &str) -> Result<Option<String>> {
        self.inner.store.get(key)
    }

    /// Set a named value, mirroring it to the platform
    pub fn set_data(&self, key: &str, value: &str) -> Result<()> {
        self.inner.store.set(key, value)
    }

    /// Reset per-page state before the host replaces the page
    pub fn page_transition(&self) {
        if let Some(audio) = &self.inner.audio {
            audio.stop();
        }
        let generation = self.inner.context.reset();
        self.inner.gate.on_page_transition();
        info!("Page transition, now on generation {}", generation);
    }

    pub fn next(&self) {
        self.navigate(NavDirection::Next);
    }

    pub fn previous(&self) {
        self.navigate(NavDirection::Previous);
    }

    fn navigate(&self, direction: NavDirection) {
        self.page_transition();
        self.inner.engine.nav_click(direction);
    }

    /// Wire the freshly rendered page and send the automatic page save
    pub fn on_page_load(&self) {
        self.inner.readiness.refresh();
        self.wire_navigation();
        self.automatic_save();
    }

    fn wire_navigation(&self) {
        let document = self.inner.document.as_ref();

        for id in [ids::NEXT_BUTTON, ids::PREVIOUS_BUTTON] {
            if let Some(control) = document.find(id) {
                let weak = Arc::downgrade(&self.inner);
                document.on_click(
                    control,
                    Arc::new(move || {
                        if let Some(runtime) = PageRuntime::from_weak(&weak) {
                            runtime.page_transition();
                        }
                    }),
                );
            }
        }

        // The host omits the previous control when going back would cross a branch
        if let Some(back) = document.find(ids::BACK_BUTTON) {
            if document.find(ids::PREVIOUS_BUTTON).is_some() {
                let weak = Arc::downgrade(&self.inner);
                document.on_click(
                    back,
                    Arc::new(move || {
                        if let Some(runtime) = PageRuntime::from_weak(&weak) {
                            runtime.previous();
                        }
                    }),
                );
            } else {
                document.set_style(back, "visibility", "hidden");
            }
        }
    }

    fn automatic_save(&self) {
        let config = self.config();
        if !config.automatic_save {
            info!("Automatic saving is disabled; data is only sent on explicit writes");
            return;
        }

        match config.url_scheme {
            UrlScheme::Yosemite => match self.inner.store.page_target() {
                Ok(SyncTarget::Url(url)) => {
                    self.inner.store.dispatcher().dispatch_once("page", url)
                }
                Ok(_) => debug!("Automatic page save skipped"),
                Err(err) => error!("Error saving page data: {}", err),
            },
            UrlScheme::Neptune => {
                info!("Per-key url layout has no page-level save; skipping automatic save")
            }
        }
    }

    pub fn relabel_next(&self, label: &str) -> Result<()> {
        self.inner.gate.relabel_next(label)
    }

    /// Block navigation for `seconds`; non-positive or NaN values expire on
    /// the next timer tick, oversized ones saturate to the longest timer
    pub async fn temporarily_block_navigation(&self, message: &str, seconds: f64) -> Result<()> {
        self.inner.gate.activate(message, seconds_to_duration(seconds)).await
    }

    pub fn remove_navigation_block(&self) -> bool {
        self.inner.gate.release()
    }

    pub fn hide_next_button(&self, seconds: Option<f64>) -> Result<()> {
        self.inner.gate.hide_next(seconds.map(seconds_to_duration))
    }

    /// Replace the next control with a link to the platform's done page
    ///
    /// Following the link submits the survey in the background after a short
    /// delay.
    pub fn make_next_redirect_to_platform(&self, button_text: &str) -> Result<NodeId> {
        let inner = &self.inner;
        let document = inner.document.as_ref();

        inner.readiness.refresh();
        let next = inner
            .context
            .next_control()
            .ok_or_else(|| SurveyError::missing(ids::NEXT_BUTTON))?;
        let container = document
            .find(ids::BUTTONS)
            .ok_or_else(|| SurveyError::missing(ids::BUTTONS))?;

        let user = inner.store.get_or_empty("user")?;
        let ordinal = inner.store.get_or_empty("activity_ordinal")?;
        let config = self.config();
        let url = done_url(config.domain(), config.program(), &user, &ordinal);

        document.set_visible(next, false);
        inner.gate.neutralize();

        let link = document.append(
            container,
            ElementSpec::new("a")
                .class("platform-link")
                .attr("target", "_blank")
                .attr("href", url)
                .text(button_text),
        );

        let weak = Arc::downgrade(&self.inner);
        document.on_click(
            link,
            Arc::new(move || {
                let weak = weak.clone();
                tasks::spawn("redirect submit", async move {
                    sleep(REDIRECT_SUBMIT_DELAY).await;
                    if let Some(runtime) = PageRuntime::from_weak(&weak) {
                        runtime.next();
                    }
                });
            }),
        );

        Ok(link)
    }

    /// Ask the platform for a condition and store it
    pub async fn stratify(
        &self,
        request: &StratifyRequest,
    ) -> std::result::Result<String, StratifyError> {
        let stratifier = Stratifier::new(self.config().domain())?;
        stratifier.stratify(&self.inner.store, request).await
    }
}

/// Caller-supplied seconds as a timer period
///
/// NaN and non-positive values become zero; values too large for a
/// [`Duration`] (infinity included) saturate to [`Duration::MAX`].
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_duration() {
        assert_eq!(seconds_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(seconds_to_duration(0.0), Duration::ZERO);
        assert_eq!(seconds_to_duration(-3.0), Duration::ZERO);
        assert_eq!(seconds_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(seconds_to_duration(f64::NEG_INFINITY), Duration::ZERO);
    }

    #[test]
    fn test_oversized_seconds_saturate() {
        assert_eq!(seconds_to_duration(1e20), Duration::MAX);
        assert_eq!(seconds_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(seconds_to_duration(f64::MAX), Duration::MAX);
    }
}
