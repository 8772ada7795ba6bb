//! Navigation gate
//!
//! Swaps the host's next control for a surrogate that does not navigate.
//! Clicking the surrogate shows a message and counts the attempt; after the
//! block period the surrogate goes away and the real control comes back.
//!
//! At most one [`NavigationBlockSession`] is active. Activating again first
//! disposes the current session (handler, timer, nodes) before building the
//! new one.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::{Result, SurveyError};
use crate::host::{Document, ElementSpec, NodeId, ids, pixels};
use crate::page::{DomReadiness, PageContext};
use crate::store::StateStore;
use crate::tasks;

pub const SURROGATE_CLASS: &str = "blocked-next-button";
pub const MESSAGE_CLASS: &str = "blocked-nav-message";

/// Vertical space taken by the surrogate plus its message area
const SURROGATE_HEIGHT: i32 = 30;

const COPIED_ATTRIBUTES: [&str; 3] = ["title", "name", "value"];

/// One activation of the gate
pub struct NavigationBlockSession {
    id: u64,
    generation: u64,
    original: NodeId,
    surrogate: NodeId,
    message_node: NodeId,
    counter_key: String,
    expiry: Option<JoinHandle<()>>,
}

/// Read-only view of the active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: u64,
    pub generation: u64,
    pub original: NodeId,
    pub surrogate: NodeId,
    pub message_node: NodeId,
    pub counter_key: String,
}

impl NavigationBlockSession {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            generation: self.generation,
            original: self.original,
            surrogate: self.surrogate,
            message_node: self.message_node,
            counter_key: self.counter_key.clone(),
        }
    }

    /// Unbind the handler, cancel the timer, then remove the nodes
    fn dispose(mut self, document: &dyn Document) {
        document.off_click(self.surrogate);
        if let Some(expiry) = self.expiry.take() {
            expiry.abort();
        }
        document.remove(self.surrogate);
        document.remove(self.message_node);
    }

    /// Forget the handles of a replaced page, handing back the timer
    fn detach(mut self) -> Option<JoinHandle<()>> {
        self.expiry.take()
    }
}

struct GateInner {
    document: Arc<dyn Document>,
    context: Arc<PageContext>,
    readiness: DomReadiness,
    store: StateStore,
    session: Mutex<Option<NavigationBlockSession>>,
    next_session_id: AtomicU64,
    pending_timers: Arc<AtomicUsize>,
}

/// Decrements the live-timer count when its task ends or is cancelled
struct TimerGuard(Arc<AtomicUsize>);

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct NavigationGate {
    inner: Arc<GateInner>,
}

impl NavigationGate {
    pub fn new(
        document: Arc<dyn Document>,
        context: Arc<PageContext>,
        readiness: DomReadiness,
        store: StateStore,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                document,
                context,
                readiness,
                store,
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(0),
                pending_timers: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// Block navigation for `duration`, showing `message` on blocked clicks
    ///
    /// Waits for the page (and its stylesheet) to be ready. Fails with
    /// [`SurveyError::Layout`] when the next control's bottom margin is below
    /// the configured minimum, and with [`SurveyError::UnreadableMargin`]
    /// when it is not a pixel length.
    pub async fn activate(&self, message: &str, duration: Duration) -> Result<()> {
        let margin = self.settled_margin().await?;
        let required = self.inner.context.config().navigation.min_margin_bottom;
        if margin < required {
            error!(
                "Can't replace next control: margin-bottom {}px is below {}px",
                margin, required
            );
            return Err(SurveyError::Layout {
                margin_bottom: margin,
                required,
            });
        }

        self.install(message, duration, margin)
    }

    /// Bottom margin of the real control once the host has styled it
    async fn settled_margin(&self) -> Result<i32> {
        let settings = &self.inner.context.config().readiness;
        let mut waits: u32 = 0;

        loop {
            self.inner.readiness.ready().await?;
            let next = self
                .inner
                .context
                .next_control()
                .ok_or_else(|| SurveyError::missing(ids::NEXT_BUTTON))?;

            // A zero, empty or absent margin means styles are not applied yet
            let style = self.inner.document.style(next, "margin-bottom");
            if let Some(value) = style.filter(|v| !v.trim().is_empty()) {
                match pixels(&value) {
                    Some(0) => {}
                    Some(margin) => return Ok(margin),
                    None => {
                        error!("Can't read margin-bottom '{}' of the next control", value);
                        return Err(SurveyError::UnreadableMargin { value });
                    }
                }
            }

            waits += 1;
            if let Some(max) = settings.max_poll_attempts {
                if waits >= max {
                    return Err(SurveyError::ReadinessTimeout { attempts: waits });
                }
            }
            debug!("Next control not styled yet; re-checking margin");
            sleep(settings.poll_interval()).await;
        }
    }

    fn install(&self, message: &str, duration: Duration, margin: i32) -> Result<()> {
        let inner = &self.inner;
        let document = inner.document.as_ref();

        let next = inner
            .context
            .next_control()
            .ok_or_else(|| SurveyError::missing(ids::NEXT_BUTTON))?;
        let container = document
            .find(ids::BUTTONS)
            .ok_or_else(|| SurveyError::missing(ids::BUTTONS))?;

        let mut slot = inner.session.lock().unwrap();
        if let Some(previous) = slot.take() {
            debug!("Replacing navigation block session {}", previous.id);
            previous.dispose(document);
        }
        // Surrogates left by sessions whose handles were dropped on transition
        for stale in document.find_by_class(SURROGATE_CLASS) {
            document.off_click(stale);
            document.remove(stale);
        }
        for stale in document.find_by_class(MESSAGE_CLASS) {
            document.remove(stale);
        }

        // Hidden, not removed: the host's submit checks still look for it
        document.set_visible(next, false);

        let surrogate = document.append(
            container,
            ElementSpec::new("input")
                .class(SURROGATE_CLASS)
                .attr("type", "button")
                .style("margin-bottom", format!("{}px", margin - SURROGATE_HEIGHT)),
        );
        for name in COPIED_ATTRIBUTES {
            if let Some(value) = document.attribute(next, name) {
                document.set_attribute(surrogate, name, &value);
            }
        }

        let message_node = document.append(
            container,
            ElementSpec::new("div")
                .class(MESSAGE_CLASS)
                .style("height", "20px")
                .style("margin-bottom", "10px")
                .style("text-align", "center"),
        );

        let counter_key = inner.context.config().navigation.counter_key.clone();
        {
            let document = inner.document.clone();
            let store = inner.store.clone();
            let key = counter_key.clone();
            let message = message.to_string();
            inner.document.on_click(
                surrogate,
                Arc::new(move || {
                    document.set_text(message_node, &message);
                    record_blocked_click(&store, &key);
                }),
            );
        }

        let id = inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = inner.context.generation();
        let expiry = self.schedule_expiry(id, generation, duration);

        *slot = Some(NavigationBlockSession {
            id,
            generation,
            original: next,
            surrogate,
            message_node,
            counter_key,
            expiry,
        });

        info!("Navigation blocked for {:?} (session {})", duration, id);
        Ok(())
    }

    fn schedule_expiry(
        &self,
        id: u64,
        generation: u64,
        duration: Duration,
    ) -> Option<JoinHandle<()>> {
        let weak = Arc::downgrade(&self.inner);
        self.inner.pending_timers.fetch_add(1, Ordering::SeqCst);
        let guard = TimerGuard(self.inner.pending_timers.clone());

        tasks::spawn("navigation block expiry", async move {
            let _guard = guard;
            sleep(duration).await;
            if let Some(inner) = weak.upgrade() {
                NavigationGate { inner }.expire(id, generation);
            }
        })
    }

    fn expire(&self, id: u64, generation: u64) {
        let mut slot = self.inner.session.lock().unwrap();

        if slot.as_ref().map(|s| s.id) == Some(id) {
            if let Some(mut session) = slot.take() {
                drop(slot);
                // This task is the timer; nothing left to cancel
                session.expiry = None;
                let original = session.original;
                session.dispose(self.inner.document.as_ref());
                self.inner.document.set_visible(original, true);
                info!("Navigation block session {} expired", id);
            }
            return;
        }
        drop(slot);

        let current = self.inner.context.generation();
        if generation != current {
            // A timer that outlived its page still ends the block on the
            // current page.
            warn!(
                "Navigation block timer from page generation {} fired on generation {}",
                generation, current
            );
            self.release();
            if self.inner.readiness.refresh() {
                if let Some(next) = self.inner.context.next_control() {
                    self.inner.document.set_visible(next, true);
                }
            }
        } else {
            debug!("Ignoring superseded expiry for session {}", id);
        }
    }

    /// End the active session early, restoring the real control
    ///
    /// Returns false (and does nothing) when no session is active.
    pub fn release(&self) -> bool {
        let session = self.inner.session.lock().unwrap().take();
        match session {
            Some(session) => {
                let original = session.original;
                let id = session.id;
                session.dispose(self.inner.document.as_ref());
                self.inner.document.set_visible(original, true);
                info!("Navigation block session {} released", id);
                true
            }
            None => false,
        }
    }

    /// Disarm the active session without restoring the real control
    ///
    /// The surrogate and message stay in the page, hidden and inert.
    pub fn neutralize(&self) {
        let session = self.inner.session.lock().unwrap().take();
        if let Some(mut session) = session {
            let document = self.inner.document.as_ref();
            document.off_click(session.surrogate);
            if let Some(expiry) = session.expiry.take() {
                expiry.abort();
            }
            document.set_visible(session.surrogate, false);
            document.set_visible(session.message_node, false);
        }
    }

    /// Drop handles of the replaced page
    ///
    /// The expiry timer keeps running unless `navigation.cancel_on_transition`
    /// is set; a surviving timer ends whatever block is active when it fires.
    pub fn on_page_transition(&self) {
        let session = self.inner.session.lock().unwrap().take();
        let Some(session) = session else {
            return;
        };

        let id = session.id;
        if let Some(expiry) = session.detach() {
            if self.inner.context.config().navigation.cancel_on_transition {
                expiry.abort();
                debug!("Cancelled expiry of session {} on page transition", id);
            } else {
                debug!("Expiry of session {} left running across page transition", id);
            }
        }
    }

    /// Set the label and title of the next control, and of the surrogate
    /// while a block is active
    pub fn relabel_next(&self, label: &str) -> Result<()> {
        self.inner.readiness.refresh();
        let next = self
            .inner
            .context
            .next_control()
            .ok_or_else(|| SurveyError::missing(ids::NEXT_BUTTON))?;

        let document = self.inner.document.as_ref();
        document.set_value(next, label);
        document.set_attribute(next, "title", label);

        if let Some(session) = self.inner.session.lock().unwrap().as_ref() {
            document.set_value(session.surrogate, label);
            document.set_attribute(session.surrogate, "title", label);
        }
        Ok(())
    }

    /// Hide the next control (and any surrogate) for `duration`
    ///
    /// The duration is mandatory so a misconfigured page can never strand
    /// the participant.
    pub fn hide_next(&self, duration: Option<Duration>) -> Result<()> {
        let duration = duration.ok_or(SurveyError::MissingDuration)?;

        self.inner.readiness.refresh();
        let next = self
            .inner
            .context
            .next_control()
            .ok_or_else(|| SurveyError::missing(ids::NEXT_BUTTON))?;

        if let Some(session) = self.inner.session.lock().unwrap().as_ref() {
            self.inner.document.set_visible(session.surrogate, false);
        }
        self.inner.document.set_visible(next, false);

        let document = self.inner.document.clone();
        tasks::spawn("timed hide", async move {
            sleep(duration).await;
            document.set_visible(next, true);
        });
        Ok(())
    }

    pub fn is_blocked(&self) -> bool {
        self.inner.session.lock().unwrap().is_some()
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.inner
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(NavigationBlockSession::info)
    }

    /// Expiry timers that have not fired or been cancelled yet
    pub fn pending_timers(&self) -> usize {
        self.inner.pending_timers.load(Ordering::SeqCst)
    }
}

/// Count a click on the surrogate. Failures are logged so the click itself
/// always goes through.
fn record_blocked_click(store: &StateStore, key: &str) {
    let count = store
        .get(key)
        .ok()
        .flatten()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);

    if let Err(err) = store.set(key, &(count + 1).to_string()) {
        error!("Cannot record blocked navigation click: {}", err);
    }
}
