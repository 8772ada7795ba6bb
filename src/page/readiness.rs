//! DOM readiness gate
//!
//! The host renders each page asynchronously, so anything touching the
//! navigation controls first waits for the next control to exist. Readiness
//! is cached per page generation and dropped by [`PageContext::reset`].

use std::sync::Arc;

use log::{debug, error};
use tokio::time::sleep;

use super::context::PageContext;
use crate::error::{Result, SurveyError};
use crate::host::{Document, ids};
use crate::tasks;

#[derive(Clone)]
pub struct DomReadiness {
    document: Arc<dyn Document>,
    context: Arc<PageContext>,
}

impl DomReadiness {
    pub fn new(document: Arc<dyn Document>, context: Arc<PageContext>) -> Self {
        Self { document, context }
    }

    /// Capture control handles if the next control is present. Returns
    /// whether the page is ready.
    pub fn refresh(&self) -> bool {
        if self.context.is_ready() {
            return true;
        }

        // The previous control is often absent; only the next control
        // signals a rendered page.
        match self.document.find(ids::NEXT_BUTTON) {
            Some(next) => {
                let previous = self.document.find(ids::PREVIOUS_BUTTON);
                self.context.mark_ready(next, previous);
                debug!("DOM ready, next control {}", next);
                true
            }
            None => false,
        }
    }

    /// Run `callback` once the next control exists
    ///
    /// Runs inline when the page is already ready; otherwise a poll task runs
    /// it from the tick that finds the control.
    pub fn when_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.refresh() {
            callback();
            return;
        }

        let readiness = self.clone();
        tasks::spawn("readiness poll", async move {
            if readiness.ready().await.is_ok() {
                callback();
            }
        });
    }

    /// Wait until the next control exists
    ///
    /// Polls without bound unless `readiness.max_poll_attempts` is configured.
    pub async fn ready(&self) -> Result<()> {
        let settings = &self.context.config().readiness;
        let interval = settings.poll_interval();
        let mut attempts: u32 = 0;

        loop {
            if self.refresh() {
                return Ok(());
            }

            attempts += 1;
            if let Some(max) = settings.max_poll_attempts {
                if attempts >= max {
                    error!("Next control never appeared after {} polls", attempts);
                    return Err(SurveyError::ReadinessTimeout { attempts });
                }
            }

            if attempts == 1 {
                debug!("DOM wasn't ready, polling every {:?}", interval);
            }
            sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::MemoryDocument;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn readiness_for(doc: &MemoryDocument, config: Config) -> (DomReadiness, Arc<PageContext>) {
        let context = Arc::new(PageContext::new(config));
        let document: Arc<dyn Document> = Arc::new(doc.clone());
        (DomReadiness::new(document, context.clone()), context)
    }

    #[test]
    fn test_callback_runs_inline_when_ready() {
        let doc = MemoryDocument::new();
        let controls = doc.add_nav_controls("45px", true);
        let (readiness, context) = readiness_for(&doc, Config::default());

        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        readiness.when_ready(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(context.next_control(), Some(controls.next));
        assert_eq!(context.previous_control(), controls.previous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_control_renders() {
        let doc = MemoryDocument::new();
        let (readiness, _context) = readiness_for(&doc, Config::default());

        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        readiness.when_ready(move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        doc.add_nav_controls("45px", false);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_respects_configured_ceiling() {
        let doc = MemoryDocument::new();
        let mut config = Config::default();
        config.readiness.max_poll_attempts = Some(5);
        let (readiness, _context) = readiness_for(&doc, config);

        let err = readiness.ready().await.unwrap_err();
        assert!(matches!(err, SurveyError::ReadinessTimeout { attempts: 5 }));
    }
}
