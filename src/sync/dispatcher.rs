//! Fire-and-forget dispatch of sync attempts
//!
//! Every attempt runs as its own task. Callers never see the outcome; an
//! attempt that exhausts its ceiling logs one error and is dropped.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::retry::{RetryConfig, RetryPolicy};
use super::sender::NotificationSender;
use super::stats::SyncStats;
use crate::tasks;

/// One outbound notification for the duration of its retry sequence
#[derive(Debug, Clone)]
pub struct SyncAttempt {
    pub correlation_id: String,
    pub key: String,
    pub url: String,
    pub max_attempts: u32,
}

impl SyncAttempt {
    pub fn new(key: impl Into<String>, url: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            key: key.into(),
            url: url.into(),
            max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Delivered { attempts: u32 },
    Abandoned { attempts: u32 },
}

#[derive(Clone)]
pub struct SyncDispatcher {
    sender: Arc<dyn NotificationSender>,
    policy: RetryPolicy,
    stats: SyncStats,
    in_flight: Arc<Mutex<Vec<JoinHandle<SyncOutcome>>>>,
}

impl SyncDispatcher {
    pub fn new(sender: Arc<dyn NotificationSender>, policy: RetryPolicy) -> Self {
        Self {
            sender,
            policy,
            stats: SyncStats::new(),
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Send `url` for `key` with the configured retry policy
    pub fn dispatch(&self, key: &str, url: String) {
        self.dispatch_with(key, url, self.policy.clone());
    }

    /// Send `url` once; a failure is logged and not retried
    pub fn dispatch_once(&self, key: &str, url: String) {
        self.dispatch_with(key, url, RetryPolicy::new(RetryConfig::once()));
    }

    fn dispatch_with(&self, key: &str, url: String, policy: RetryPolicy) {
        if url.is_empty() {
            info!("Blank url; not sending {}", key);
            return;
        }

        let attempt = SyncAttempt::new(key, url, policy.config().max_attempts);
        debug!("[{}] dispatching sync for {}", attempt.correlation_id, attempt.key);

        let sender = self.sender.clone();
        let stats = self.stats.clone();
        let handle = tasks::spawn("sync attempt", run_attempt(sender, policy, stats, attempt));

        if let Some(handle) = handle {
            let mut in_flight = self.in_flight.lock().unwrap();
            in_flight.retain(|h| !h.is_finished());
            in_flight.push(handle);
        }
    }

    /// Wait for every attempt dispatched so far
    pub async fn flush(&self) -> Vec<SyncOutcome> {
        let handles: Vec<_> = self.in_flight.lock().unwrap().drain(..).collect();
        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .collect()
    }
}

async fn run_attempt(
    sender: Arc<dyn NotificationSender>,
    policy: RetryPolicy,
    stats: SyncStats,
    attempt: SyncAttempt,
) -> SyncOutcome {
    let result = policy
        .execute(&attempt.correlation_id, |_| {
            stats.record_probe();
            let sender = sender.clone();
            let url = attempt.url.clone();
            async move { sender.probe(&url).await }
        })
        .await;

    match result {
        Ok(attempts) => {
            stats.record_delivered();
            SyncOutcome::Delivered { attempts }
        }
        Err(failure) => {
            error!(
                "[{}] failed to write {} after {} attempts: {}",
                attempt.correlation_id, attempt.key, attempt.max_attempts, failure
            );
            stats.record_abandoned();
            SyncOutcome::Abandoned {
                attempts: attempt.max_attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncTransportFailure;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` probes, then succeeds
    struct FlakySender {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationSender for FlakySender {
        async fn probe(&self, url: &str) -> Result<(), SyncTransportFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SyncTransportFailure::new(url, "image load error"))
            } else {
                Ok(())
            }
        }
    }

    fn dispatcher(failures: u32) -> (SyncDispatcher, Arc<FlakySender>) {
        let sender = Arc::new(FlakySender {
            failures,
            calls: AtomicU32::new(0),
        });
        (SyncDispatcher::new(sender.clone(), RetryPolicy::default()), sender)
    }

    #[tokio::test]
    async fn test_delivered_on_third_attempt() {
        let (dispatcher, sender) = dispatcher(2);
        dispatcher.dispatch("audio", "https://p.org/x.gif".to_string());

        let outcomes = dispatcher.flush().await;

        assert_eq!(outcomes, vec![SyncOutcome::Delivered { attempts: 3 }]);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.stats().snapshot().delivered, 1);
    }

    #[tokio::test]
    async fn test_abandoned_after_three_failures() {
        let (dispatcher, sender) = dispatcher(u32::MAX);
        dispatcher.dispatch("audio", "https://p.org/x.gif".to_string());

        let outcomes = dispatcher.flush().await;

        assert_eq!(outcomes, vec![SyncOutcome::Abandoned { attempts: 3 }]);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        let snapshot = dispatcher.stats().snapshot();
        assert_eq!(snapshot.abandoned, 1);
        assert_eq!(snapshot.probes_sent, 3);
    }

    #[tokio::test]
    async fn test_dispatch_once_does_not_retry() {
        let (dispatcher, sender) = dispatcher(u32::MAX);
        dispatcher.dispatch_once("page", "https://p.org/pd.gif".to_string());

        dispatcher.flush().await;

        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_url_is_not_sent() {
        let (dispatcher, sender) = dispatcher(0);
        dispatcher.dispatch("audio", String::new());

        assert!(dispatcher.flush().await.is_empty());
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }
}
