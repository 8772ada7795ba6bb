//! Counters for the notification path
//!
//! Nothing about sync outcomes reaches `set` callers; these counters are the
//! only place they are visible, for the CLI and tests.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    inner: Arc<Mutex<SyncStatsInner>>,
}

#[derive(Debug, Default)]
struct SyncStatsInner {
    probes_sent: u64,
    delivered: u64,
    abandoned: u64,
    skipped_preview: u64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncStatsSnapshot {
    /// Individual probe requests, retries included
    pub probes_sent: u64,
    pub delivered: u64,
    pub abandoned: u64,
    pub skipped_preview: u64,
    pub timestamp: String,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_probe(&self) {
        self.inner.lock().unwrap().probes_sent += 1;
    }

    pub fn record_delivered(&self) {
        self.inner.lock().unwrap().delivered += 1;
    }

    pub fn record_abandoned(&self) {
        self.inner.lock().unwrap().abandoned += 1;
    }

    pub fn record_skipped_preview(&self) {
        self.inner.lock().unwrap().skipped_preview += 1;
    }

    pub fn probes_sent(&self) -> u64 {
        self.inner.lock().unwrap().probes_sent
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        let inner = self.inner.lock().unwrap();
        SyncStatsSnapshot {
            probes_sent: inner.probes_sent,
            delivered: inner.delivered,
            abandoned: inner.abandoned,
            skipped_preview: inner.skipped_preview,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
