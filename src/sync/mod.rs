//! Notification path to the remote store
//!
//! Writes are mirrored to the platform with best-effort probes: retried on
//! transport failure, never reported back to the writer.

pub mod dispatcher;
pub mod retry;
pub mod sender;
pub mod stats;
pub mod url;

pub use dispatcher::{SyncAttempt, SyncDispatcher, SyncOutcome};
pub use retry::{RetryConfig, RetryPolicy};
pub use sender::{HttpProbeSender, NotificationSender};
pub use stats::{SyncStats, SyncStatsSnapshot};
