//! Outbound probe transport
//!
//! A probe is a one-shot GET whose body is never read. Only the transport
//! outcome matters: connection errors, timeouts and error statuses all count
//! as a failed load, just like an image request that fires its error event.

use std::time::Duration;

use async_trait::async_trait;
use log::trace;

use crate::error::{Result, SyncTransportFailure};

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn probe(&self, url: &str) -> std::result::Result<(), SyncTransportFailure>;
}

/// Probe sender over a pooled reqwest client
#[derive(Debug, Clone)]
pub struct HttpProbeSender {
    http_client: reqwest::Client,
}

impl HttpProbeSender {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("survey-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl NotificationSender for HttpProbeSender {
    async fn probe(&self, url: &str) -> std::result::Result<(), SyncTransportFailure> {
        trace!("GET {}", url);

        let response = self.http_client.get(url).send().await.map_err(|error| {
            let reason = if error.is_timeout() {
                "timed out".to_string()
            } else if error.is_connect() {
                format!("connection failed: {}", error)
            } else {
                error.to_string()
            };
            SyncTransportFailure::new(url, reason)
        })?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(SyncTransportFailure::new(url, format!("status {}", status.as_u16())))
        }
    }
}
