//! Named-value store backed by the host's embedded-data inputs
//!
//! Reads always go to the live element so host-side rewrites are seen.
//! Writes update the element synchronously, then mirror the value to the
//! remote store unless the page turned out to be a preview.

use std::sync::Arc;

use log::{debug, error};

use crate::config::UrlScheme;
use crate::error::{Result, SurveyError};
use crate::host::{Document, NodeId, SurveyEngine};
use crate::page::PageContext;
use crate::sync::SyncDispatcher;
use crate::sync::url::{PAGE_FIELDS, is_placeholder, page_data_url, participant_data_url};

/// Where a write should be mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Url(String),
    /// Placeholder data found; remote sync is off for this page
    Preview,
    /// Nothing to send (no domain configured)
    Skip,
}

#[derive(Clone)]
pub struct StateStore {
    document: Arc<dyn Document>,
    engine: Arc<dyn SurveyEngine>,
    context: Arc<PageContext>,
    dispatcher: SyncDispatcher,
}

impl StateStore {
    pub fn new(
        document: Arc<dyn Document>,
        engine: Arc<dyn SurveyEngine>,
        context: Arc<PageContext>,
        dispatcher: SyncDispatcher,
    ) -> Self {
        Self {
            document,
            engine,
            context,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &SyncDispatcher {
        &self.dispatcher
    }

    fn element(&self, key: &str) -> Result<NodeId> {
        self.document
            .find(key)
            .ok_or_else(|| SurveyError::missing(key))
    }

    /// Live value of `key`; `None` when the element carries no value
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let node = self.element(key)?;
        Ok(self.document.value(node))
    }

    /// Live value of `key`, treating a valueless element as empty
    pub fn get_or_empty(&self, key: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Write `value` for `key` and mirror it to the remote store
    ///
    /// Fails only when the element is missing. Sync problems are logged and
    /// never reach the caller.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let node = self.element(key)?;

        self.engine.set_embedded_data(key, value);
        self.document.set_value(node, value);

        if self.context.preview_detected() {
            debug!("Preview page; not syncing {}", key);
            self.dispatcher.stats().record_skipped_preview();
            return Ok(());
        }

        match self.sync_target(key, value) {
            Ok(SyncTarget::Url(url)) => self.dispatcher.dispatch(key, url),
            Ok(SyncTarget::Preview) => self.dispatcher.stats().record_skipped_preview(),
            Ok(SyncTarget::Skip) => {}
            Err(err) => error!("Cannot sync {}: {}", key, err),
        }

        Ok(())
    }

    /// Raise the preview flag if `value` still holds the placeholder
    fn check_preview(&self, key: &str, value: &str) -> bool {
        if is_placeholder(value) {
            self.context.flag_preview(key);
            true
        } else {
            false
        }
    }

    /// Build the per-key URL for a write of `value` to `key`
    pub fn sync_target(&self, key: &str, value: &str) -> Result<SyncTarget> {
        if self.check_preview(key, value) {
            return Ok(SyncTarget::Preview);
        }

        let config = self.context.config();
        match config.url_scheme {
            UrlScheme::Neptune => {
                let participant_id = self.get_or_empty("participant_id")?;
                let survey_id = self.get_or_empty("survey_id")?;
                if self.check_preview("participant_id", &participant_id)
                    || self.check_preview("survey_id", &survey_id)
                {
                    return Ok(SyncTarget::Preview);
                }

                let domain = config.domain();
                if domain.is_empty() {
                    return Ok(SyncTarget::Skip);
                }
                Ok(SyncTarget::Url(participant_data_url(
                    domain,
                    &participant_id,
                    &survey_id,
                    key,
                    value,
                )))
            }
            // The page-level layout sends the page's own variable/value pair
            UrlScheme::Yosemite => self.page_target(),
        }
    }

    /// Build the page-level URL from the page's embedded fields
    pub fn page_target(&self) -> Result<SyncTarget> {
        let mut pairs = Vec::with_capacity(PAGE_FIELDS.len());
        let mut preview = false;
        for field in PAGE_FIELDS {
            let value = self.get_or_empty(field)?;
            preview |= self.check_preview(field, &value);
            pairs.push((field, value));
        }

        if preview {
            return Ok(SyncTarget::Preview);
        }

        let domain = self.context.config().domain();
        if domain.is_empty() {
            return Ok(SyncTarget::Skip);
        }
        Ok(SyncTarget::Url(page_data_url(domain, &pairs)))
    }
}
