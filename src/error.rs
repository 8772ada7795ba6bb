//! Error types for the survey bridge
//!
//! Fatal configuration faults surface to the survey author through
//! [`SurveyError`]. Transport failures never leave the notification path.

use thiserror::Error;

/// Errors surfaced to callers of the state store, readiness gate and
/// navigation gate
#[derive(Debug, Error)]
pub enum SurveyError {
    /// A named value (or required host element) is not present on the page
    #[error("could not find embedded data: {key}")]
    MissingElement { key: String },

    /// The real next control has no room below it for the surrogate
    #[error(
        "can't replace next control: margin-bottom is {margin_bottom}px, need at least {required}px"
    )]
    Layout { margin_bottom: i32, required: i32 },

    /// The next control's bottom margin is not a pixel length
    #[error("can't replace next control: margin-bottom '{value}' is not a pixel length")]
    UnreadableMargin { value: String },

    /// Timed hides must always say when the control comes back
    #[error("hiding the next control requires a number of seconds")]
    MissingDuration,

    /// Readiness polling hit its configured ceiling
    #[error("next control did not appear after {attempts} poll attempts")]
    ReadinessTimeout { attempts: u32 },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl SurveyError {
    pub fn missing(key: impl Into<String>) -> Self {
        SurveyError::MissingElement { key: key.into() }
    }
}

/// A probe that did not reach the remote store
#[derive(Debug, Clone, Error, PartialEq)]
#[error("probe to {url} failed: {reason}")]
pub struct SyncTransportFailure {
    pub url: String,
    pub reason: String,
}

impl SyncTransportFailure {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the stratification request
#[derive(Debug, Error)]
pub enum StratifyError {
    #[error("stratify request failed: {0}")]
    Transport(String),

    /// The platform caught an exception and answered with its error sentinel
    #[error("platform rejected the stratify request")]
    Rejected,

    #[error("stratify request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Store(#[from] SurveyError),
}

pub type Result<T> = std::result::Result<T, SurveyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_element_message_names_key() {
        let err = SurveyError::missing("participant_id");
        assert_eq!(err.to_string(), "could not find embedded data: participant_id");
    }

    #[test]
    fn test_layout_message() {
        let err = SurveyError::Layout {
            margin_bottom: 12,
            required: 30,
        };
        assert!(err.to_string().contains("12px"));
        assert!(err.to_string().contains("30px"));
    }
}
