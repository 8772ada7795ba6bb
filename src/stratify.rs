//! Condition assignment through the platform's stratifier
//!
//! The platform answers with the assigned condition as a JSON string, or with
//! an error sentinel when it caught an exception. Slow answers are abandoned
//! so the participant is never kept waiting.

use std::time::Duration;

use log::{debug, error};
use serde::Serialize;
use serde_json::Value;

use crate::error::{StratifyError, SurveyError};
use crate::store::StateStore;

pub const STRATIFY_PATH: &str = "/api/stratify";
pub const ERROR_SENTINEL: &str = "__ERROR__";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Key the assigned condition is stored under
pub const CONDITION_KEY: &str = "condition";

#[derive(Debug, Clone, Serialize)]
pub struct StratifyRequest {
    pub user: String,
    pub program: String,
    pub name: String,
    pub proportions: Value,
    pub attributes: Value,
}

impl StratifyRequest {
    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user", self.user.clone()),
            ("program", self.program.clone()),
            ("name", self.name.clone()),
            ("proportions", self.proportions.to_string()),
            ("attributes", self.attributes.to_string()),
        ]
    }
}

pub struct Stratifier {
    http_client: reqwest::Client,
    domain: String,
    timeout: Duration,
}

impl Stratifier {
    pub fn new(domain: &str) -> Result<Self, SurveyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("survey-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            domain: domain.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.domain, STRATIFY_PATH)
    }

    /// Ask the platform for a condition
    pub async fn request(&self, request: &StratifyRequest) -> Result<String, StratifyError> {
        let url = self.url();
        debug!("Stratifying {} for {}", request.name, request.user);

        let call = async {
            let response = self
                .http_client
                .get(&url)
                .query(&request.query())
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| StratifyError::Transport(e.to_string()))?;

            let body = response
                .text()
                .await
                .map_err(|e| StratifyError::Transport(e.to_string()))?;
            parse_condition(&body)
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => {
                if let Err(err) = &result {
                    error!("Error while stratifying: {}", err);
                }
                result
            }
            Err(_) => {
                error!("Stratify request timed out after {:?}", self.timeout);
                Err(StratifyError::Timeout(self.timeout))
            }
        }
    }

    /// Ask for a condition and store it under [`CONDITION_KEY`]
    pub async fn stratify(
        &self,
        store: &StateStore,
        request: &StratifyRequest,
    ) -> Result<String, StratifyError> {
        let condition = self.request(request).await?;
        store.set(CONDITION_KEY, &condition)?;
        Ok(condition)
    }
}

fn parse_condition(body: &str) -> Result<String, StratifyError> {
    let body = body.trim();
    let condition = serde_json::from_str::<String>(body).unwrap_or_else(|_| body.to_string());

    if condition == ERROR_SENTINEL {
        return Err(StratifyError::Rejected);
    }
    if condition.is_empty() {
        return Err(StratifyError::Transport("empty response".to_string()));
    }
    Ok(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_condition() {
        assert_eq!(parse_condition("\"treatment\"").unwrap(), "treatment");
        assert_eq!(parse_condition(" control \n").unwrap(), "control");
        assert!(matches!(
            parse_condition("\"__ERROR__\""),
            Err(StratifyError::Rejected)
        ));
        assert!(matches!(parse_condition(""), Err(StratifyError::Transport(_))));
    }

    #[test]
    fn test_query_serializes_json_fields() {
        let request = StratifyRequest {
            user: "User_1".to_string(),
            program: "Program_2".to_string(),
            name: "mindset".to_string(),
            proportions: json!({"treatment": 1, "control": 1}),
            attributes: json!({"school": "S1"}),
        };

        let query = request.query();
        assert_eq!(query[3].0, "proportions");
        assert_eq!(query[4].1, r#"{"school":"S1"}"#);
    }

    #[test]
    fn test_url_has_single_slash() {
        let stratifier = Stratifier::new("https://p.org/").unwrap();
        assert_eq!(stratifier.url(), "https://p.org/api/stratify");
    }
}
