//! Integration tests against a mock platform server

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use survey_bridge::config::Config;
use survey_bridge::error::StratifyError;
use survey_bridge::host::MemoryDocument;
use survey_bridge::host::memory::RecordingEngine;
use survey_bridge::runtime::PageRuntime;
use survey_bridge::stratify::{CONDITION_KEY, Stratifier, StratifyRequest};
use survey_bridge::sync::{HttpProbeSender, NotificationSender, SyncOutcome};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{PARTICIPANT, SURVEY, render_page};

const DATA_PATH: &str = "/api/participants/Participant_abc/data/cross_site.gif";

fn runtime_for(server: &MockServer) -> (PageRuntime, MemoryDocument) {
    let mut config = Config::default();
    config.set_domain(&server.uri());
    config.set_program("prog-1");

    let document = MemoryDocument::new();
    render_page(&document, "45px");
    let engine = Arc::new(RecordingEngine::new());
    let runtime = PageRuntime::builder(Arc::new(document.clone()), engine)
        .config(config)
        .build()
        .unwrap();
    (runtime, document)
}

fn stratify_request() -> StratifyRequest {
    StratifyRequest {
        user: "u-7".to_string(),
        program: "prog-1".to_string(),
        name: "arm".to_string(),
        proportions: json!({"control": 1, "treatment": 1}),
        attributes: json!({}),
    }
}

/// Test that a probe succeeds on any non-error status
#[tokio::test]
async fn test_probe_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sender = HttpProbeSender::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}{}?survey_id={}&k=v", server.uri(), DATA_PATH, SURVEY);

    assert!(sender.probe(&url).await.is_ok());
}

/// Test that an error status counts as a failed load
#[tokio::test]
async fn test_probe_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sender = HttpProbeSender::new(Duration::from_secs(5)).unwrap();
    let url = format!("{}{}", server.uri(), DATA_PATH);

    let failure = sender.probe(&url).await.unwrap_err();
    assert_eq!(failure.url, url);
}

/// Test that an unreachable host is a transport failure, not a panic
#[tokio::test]
async fn test_probe_connection_refused() {
    let sender = HttpProbeSender::new(Duration::from_secs(2)).unwrap();
    assert!(sender.probe("http://127.0.0.1:9/gone").await.is_err());
}

/// Test a write travelling all the way to the platform
#[tokio::test]
async fn test_write_reaches_platform() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("survey_id", SURVEY))
        .and(query_param("blocked_nav_count", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (runtime, _document) = runtime_for(&server);
    runtime.set_data("blocked_nav_count", "1").unwrap();

    assert_eq!(
        runtime.flush().await,
        vec![SyncOutcome::Delivered { attempts: 1 }]
    );
}

/// Test that a flaky platform is retried
#[tokio::test]
async fn test_write_retried_after_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (runtime, _document) = runtime_for(&server);
    runtime.set_data("participant_id", PARTICIPANT).unwrap();

    assert_eq!(
        runtime.flush().await,
        vec![SyncOutcome::Delivered { attempts: 3 }]
    );
    assert_eq!(runtime.stats().probes_sent, 3);
}

/// Test that the assigned condition is stored
#[tokio::test]
async fn test_stratify_stores_condition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stratify"))
        .and(query_param("user", "u-7"))
        .and(query_param("name", "arm"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"treatment\""))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (runtime, document) = runtime_for(&server);
    document.add_embedded_data(CONDITION_KEY, "");

    let condition = runtime.stratify(&stratify_request()).await.unwrap();

    assert_eq!(condition, "treatment");
    assert_eq!(runtime.data(CONDITION_KEY).unwrap().as_deref(), Some("treatment"));
}

/// Test that the error sentinel is reported as a rejection
#[tokio::test]
async fn test_stratify_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stratify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"__ERROR__\""))
        .mount(&server)
        .await;

    let (runtime, document) = runtime_for(&server);
    document.add_embedded_data(CONDITION_KEY, "");

    let err = runtime.stratify(&stratify_request()).await.unwrap_err();
    assert!(matches!(err, StratifyError::Rejected));
    assert_eq!(runtime.data(CONDITION_KEY).unwrap().as_deref(), Some(""));
}

/// Test that a slow stratifier is abandoned
#[tokio::test]
async fn test_stratify_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stratify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("\"control\"")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let stratifier = Stratifier::new(&server.uri())
        .unwrap()
        .with_timeout(Duration::from_millis(200));

    let err = stratifier.request(&stratify_request()).await.unwrap_err();
    assert!(matches!(err, StratifyError::Timeout(_)));
}

/// Test that a missing condition element is reported after a good answer
#[tokio::test]
async fn test_stratify_without_condition_element() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stratify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"control\""))
        .mount(&server)
        .await;

    let (runtime, _document) = runtime_for(&server);

    let err = runtime.stratify(&stratify_request()).await.unwrap_err();
    assert!(matches!(err, StratifyError::Store(_)));
}
