//! Integration tests for common rebound workflows.
//!
//! These tests drive the facade crate the way an application would.

use rebound::prelude::*;
use rebound::{ContentError, DRAIN_LIMIT, Settings, header};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn quick_retries() -> ClientConfigBuilder {
    ClientConfig::builder().retry(RetryConfig::immediate(3))
}

// =============================================================================
// Request Workflows
// =============================================================================

#[tokio::test]
async fn test_get_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1, "name": "ada"})),
        )
        .mount(&server)
        .await;

    let client = Client::new(quick_retries().build().unwrap()).unwrap();
    let response = client
        .get(format!("{}/users/1", server.uri()))
        .send()
        .await
        .unwrap();

    assert!(response.is_success());
    assert!(response.ensure_header(header::CONTENT_TYPE, &["application/json"]).is_ok());

    let user: serde_json::Value = response.json().await.unwrap();
    assert_eq!(user["name"], "ada");
}

#[tokio::test]
async fn test_prebuilt_request_sent_twice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::new(quick_retries().build().unwrap()).unwrap();
    let request = Request::new(Method::POST, &server.uri())
        .unwrap()
        .with_body(Body::text("payload"));

    for _ in 0..2 {
        let mut response = client.execute(&request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        response.close().await;
    }
}

#[tokio::test]
async fn test_expect_status_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;

    let client = Client::new(quick_retries().build().unwrap()).unwrap();
    let err = client
        .get(server.uri())
        .send()
        .await
        .unwrap()
        .expect_status(StatusCode::CREATED)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::OK));
    assert_eq!(err.status_error().unwrap().data.as_ref(), b"fine");
}

#[tokio::test]
async fn test_content_type_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&server)
        .await;

    let client = Client::new(quick_retries().build().unwrap()).unwrap();
    let mut response = client.get(server.uri()).send().await.unwrap();

    let err: ContentError = response
        .ensure_header(header::CONTENT_TYPE, &["application/json"])
        .unwrap_err();
    assert_eq!(err.value, "text/html");
    response.close().await;
}

// =============================================================================
// Hooks
// =============================================================================

#[tokio::test]
async fn test_status_error_hook_stops_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let config = quick_retries().error_response_hook(StatusErrorHook).build().unwrap();
    let client = Client::new(config).unwrap();

    let err = client.get(server.uri()).send().await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.status_error().unwrap().data.as_ref(), b"maintenance");
}

#[tokio::test]
async fn test_whole_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = Client::new(quick_retries().build().unwrap()).unwrap();
    let err = client
        .get(server.uri())
        .timeout(Duration::from_millis(200))
        .send()
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_client_from_settings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(DRAIN_LIMIT * 2)))
        .expect(2)
        .mount(&server)
        .await;

    let settings = Settings::from_toml_str(
        r#"
        max_attempts = 2
        timeout_ms = 5000

        [default_headers]
        x-client = "settings"
        "#,
    )
    .unwrap();
    let mut config = settings.into_config().unwrap();
    config.retry.backoff = BackoffStrategy::None;

    let client = Client::new(config).unwrap();
    let response = client.get(server.uri()).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    for request in server.received_requests().await.unwrap() {
        assert_eq!(request.headers["x-client"], "settings");
    }
}

#[cfg(feature = "log")]
#[test]
fn test_log_config_from_lookup() {
    let config = rebound::rebound_log::LogConfig::from_lookup(|name| match name {
        "REBOUND_LOG_LEVEL" => Some("debug".to_string()),
        _ => None,
    });
    assert_eq!(config.level, rebound::rebound_log::Level::Debug);
}
