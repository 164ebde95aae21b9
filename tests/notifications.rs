//! Dispatcher-level behavior of the HTTP-backed destinations, driven
//! against a mock server.

use logfan::{Config, DeliveryError, DestinationKind, Logger, Severity};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_logger(server: &MockServer, level: &str) -> Logger {
    let config = Config::from_value(json!({
        "console": { "enabled": false },
        "chat": {
            "enabled": true,
            "level": level,
            "bot_token": "token",
            "chat_id": "42",
            "api_url": format!("{}/sendMessage", server.uri()),
        },
    }))
    .unwrap();
    Logger::new(config, "app").unwrap()
}

#[tokio::test]
async fn routed_records_above_threshold_reach_the_chat_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "chat_id": "42",
            "text": "ERROR: deploy failed",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let logger = chat_logger(&server, "ERROR");
    logger.error("deploy failed").await;
}

#[tokio::test]
async fn records_below_threshold_never_hit_the_network() {
    let server = MockServer::start().await;
    let logger = chat_logger(&server, "ERROR");

    logger.warning("routine warning").await;

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_failing_endpoint_never_fails_the_log_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let logger = chat_logger(&server, "ERROR");
    // Completes normally; the failure stays inside the destination.
    logger.critical("endpoint is down").await;
}

#[tokio::test]
async fn direct_chat_send_bypasses_the_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "text": "maintenance at noon" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let logger = chat_logger(&server, "CRITICAL");
    let result = logger.send_chat("maintenance at noon", None).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn direct_send_to_disabled_chat_is_refused_before_the_network() {
    let server = MockServer::start().await;
    let logger = chat_logger(&server, "ERROR");
    logger.disable(DestinationKind::Chat).await;

    let result = logger.send_chat("should not go out", None).await;

    assert!(matches!(result, Err(DeliveryError::Disabled)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn push_direct_send_returns_one_result_per_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "user": "user-a" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "user": "user-b" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = Config::from_value(json!({
        "console": { "enabled": false },
        "push": {
            "enabled": true,
            "api_url": server.uri(),
            "targets": [
                { "name": "oncall", "user_key": "user-a", "api_token": "t-a" },
                { "name": "team", "user_key": "user-b", "api_token": "t-b" },
            ],
        },
    }))
    .unwrap();
    let logger = Logger::new(config, "app").unwrap();

    let results = logger.send_push("fleet alert", None, None, None).await;

    // Two independent results, one per sub-destination.
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}

#[tokio::test]
async fn push_to_an_unknown_target_fails_without_io() {
    let server = MockServer::start().await;
    let config = Config::from_value(json!({
        "console": { "enabled": false },
        "push": {
            "enabled": true,
            "api_url": server.uri(),
            "targets": [
                { "name": "oncall", "user_key": "user-a", "api_token": "t-a" },
            ],
        },
    }))
    .unwrap();
    let logger = Logger::new(config, "app").unwrap();

    let results = logger
        .send_push("alert", Some("nobody".to_string()), None, None)
        .await;

    assert_eq!(results.len(), 1);
    assert!(matches!(
        &results[0],
        Err(DeliveryError::UnknownTarget(name)) if name == "nobody"
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_all_uses_direct_send_for_network_destinations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let logger = chat_logger(&server, "CRITICAL");
    let results = logger.test_all().await;

    // The chat check went through direct send, unaffected by the
    // CRITICAL threshold.
    assert_eq!(results.get(&DestinationKind::Chat), Some(&true));
    assert_eq!(results.get(&DestinationKind::Console), Some(&false));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn severity_routing_composes_with_runtime_threshold_changes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let logger = chat_logger(&server, "ERROR");

    logger.set_threshold(DestinationKind::Chat, Severity::Critical).await;
    logger.error("now below the bar").await;
    logger.critical("still above it").await;
}
