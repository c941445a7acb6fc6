#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::Arc;

use alertbridge::config::ConfigHandle;
use alertbridge::ingress::{ApiState, router};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{Harness, alert_config, alert_json, harness, settings, webhook_json};

async fn app() -> Router {
    let Harness { engine, .. } = harness().await;
    let config = ConfigHandle::new(settings(
        alert_config("http://am:9093"),
        Some("https://chat.example.com"),
    ));
    router(ApiState {
        config: Arc::new(config),
        engine: Arc::new(engine),
    })
}

async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn firing() -> String {
    webhook_json("firing", vec![alert_json("abc123", "firing")]).to_string()
}

fn ack_click(fingerprint: &str) -> String {
    json!({
        "user_id": "u1",
        "post_id": "post-1",
        "context": {"action": "ack", "fingerprint": fingerprint}
    })
    .to_string()
}

#[tokio::test]
async fn health_answers_ok() {
    let app = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn webhook_requires_a_known_token() {
    let app = app().await;
    for uri in ["/api/webhook", "/api/webhook?token=", "/api/webhook?token=nope"] {
        let (status, body) = post(&app, uri, firing()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "missing or unknown token");
    }
}

#[tokio::test]
async fn malformed_webhook_is_a_bad_request() {
    let app = app().await;
    let (status, body) = post(&app, "/api/webhook?token=prod-token", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let empty = webhook_json("firing", Vec::new()).to_string();
    let (status, _) = post(&app, "/api/webhook?token=prod-token", empty).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_returns_per_alert_summary() {
    let app = app().await;
    let (status, body) = post(&app, "/api/webhook?token=prod-token", firing()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"created": 1, "duplicate": 0, "resolved": 0, "failed": 0})
    );

    let (_, again) = post(&app, "/api/webhook?token=prod-token", firing()).await;
    assert_eq!(again["duplicate"], 1);
}

#[tokio::test]
async fn malformed_alert_is_counted_and_siblings_are_processed() {
    let app = app().await;
    let mut broken = alert_json("broken", "firing");
    broken.as_object_mut().unwrap().remove("startsAt");
    let body = webhook_json("firing", vec![alert_json("abc123", "firing"), broken]).to_string();

    let (status, summary) = post(&app, "/api/webhook?token=prod-token", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        summary,
        json!({"created": 1, "duplicate": 0, "resolved": 0, "failed": 1})
    );
}

#[tokio::test]
async fn ack_click_returns_updated_message_and_notice() {
    let app = app().await;
    post(&app, "/api/webhook?token=prod-token", firing()).await;

    let (status, body) = post(&app, "/api/action", ack_click("abc123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ephemeral_text"], "Alert acknowledged by @alice");
    let attachment = &body["update"]["props"]["attachments"][0];
    assert_eq!(attachment["color"], "#9013FE");
    assert_eq!(attachment["actions"][2]["integration"]["context"]["action"], "unack");
}

#[tokio::test]
async fn ack_on_unknown_alert_tells_the_user() {
    let app = app().await;
    let (status, body) = post(&app, "/api/action", ack_click("gone")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["ephemeral_text"],
        "This alert is no longer active, nothing to update"
    );
}

#[tokio::test]
async fn undecodable_actions_are_rejected() {
    let app = app().await;
    let cases = [
        "garbage".to_string(),
        json!({"user_id": "u1"}).to_string(),
        json!({"user_id": "u1", "context": {"action": "reboot", "fingerprint": "abc123"}})
            .to_string(),
        json!({"user_id": "u1", "context": {"action": "silence", "fingerprint": "abc123", "config_id": "prod", "duration": "soon"}})
            .to_string(),
    ];
    for case in cases {
        let (status, body) = post(&app, "/api/action", case.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert_eq!(body["ephemeral_text"], "We could not decode the action");
    }
}
