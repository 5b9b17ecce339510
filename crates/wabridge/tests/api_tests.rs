//! Handshake, settings, health and outbound send endpoints.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::harness::{ACCESS_TOKEN, PHONE_NUMBER_ID, VERIFY_TOKEN};
use common::{DeliveryBuilder, TestHarness};
use wabridge::config::Config;
use wabridge::db::{conversation_repo, message_repo};

#[tokio::test]
async fn test_handshake_echoes_challenge() {
    let harness = TestHarness::new();
    let uri = format!(
        "/webhook?hub.mode=subscribe&hub.verify_token={}&hub.challenge=1158201444",
        VERIFY_TOKEN
    );
    let (status, body) = harness.get(&uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"1158201444");
}

#[tokio::test]
async fn test_handshake_wrong_token_does_not_echo() {
    let harness = TestHarness::new();
    let (status, body) = harness
        .get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=secret-challenge")
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!String::from_utf8_lossy(&body).contains("secret-challenge"));
}

#[tokio::test]
async fn test_handshake_missing_parameter() {
    let harness = TestHarness::new();
    let (status, _) = harness.get("/webhook?hub.mode=subscribe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handshake_refused_without_configured_token() {
    let harness = TestHarness::with_config(Config::default());
    let (status, _) = harness
        .get("/webhook?hub.mode=subscribe&hub.verify_token=&hub.challenge=1")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_settings_redacts_secrets() {
    let harness = TestHarness::new();
    let (status, bytes) = harness.get("/api/settings/whatsapp").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains(ACCESS_TOKEN));
    assert!(!text.contains(VERIFY_TOKEN));

    let view: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(view["phone_number_id"], PHONE_NUMBER_ID);
    assert_eq!(view["verify_token_configured"], true);
    assert_eq!(view["access_token_configured"], true);
}

#[tokio::test]
async fn test_settings_update_takes_effect() {
    let harness = TestHarness::new();
    let (status, view) = harness
        .send_json(
            "PUT",
            "/api/settings/whatsapp",
            &json!({ "verify_token": "rotated", "phone_number_id": "22222" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phone_number_id"], "22222");

    let (old, _) = harness
        .get("/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1")
        .await;
    assert_eq!(old, StatusCode::FORBIDDEN);

    let (new, body) = harness
        .get("/webhook?hub.mode=subscribe&hub.verify_token=rotated&hub.challenge=2")
        .await;
    assert_eq!(new, StatusCode::OK);
    assert_eq!(body, b"2");
}

#[tokio::test]
async fn test_settings_rejects_non_numeric_phone_id() {
    let harness = TestHarness::new();
    let (status, body) = harness
        .send_json(
            "PUT",
            "/api/settings/whatsapp",
            &json!({ "phone_number_id": "abc" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_health_reports_counters() {
    let harness = TestHarness::new();
    harness
        .post_webhook(
            &DeliveryBuilder::new()
                .image("wamid.h1", "15551234567", "missing")
                .build(),
        )
        .await;

    let (status, bytes) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["ingest"]["deliveries"], 1);
    assert_eq!(health["ingest"]["messages_recorded"], 1);
    assert_eq!(health["ingest"]["media_failures"], 1);
    assert_eq!(health["failures"], 1);
}

#[tokio::test]
async fn test_send_text_records_outgoing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v18.0/10987/messages")
        .match_header("authorization", "Bearer EAAG-test")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"to":"15551234567","type":"text","text":{"body":"Your order shipped"}}"#
                .to_string(),
        ))
        .with_status(200)
        .with_body(
            r#"{"messaging_product":"whatsapp","contacts":[{"input":"15551234567","wa_id":"15551234567"}],"messages":[{"id":"wamid.out1"}]}"#,
        )
        .create_async()
        .await;

    let harness = TestHarness::with_graph_url(&server.url());
    let (status, body) = harness
        .send_json(
            "POST",
            "/api/messages",
            &json!({ "to": "+15551234567", "type": "text", "body": "Your order shipped" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["whatsapp_message_id"], "wamid.out1");
    mock.assert_async().await;

    let row = message_repo::find_by_whatsapp_id(&harness.db, "wamid.out1")
        .unwrap()
        .unwrap();
    assert_eq!(row.direction, "outgoing");
    assert_eq!(row.status, "sent");
    assert_eq!(row.content.as_deref(), Some("Your order shipped"));
    assert!(conversation_repo::find_by_phone(&harness.db, "15551234567")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_send_provider_error_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v18.0/10987/messages")
        .with_status(400)
        .with_body(r#"{"error":{"message":"Re-engagement message","code":131047}}"#)
        .create_async()
        .await;

    let harness = TestHarness::with_graph_url(&server.url());
    let (status, body) = harness
        .send_json(
            "POST",
            "/api/messages",
            &json!({ "to": "15551234567", "type": "text", "body": "late reply" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("Re-engagement"));
    assert_eq!(message_repo::count(&harness.db).unwrap(), 0);
}

#[tokio::test]
async fn test_send_validation_error() {
    let harness = TestHarness::new();
    let (status, _) = harness
        .send_json(
            "POST",
            "/api/messages",
            &json!({ "to": "15551234567", "type": "text", "body": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_without_credentials() {
    let harness = TestHarness::with_config(Config::default());
    let (status, _) = harness
        .send_json(
            "POST",
            "/api/messages",
            &json!({ "to": "15551234567", "type": "text", "body": "hi" }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
