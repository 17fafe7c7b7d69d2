//! Telegram client against a mock Bot API.

use std::path::PathBuf;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vrelay_delivery::{Deliverer, DeliveryError, TelegramClient, TelegramConfig};
use vrelay_models::{Control, DeliveryMode, DeliveryOptions};

const TOKEN: &str = "123:test";

fn client(server: &MockServer, max_file_size: u64) -> TelegramClient {
    let mut config = TelegramConfig::new(TOKEN);
    config.api_url = server.uri();
    config.max_file_size = max_file_size;
    config.max_retries = 2;
    TelegramClient::new(config).unwrap()
}

fn endpoint(method_name: &str) -> String {
    format!("/bot{}/{}", TOKEN, method_name)
}

fn sent(message_id: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ok": true,
        "result": {"message_id": message_id, "chat": {"id": 42}, "date": 0}
    }))
}

fn video_file(dir: &tempfile::TempDir, bytes: usize) -> PathBuf {
    let path = dir.path().join("final.mp4");
    std::fs::write(&path, vec![0u8; bytes]).unwrap();
    path
}

#[tokio::test]
async fn small_video_is_streamed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendVideo")))
        .and(body_string_contains("supports_streaming"))
        .and(body_string_contains("inline_keyboard"))
        .respond_with(sent(77))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir, 1024);
    let options = DeliveryOptions {
        caption: Some("Holiday".to_string()),
        controls: vec![Control::new("Open", "https://example.com")],
        duration: Some(12),
        ..Default::default()
    };

    let receipt = client(&server, 1024 * 1024)
        .deliver(&video, "42", &options)
        .await
        .unwrap();

    assert_eq!(receipt.message_id, "77");
    assert_eq!(receipt.chat_id, "42");
    assert_eq!(receipt.mode, DeliveryMode::Streaming);
}

#[tokio::test]
async fn oversized_video_falls_back_to_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendVideo")))
        .respond_with(sent(1))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendDocument")))
        .and(body_string_contains("Download to play with full streaming support."))
        .respond_with(sent(90))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendMessage")))
        .and(body_string_contains("faststart enabled"))
        .respond_with(sent(91))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir, 4096);
    let options = DeliveryOptions {
        caption: Some("Big one".to_string()),
        ..Default::default()
    };

    let receipt = client(&server, 1024).deliver(&video, "42", &options).await.unwrap();
    assert_eq!(receipt.mode, DeliveryMode::Document);
    assert_eq!(receipt.message_id, "90");
}

#[tokio::test]
async fn rejected_upload_falls_back_and_hint_failure_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendVideo")))
        .respond_with(ResponseTemplate::new(413).set_body_string("Request Entity Too Large"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendDocument")))
        .respond_with(sent(5))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendMessage")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false, "error_code": 400, "description": "Bad Request: message to reply not found"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video = video_file(&dir, 100);

    let receipt = client(&server, 1024 * 1024)
        .deliver(&video, "42", &DeliveryOptions::default())
        .await
        .unwrap();
    assert_eq!(receipt.mode, DeliveryMode::Document);
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendMessage")))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false, "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": {"retry_after": 0}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendMessage")))
        .respond_with(sent(3))
        .expect(1)
        .mount(&server)
        .await;

    let message = client(&server, 1024).send_message("42", "hi", None).await.unwrap();
    assert_eq!(message.message_id, 3);
}

#[tokio::test]
async fn bad_token_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint("getMe")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false, "error_code": 401, "description": "Unauthorized"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 1024).health_check().await.unwrap_err();
    assert!(matches!(err, DeliveryError::Unauthenticated(_)));
}

#[tokio::test]
async fn failure_notification_is_escaped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(endpoint("sendMessage")))
        .and(body_string_contains("❌ Error: bad &lt;input&gt;"))
        .respond_with(sent(8))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, 1024)
        .notify_failure("42", "bad <input>")
        .await
        .unwrap();
}

#[tokio::test]
async fn get_me_returns_bot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(endpoint("getMe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"id": 9, "is_bot": true, "first_name": "Relay", "username": "relay_bot"}
        })))
        .mount(&server)
        .await;

    let me = client(&server, 1024).get_me().await.unwrap();
    assert_eq!(me.username.as_deref(), Some("relay_bot"));
}
