//! Telegram notifier against a mock Bot API

use sysmon_stream::{
    config::TelegramConfig,
    notifier::{AlertPayload, Notifier},
    telegram::TelegramNotifier,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn notifier_for(server: &MockServer) -> TelegramNotifier {
    TelegramNotifier::new(&TelegramConfig {
        bot_token: "123:abc".to_string(),
        chat_id: "-1001".to_string(),
        api_url: server.uri(),
    })
    .unwrap()
}

fn alert() -> AlertPayload {
    AlertPayload {
        emoji: "🚨".to_string(),
        title: "Disk ALERT".to_string(),
        date: "2024-01-01 00:00:00".to_string(),
        hostname: "test-host".to_string(),
        ip: "127.0.0.1".to_string(),
        uptime: "1h 0m".to_string(),
        metrics: vec!["💾 Disk: 93.0% of 100G".to_string()],
        processes: None,
    }
}

#[tokio::test]
async fn test_accepted_message_returns_true() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .and(body_partial_json(serde_json::json!({
            "chat_id": "-1001",
            "text": "hello",
            "parse_mode": "HTML",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(notifier_for(&server).send_message("hello").await);
}

#[tokio::test]
async fn test_rejected_message_returns_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"ok": false, "description": "chat not found"})),
        )
        .mount(&server)
        .await;

    assert!(!notifier_for(&server).send_message("hello").await);
}

#[tokio::test]
async fn test_unreachable_api_returns_false() {
    let server = MockServer::start().await;
    let notifier = notifier_for(&server);
    drop(server);

    assert!(!notifier.send_message("hello").await);
}

#[tokio::test]
async fn test_formatted_alert_is_sent_as_pre_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123:abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(notifier_for(&server).send_formatted_alert(&alert()).await);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.starts_with("<pre>┌"));
    assert!(text.ends_with("┘</pre>"));
    assert!(text.contains("🚨 Disk ALERT"));
    assert!(text.contains("💾 Disk: 93.0% of 100G"));
}
