//! Exercises §4.G's per-message protocol over `WS /chatting/ws/conversations/{id}`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::common;

#[tokio::test]
async fn e2e_agent_catalog_lists_default_agent() {
    let base_url = common::spawn_app().await;

    let agents: Vec<serde_json::Value> = reqwest::get(format!("{base_url}/chatting/agents"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(agents.iter().any(|a| a["id"] == "default"));
}

#[tokio::test]
async fn e2e_create_conversation_rejects_unknown_agent() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/chatting/conversations"))
        .json(&serde_json::json!({"agent_id": "nope", "model": "default"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn e2e_send_message_streams_echo_then_human_message_end() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    let conversation: serde_json::Value = client
        .post(format!("{base_url}/chatting/conversations"))
        .json(&serde_json::json!({"agent_id": "default", "model": "default"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = conversation["id"].as_str().unwrap();

    let ws_url = common::ws_url(&base_url, &format!("/chatting/ws/conversations/{id}"));
    let (ws, _) = connect_async(&ws_url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(WsMessage::Text(
            serde_json::json!({"type": "send_message", "content": "hi"}).to_string(),
        ))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    loop {
        let msg = timeout(Duration::from_secs(5), read.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event: serde_json::Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        let kind = event["type"].as_str().unwrap().to_string();
        let done = kind == "message_end";
        kinds.push((kind, event));
        if done {
            break;
        }
    }

    let (first_kind, first_event) = &kinds[0];
    assert_eq!(first_kind, "message");
    assert_eq!(first_event["data"]["role"], "human");
    assert_eq!(first_event["data"]["content"], "hi");

    assert!(kinds.iter().any(|(k, _)| k == "token"));
    assert_eq!(kinds.last().unwrap().0, "message_end");

    // Envelope fields are present on every event (run id stays the conversation id).
    for (_, event) in &kinds {
        assert_eq!(event["run_id"], id);
    }

    let conversation_after: serde_json::Value = client
        .get(format!("{base_url}/chatting/conversations/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversation_after["messages"].as_array().unwrap().len(), 2);
}
