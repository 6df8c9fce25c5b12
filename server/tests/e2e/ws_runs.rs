//! `WS /testing/ws/runs` (§6, §8 scenario 6): a subscriber sees a snapshot
//! first, then a `job` delta per state change, with no inversion between a
//! test's `running` and terminal delta.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;

use super::common;

#[tokio::test]
async fn e2e_subscriber_sees_snapshot_then_job_deltas_in_order() {
    let base_url = common::spawn_app().await;
    let url = common::ws_url(&base_url, "/testing/ws/runs");

    let (ws, _) = connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    let first = timeout(Duration::from_secs(5), read.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
    assert_eq!(first["type"], "snapshot");

    let client = reqwest::Client::new();
    let created: serde_json::Value = client
        .post(format!("{base_url}/testing/runs"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = created["id"].as_str().unwrap().to_string();

    let mut saw_running = false;
    let mut saw_succeeded = false;
    for _ in 0..20 {
        let msg = timeout(Duration::from_secs(5), read.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Some(text) = msg.to_text().ok() else { continue };
        let event: serde_json::Value = serde_json::from_str(text).unwrap();
        if event["type"] != "job" || event["job"]["id"] != job_id {
            continue;
        }
        match event["job"]["status"].as_str().unwrap() {
            "running" => saw_running = true,
            "succeeded" => {
                // The job must have been seen running before it terminates,
                // and once terminal this subscriber is done.
                assert!(saw_running, "job reached succeeded before any running delta");
                saw_succeeded = true;
                break;
            }
            "failed" => panic!("job unexpectedly failed"),
            _ => {}
        }
    }
    assert!(saw_succeeded, "never observed a succeeded delta for the created job");

    let _ = write.close().await;
}
