//! Exercises §8 scenario 1 ("happy path") end to end over HTTP: discovery
//! finds `m::ping`, a run passes, and the result lands in history.

use std::time::Duration;

use orc_core::{Job, JobStatus, TestResult};
use tokio::time::timeout;

use super::common;

async fn poll_until_terminal(base_url: &str, job_id: &str) -> Job {
    let client = reqwest::Client::new();
    timeout(Duration::from_secs(5), async {
        loop {
            let job: Job = client
                .get(format!("{base_url}/testing/runs/{job_id}"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if matches!(job.status, JobStatus::Succeeded | JobStatus::Failed) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job reached a terminal status")
}

#[tokio::test]
async fn e2e_full_run_succeeds_and_is_recorded_in_history() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    let discovered: serde_json::Value = client
        .get(format!("{base_url}/testing/tests"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(discovered["tests"][0]["qualified_name"], "m::ping");

    let job: Job = client
        .post(format!("{base_url}/testing/runs"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);

    let job = poll_until_terminal(&base_url, &job.id).await;
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.results.len(), 1);
    assert!(job.results[0].passed);
    assert!(job.results[0].error_type.is_none());

    let history: Vec<TestResult> = client
        .get(format!("{base_url}/testing/history/m::ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].passed);

    let latest: std::collections::HashMap<String, TestResult> = client
        .get(format!("{base_url}/testing/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(latest.get("m::ping").is_some());
}

#[tokio::test]
async fn e2e_unknown_test_name_yields_failed_job() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    let job: Job = client
        .post(format!("{base_url}/testing/runs"))
        .json(&serde_json::json!({"tests": ["m::does_not_exist"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_text.unwrap().contains("does_not_exist"));
}

#[tokio::test]
async fn e2e_history_delete_at_shifts_indices_down() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let job: Job = client
            .post(format!("{base_url}/testing/runs"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        poll_until_terminal(&base_url, &job.id).await;
    }

    let before: Vec<TestResult> = client
        .get(format!("{base_url}/testing/history/m::ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before.len(), 3);

    let status = client
        .delete(format!("{base_url}/testing/history/m::ping/1"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, 204);

    let after: Vec<TestResult> = client
        .get(format!("{base_url}/testing/history/m::ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after.len(), 2);

    let missing_index_status = client
        .delete(format!("{base_url}/testing/history/m::ping/99"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(missing_index_status, 404);
}
