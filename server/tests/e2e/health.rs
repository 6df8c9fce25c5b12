use super::common;

#[tokio::test]
async fn e2e_health_reports_ok() {
    let base_url = common::spawn_app().await;

    let body: serde_json::Value = reqwest::get(format!("{base_url}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
}
