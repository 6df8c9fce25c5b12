use super::common;

#[tokio::test]
async fn e2e_list_tools_is_empty_with_no_manifest() {
    let base_url = common::spawn_app().await;

    let tools: Vec<serde_json::Value> = reqwest::get(format!("{base_url}/tooling/tools"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(tools.is_empty());
}

#[tokio::test]
async fn e2e_unknown_tool_schema_is_404() {
    let base_url = common::spawn_app().await;

    let status = reqwest::get(format!("{base_url}/tooling/tools/nope"))
        .await
        .unwrap()
        .status();

    assert_eq!(status, 404);
}

#[tokio::test]
async fn e2e_invoke_unknown_tool_is_200_with_failure_outcome() {
    let base_url = common::spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base_url}/tooling/tools/nope/invoke"))
        .json(&serde_json::json!({"args": {}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let outcome: serde_json::Value = response.json().await.unwrap();
    assert_eq!(outcome["success"], false);
    assert!(outcome["error"].as_str().unwrap().contains("nope"));
}
