//! Thin `reqwest` client over the §6 HTTP surface.
//!
//! Grounded in `examples/ohitslaurence-maestro/crates/loom-cli/src/weaver_client.rs`'s
//! shape: a `base_url` plus a shared `reqwest::Client`, one method per route,
//! `.json(...)` request bodies, and a status check before decoding the body.

use std::collections::HashMap;

use orc_core::tools::{InvokeOutcome, ToolDescription, ToolSummary};
use orc_core::{Job, TestDescriptor, TestResult};
use serde::{Deserialize, Serialize};

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct DiscoveryResponse {
    tests: Vec<TestDescriptor>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct CreateRunBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    tests: Option<Vec<String>>,
}

#[derive(Serialize)]
struct InvokeToolBody {
    args: HashMap<String, String>,
}

impl Client {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, reqwest::Error> {
        self.http.get(self.url(path)).send().await?.error_for_status()?.json().await
    }

    pub async fn list_tests(&self) -> Result<Vec<TestDescriptor>, reqwest::Error> {
        let response: DiscoveryResponse = self.get_json("/testing/tests").await?;
        if let Some(error) = &response.error {
            eprintln!("warning: discovery reported: {error}");
        }
        Ok(response.tests)
    }

    pub async fn create_run(&self, tests: Option<Vec<String>>) -> Result<Job, reqwest::Error> {
        self.http
            .post(self.url("/testing/runs"))
            .json(&CreateRunBody { tests })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    pub async fn history_all(&self) -> Result<HashMap<String, TestResult>, reqwest::Error> {
        self.get_json("/testing/history").await
    }

    pub async fn history_for(&self, qualified_name: &str) -> Result<Vec<TestResult>, reqwest::Error> {
        self.get_json(&format!("/testing/history/{qualified_name}")).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolSummary>, reqwest::Error> {
        self.get_json("/tooling/tools").await
    }

    pub async fn tool_schema(&self, name: &str) -> Result<ToolDescription, reqwest::Error> {
        self.get_json(&format!("/tooling/tools/{name}")).await
    }

    pub async fn invoke_tool(
        &self,
        name: &str,
        args: HashMap<String, String>,
    ) -> Result<InvokeOutcome, reqwest::Error> {
        self.http
            .post(self.url(&format!("/tooling/tools/{name}/invoke")))
            .json(&InvokeToolBody { args })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}
