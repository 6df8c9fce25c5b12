//! Data model (§3): the plain serde-derived types shared by every component.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::message::Message;

/// Identifies one discovered test. Produced by discovery; consumed read-only elsewhere.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestDescriptor {
    pub qualified_name: String,
    pub module: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl TestDescriptor {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        let module = module.into();
        let name = name.into();
        let qualified_name = format!("{module}::{name}");
        Self {
            qualified_name,
            module,
            name,
            docstring: None,
        }
    }
}

/// The structured form of a test's single case, produced when the test function runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct CaseSpec {
    pub prompt: String,
    pub expectations: Vec<String>,
    pub expected_tool_calls: Vec<String>,
}

/// Opaque structured record returned by the user agent collaborator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct AgentResponse {
    pub messages: Vec<Message>,
}

impl AgentResponse {
    /// Multiset of tool-call names observed across every assistant message.
    pub fn observed_tool_call_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for message in &self.messages {
            if let Message::Assistant(content) = message {
                for call in &content.tool_calls {
                    *counts.entry(call.name.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Sum of `token_usage.total` across assistant messages that carry it.
    pub fn total_tokens(&self) -> u64 {
        self.messages
            .iter()
            .filter_map(|m| match m {
                Message::Assistant(c) => c.token_usage.as_ref().map(|u| u.total),
                _ => None,
            })
            .sum()
    }
}

/// Verdict returned by the validator collaborator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidationVerdict {
    pub success: bool,
    pub reasoning: String,
    pub unmet: Vec<String>,
    pub failure_reasons: HashMap<String, String>,
}

/// Classification of a failed [`TestResult`] (§3, §7).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Expectation,
    ToolCall,
    Validation,
    Unexpected,
}

/// One execution outcome of the pipeline (§4.C).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub qualified_name: String,
    pub module: String,
    pub name: String,
    pub passed: bool,
    pub duration_seconds: f64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub expectations: Vec<String>,
    pub unmet: Vec<String>,
    pub failure_reasons: HashMap<String, String>,
    pub prompt: String,
    pub expected_tool_calls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AgentResponse>,
}

/// Status of one test within a [`Job`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Queued,
    Running,
    Passed,
    Failed,
}

/// Status of a [`Job`] as a whole.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// One invocation of the runner over a set of tests.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub tests: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
    pub results: Vec<TestResult>,
    pub test_statuses: HashMap<String, TestStatus>,
}

impl Job {
    /// Re-derives `status` from `test_statuses` per the invariant in §3.
    pub fn recompute_status(&mut self) {
        if self.test_statuses.is_empty() {
            return;
        }
        let any_failed = self
            .test_statuses
            .values()
            .any(|s| *s == TestStatus::Failed);
        let all_passed = self
            .test_statuses
            .values()
            .all(|s| *s == TestStatus::Passed);
        let any_started = self
            .test_statuses
            .values()
            .any(|s| *s != TestStatus::Queued);
        self.status = if any_failed {
            JobStatus::Failed
        } else if all_passed {
            JobStatus::Succeeded
        } else if any_started {
            JobStatus::Running
        } else {
            JobStatus::Queued
        };
    }
}

/// Chat-relay conversation state (§3, §4.G).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub agent_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_is_module_colon_colon_name() {
        let d = TestDescriptor::new("billing", "charges_card");
        assert_eq!(d.qualified_name, "billing::charges_card");
    }

    #[test]
    fn observed_tool_call_counts_is_a_multiset() {
        let response = AgentResponse {
            messages: vec![Message::Assistant(crate::message::AssistantContent {
                content: "".to_string(),
                tool_calls: vec![
                    crate::message::ObservedToolCall {
                        name: "get_weather".to_string(),
                        args: None,
                    },
                    crate::message::ObservedToolCall {
                        name: "get_weather".to_string(),
                        args: None,
                    },
                ],
                token_usage: None,
            })],
        };
        let counts = response.observed_tool_call_counts();
        assert_eq!(counts.get("get_weather"), Some(&2));
    }

    #[test]
    fn job_status_succeeded_iff_all_tests_passed() {
        let mut job = Job {
            id: "j1".to_string(),
            status: JobStatus::Queued,
            tests: vec!["a".to_string(), "b".to_string()],
            created_at: "".to_string(),
            updated_at: "".to_string(),
            error_text: None,
            results: vec![],
            test_statuses: HashMap::from([
                ("a".to_string(), TestStatus::Passed),
                ("b".to_string(), TestStatus::Passed),
            ]),
        };
        job.recompute_status();
        assert_eq!(job.status, JobStatus::Succeeded);

        job.test_statuses.insert("b".to_string(), TestStatus::Failed);
        job.recompute_status();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn job_status_running_while_any_in_flight_and_none_failed() {
        let mut job = Job {
            id: "j1".to_string(),
            status: JobStatus::Queued,
            tests: vec!["a".to_string(), "b".to_string()],
            created_at: "".to_string(),
            updated_at: "".to_string(),
            error_text: None,
            results: vec![],
            test_statuses: HashMap::from([
                ("a".to_string(), TestStatus::Running),
                ("b".to_string(), TestStatus::Queued),
            ]),
        };
        job.recompute_status();
        assert_eq!(job.status, JobStatus::Running);
    }
}
