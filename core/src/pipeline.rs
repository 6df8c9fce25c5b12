//! Execution Pipeline (§4.C): runs exactly one test and produces one
//! [`TestResult`]. Never propagates an error past itself — every fallible
//! step funnels into `ErrorType::Unexpected` (§4.C "Failure semantics").

use std::collections::HashMap;
use std::time::Instant;

use crate::collaborators::{Agent, Validator};
use crate::discovery::Discovery;
use crate::domain::{CaseSpec, ErrorType, TestDescriptor, TestResult};

/// Runs one discovered test to completion. Appending the result to history
/// is the caller's responsibility (§4.D's worker does this after the
/// pipeline returns); this function only produces the result.
pub async fn run_pipeline(
    descriptor: &TestDescriptor,
    discovery: &dyn Discovery,
    agent: &dyn Agent,
    validator: &dyn Validator,
) -> TestResult {
    let started = Instant::now();
    tracing::debug!(qualified_name = %descriptor.qualified_name, "pipeline started");

    let case = match load_single_case(descriptor, discovery).await {
        Ok(case) => case,
        Err(message) => {
            tracing::warn!(qualified_name = %descriptor.qualified_name, "load_case failed: {}", message);
            return unexpected(descriptor, started, String::new(), Vec::new(), message);
        }
    };

    let response = match agent.query(&case.prompt).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(qualified_name = %descriptor.qualified_name, "agent query failed: {}", e);
            return unexpected(
                descriptor,
                started,
                case.prompt,
                case.expected_tool_calls,
                e.to_string(),
            )
        }
    };

    let observed = response.observed_tool_call_counts();
    let tool_call_failed = !is_sub_multiset(&case.expected_tool_calls, &observed);

    let verdict = match validator.judge(&response, &case.expectations).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(qualified_name = %descriptor.qualified_name, "validator failed: {}", e);
            return unexpected(
                descriptor,
                started,
                case.prompt,
                case.expected_tool_calls,
                e.to_string(),
            )
        }
    };

    // Ordering rule (§4.C "Ordering & tie-breaks"): tool-call failure takes
    // precedence over a validator failure.
    let (passed, error_type, unmet) = if tool_call_failed {
        (false, Some(ErrorType::ToolCall), Vec::new())
    } else if !verdict.unmet.is_empty() {
        (false, Some(ErrorType::Expectation), verdict.unmet.clone())
    } else if !verdict.success {
        (false, Some(ErrorType::Validation), Vec::new())
    } else {
        (true, None, Vec::new())
    };

    tracing::debug!(
        qualified_name = %descriptor.qualified_name,
        passed,
        error_type = ?error_type,
        duration_seconds = started.elapsed().as_secs_f64(),
        "pipeline finished"
    );

    TestResult {
        qualified_name: descriptor.qualified_name.clone(),
        module: descriptor.module.clone(),
        name: descriptor.name.clone(),
        passed,
        duration_seconds: started.elapsed().as_secs_f64(),
        total_tokens: response.total_tokens(),
        error_type,
        error_text: None,
        expectations: case.expectations,
        unmet,
        failure_reasons: verdict.failure_reasons,
        prompt: case.prompt,
        expected_tool_calls: case.expected_tool_calls,
        response: Some(response),
    }
}

async fn load_single_case(
    descriptor: &TestDescriptor,
    discovery: &dyn Discovery,
) -> Result<CaseSpec, String> {
    let cases = discovery
        .load_case(descriptor)
        .await
        .map_err(|e| e.to_string())?;
    match cases.len() {
        0 => Err("no case emitted".to_string()),
        1 => Ok(cases.into_iter().next().expect("checked len == 1")),
        _ => Err("multiple cases not supported".to_string()),
    }
}

/// Whether every name in `expected` appears in `observed` at least as many
/// times (§4.C step 4: expected ⊆ observed as multisets).
fn is_sub_multiset(expected: &[String], observed: &HashMap<String, usize>) -> bool {
    let mut expected_counts: HashMap<&str, usize> = HashMap::new();
    for name in expected {
        *expected_counts.entry(name.as_str()).or_insert(0) += 1;
    }
    expected_counts
        .into_iter()
        .all(|(name, count)| observed.get(name).copied().unwrap_or(0) >= count)
}

fn unexpected(
    descriptor: &TestDescriptor,
    started: Instant,
    prompt: String,
    expected_tool_calls: Vec<String>,
    message: String,
) -> TestResult {
    TestResult {
        qualified_name: descriptor.qualified_name.clone(),
        module: descriptor.module.clone(),
        name: descriptor.name.clone(),
        passed: false,
        duration_seconds: started.elapsed().as_secs_f64(),
        total_tokens: 0,
        error_type: Some(ErrorType::Unexpected),
        error_text: Some(message),
        expectations: Vec::new(),
        unmet: Vec::new(),
        failure_reasons: HashMap::new(),
        prompt,
        expected_tool_calls,
        response: None,
    }
}
