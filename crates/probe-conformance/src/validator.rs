//! Reply validation.
//!
//! A pure function of (step, reply): no I/O, no state.

use probe_protocol::mcp::{InitializeResult, ToolsCallResult, ToolsListResult};
use probe_protocol::JsonRpcReply;
use probe_types::{ProbeError, StepKind, StepVerdict};
use serde_json::Value;

use crate::error::ConformanceError;
use crate::step::{ConversationStep, Expectation};

/// Judges one reply against the step that triggered it.
pub fn validate(step: &ConversationStep, reply: &JsonRpcReply) -> StepVerdict {
    match check(step, reply) {
        Ok(details) => details
            .into_iter()
            .fold(StepVerdict::pass(step.kind), StepVerdict::with_detail),
        Err(e) => StepVerdict::fail(step.kind, ProbeError::from(e)),
    }
}

/// Returns observed facts on success, the first unmet expectation otherwise.
pub fn check(
    step: &ConversationStep,
    reply: &JsonRpcReply,
) -> Result<Vec<String>, ConformanceError> {
    if reply.id != step.request.id {
        return Err(ConformanceError::IdMismatch {
            step: step.kind,
            expected: step.request.id.clone(),
            actual: reply.id.clone(),
        });
    }

    let result = match (&reply.result, &reply.error) {
        (Some(result), _) => result,
        (None, Some(error)) => {
            return Err(match step.kind {
                StepKind::Negotiate => ConformanceError::NegotiationRejected(error.clone()),
                StepKind::Enumerate => ConformanceError::EnumerationRejected(error.clone()),
                StepKind::Invoke => ConformanceError::InvocationFailed(error.clone()),
            })
        }
        (None, None) => {
            return Err(ConformanceError::MalformedMessage {
                step: step.kind,
                reason: "reply carries neither `result` nor `error`".into(),
                raw: String::new(),
            })
        }
    };

    match (&step.expectation, step.kind) {
        (Expectation::Capability(name), _) => check_capability(step.kind, name, result),
        (Expectation::Result, StepKind::Negotiate) => Ok(negotiation_details(result)),
        (Expectation::Result, StepKind::Invoke) => Ok(invocation_details(result)),
        (Expectation::Result, StepKind::Enumerate) => Ok(Vec::new()),
    }
}

fn check_capability(
    step: StepKind,
    name: &str,
    result: &Value,
) -> Result<Vec<String>, ConformanceError> {
    let listed: ToolsListResult =
        serde_json::from_value(result.clone()).map_err(|e| ConformanceError::MalformedMessage {
            step,
            reason: format!("`result.tools` is not a list of tool descriptors: {e}"),
            raw: result.to_string(),
        })?;

    let names: Vec<String> = listed.names().into_iter().map(str::to_string).collect();
    if listed.find(name).is_none() {
        return Err(ConformanceError::CapabilityNotFound {
            name: name.to_string(),
            available: names,
        });
    }
    Ok(vec![
        format!("tools: {}", names.join(", ")),
        format!("found capability `{name}`"),
    ])
}

fn negotiation_details(result: &Value) -> Vec<String> {
    let Ok(init) = serde_json::from_value::<InitializeResult>(result.clone()) else {
        return vec!["result accepted (unrecognised shape)".to_string()];
    };
    let mut details = Vec::new();
    if let Some(info) = init.server_info {
        details.push(format!("server: {} {}", info.name, info.version).trim_end().to_string());
    }
    if let Some(version) = init.protocol_version {
        details.push(format!("protocol: {version}"));
    }
    details
}

fn invocation_details(result: &Value) -> Vec<String> {
    let Ok(call) = serde_json::from_value::<ToolsCallResult>(result.clone()) else {
        return vec![format!("result: {result}")];
    };
    let mut details: Vec<String> = call
        .texts()
        .into_iter()
        .map(|text| format!("content: {text}"))
        .collect();
    if call.is_error {
        details.push("warning: tool reported isError=true".to_string());
    }
    details
}
