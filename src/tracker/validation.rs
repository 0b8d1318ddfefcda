//! Validation of answers to pending long-running calls.

use crate::event::{Event, Part};
use crate::metadata;
use crate::protocol::TaskState;
use serde_json::Value;
use std::collections::HashSet;

/// Error text for a call the outgoing request does not answer.
pub fn missing_input_error(call_id: &str) -> String {
    format!("no input provided for call {}", call_id)
}

/// Check an outgoing request against the previous input-required reply.
///
/// Returns a validation event when `outgoing_parts` lacks a function response
/// for any long-running call of `previous`. The event re-carries the
/// previous content, long-running ids and task/context ids so that the
/// input-required state propagates unchanged, and lists validation errors
/// (previous ones first, each at most once) under `a2a:validation_errors`.
///
/// Returns `None` when there is nothing to validate or every call is answered.
pub fn validate_pending_input(agent_name: &str, previous: Option<&Event>, outgoing_parts: &[Part]) -> Option<Event> {
    let previous = previous?;
    if previous.custom_str(metadata::TASK_STATE) != Some(TaskState::InputRequired.as_str()) {
        return None;
    }

    let answered: HashSet<&str> = outgoing_parts
        .iter()
        .filter_map(Part::as_function_response)
        .map(|response| response.id.as_str())
        .collect();
    let missing: Vec<&str> = previous
        .parts()
        .iter()
        .filter_map(Part::as_function_call)
        .filter(|call| previous.is_long_running(&call.id) && !answered.contains(call.id.as_str()))
        .map(|call| call.id.as_str())
        .collect();
    if missing.is_empty() {
        return None;
    }

    let mut errors = metadata::string_list(previous, metadata::VALIDATION_ERRORS);
    for id in &missing {
        let error = missing_input_error(id);
        if !errors.contains(&error) {
            errors.push(error);
        }
    }
    tracing::warn!(agent = agent_name, missing = ?missing, "Request does not answer pending calls");

    let mut event = Event::new(agent_name).with_invocation_id(previous.invocation_id.clone());
    event.branch = previous.branch.clone();
    event.content = previous.content.clone();
    event.long_running_tool_ids = previous.long_running_tool_ids.clone();
    event.turn_complete = true;
    for key in [metadata::TASK_ID, metadata::CONTEXT_ID] {
        if let Some(value) = previous.custom_metadata.get(key) {
            event.custom_metadata.insert(key.to_string(), value.clone());
        }
    }
    event.custom_metadata.insert(
        metadata::TASK_STATE.to_string(),
        Value::String(TaskState::InputRequired.as_str().to_string()),
    );
    event.custom_metadata.insert(
        metadata::VALIDATION_ERRORS.to_string(),
        Value::Array(errors.into_iter().map(Value::String).collect()),
    );
    Some(event)
}
