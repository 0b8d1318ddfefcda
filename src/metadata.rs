//! Metadata key namespacing.
//!
//! Two namespaces never collide:
//!
//! ```text
//!   internal Event ──(abk_*)──▶ wire metadata ──(a2a:*)──▶ internal custom_metadata
//! ```
//!
//! Keys the bridge writes into wire metadata use the `abk_` prefix. Values
//! copied back from wire metadata into an event's `custom_metadata` use the
//! `a2a:` prefix.

use crate::event::Event;
use crate::protocol::Metadata;
use serde_json::Value;

/// Prefix of bridge-injected wire metadata keys.
pub const WIRE_PREFIX: &str = "abk_";

/// Prefix of internal custom metadata keys copied from the wire.
pub const INTERNAL_PREFIX: &str = "a2a:";

/// Wire: internal part kind of a data part.
pub const TYPE: &str = "abk_type";
/// Wire: function call completes asynchronously.
pub const IS_LONG_RUNNING: &str = "abk_is_long_running";
/// Wire: text part is model reasoning.
pub const THOUGHT: &str = "abk_thought";
/// Wire: artifact update is an ephemeral fragment.
pub const PARTIAL: &str = "abk_partial";
/// Wire: receiver must relay the event without aggregation.
pub const NO_AGGREGATION: &str = "abk_no_aggregation";
/// Wire: escalate action on the terminal update.
pub const ESCALATE: &str = "abk_escalate";
/// Wire: transfer-to-agent action on the terminal update.
pub const TRANSFER_TO_AGENT: &str = "abk_transfer_to_agent";
/// Wire: originating invocation id.
pub const INVOCATION_ID: &str = "abk_invocation_id";
/// Wire: originating author.
pub const AUTHOR: &str = "abk_author";
/// Wire: originating branch.
pub const BRANCH: &str = "abk_branch";
/// Wire: model citation metadata.
pub const CITATION_METADATA: &str = "abk_citation_metadata";
/// Wire: model grounding metadata.
pub const GROUNDING_METADATA: &str = "abk_grounding_metadata";
/// Wire: model usage metadata.
pub const USAGE_METADATA: &str = "abk_usage_metadata";
/// Wire: originating error code.
pub const ERROR_CODE: &str = "abk_error_code";
/// Wire: originating custom metadata object.
pub const CUSTOM_METADATA: &str = "abk_custom_metadata";

/// Internal: task id of the remote task.
pub const TASK_ID: &str = "a2a:task_id";
/// Internal: context id of the remote task.
pub const CONTEXT_ID: &str = "a2a:context_id";
/// Internal: remote task state when the event was converted.
pub const TASK_STATE: &str = "a2a:task_state";
/// Internal: accumulated validation errors.
pub const VALIDATION_ERRORS: &str = "a2a:validation_errors";

/// Wire keys copied back into internal custom metadata.
const ROUND_TRIP_KEYS: [&str; 8] = [
    INVOCATION_ID,
    AUTHOR,
    BRANCH,
    CITATION_METADATA,
    GROUNDING_METADATA,
    USAGE_METADATA,
    ERROR_CODE,
    CUSTOM_METADATA,
];

/// Internal key for a wire key: `abk_author` becomes `a2a:author`.
pub fn to_internal_key(wire_key: &str) -> String {
    let name = wire_key.strip_prefix(WIRE_PREFIX).unwrap_or(wire_key);
    format!("{}{}", INTERNAL_PREFIX, name)
}

/// Whether a boolean flag is set in optional metadata.
pub fn flag(metadata: Option<&Metadata>, key: &str) -> bool {
    metadata
        .and_then(|m| m.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Wire metadata describing where an event came from.
pub fn event_to_wire(event: &Event) -> Metadata {
    let mut metadata = Metadata::new();
    if !event.invocation_id.is_empty() {
        metadata.insert(INVOCATION_ID.to_string(), Value::String(event.invocation_id.clone()));
    }
    if !event.author.is_empty() {
        metadata.insert(AUTHOR.to_string(), Value::String(event.author.clone()));
    }
    if let Some(branch) = &event.branch {
        metadata.insert(BRANCH.to_string(), Value::String(branch.clone()));
    }
    if let Some(value) = &event.citation_metadata {
        metadata.insert(CITATION_METADATA.to_string(), value.clone());
    }
    if let Some(value) = &event.grounding_metadata {
        metadata.insert(GROUNDING_METADATA.to_string(), value.clone());
    }
    if let Some(value) = &event.usage_metadata {
        metadata.insert(USAGE_METADATA.to_string(), value.clone());
    }
    if let Some(code) = &event.error_code {
        metadata.insert(ERROR_CODE.to_string(), Value::String(code.clone()));
    }
    if !event.custom_metadata.is_empty() {
        metadata.insert(CUSTOM_METADATA.to_string(), Value::Object(event.custom_metadata.clone()));
    }
    metadata
}

/// Copy round-tripped wire metadata into an event.
///
/// Every known `abk_` key lands in `custom_metadata` under its `a2a:` name.
/// Model metadata (citation, grounding, usage) is also restored onto the
/// event's own fields when the event has none. `a2a:` keys relayed inside
/// the custom payload by an intermediate agent are restored at top level.
pub fn apply_wire(event: &mut Event, metadata: &Metadata) {
    for key in ROUND_TRIP_KEYS {
        if let Some(value) = metadata.get(key) {
            event.custom_metadata.insert(to_internal_key(key), value.clone());
        }
    }
    if let Some(Value::Object(custom)) = metadata.get(CUSTOM_METADATA) {
        for (key, value) in custom {
            if key.starts_with(INTERNAL_PREFIX) && !event.custom_metadata.contains_key(key) {
                event.custom_metadata.insert(key.clone(), value.clone());
            }
        }
    }
    if event.citation_metadata.is_none() {
        event.citation_metadata = metadata.get(CITATION_METADATA).cloned();
    }
    if event.grounding_metadata.is_none() {
        event.grounding_metadata = metadata.get(GROUNDING_METADATA).cloned();
    }
    if event.usage_metadata.is_none() {
        event.usage_metadata = metadata.get(USAGE_METADATA).cloned();
    }
}

/// String list stored under a custom metadata key.
pub fn string_list(event: &Event, key: &str) -> Vec<String> {
    event
        .custom_metadata
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}
