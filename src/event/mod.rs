//! Internal invocation-event model.
//!
//! An [`Event`] is the unit of agent output for one step. The invocation
//! engine creates one for every emitted unit of work (model token batch, tool
//! result, callback override). Once handed to the bridge an event is treated
//! as immutable: the bridge derives new events but never edits a delivered one.

mod part;

pub use part::{Blob, CodeExecutionResult, ExecutableCode, FileData, FunctionCall, FunctionResponse, Part};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Role given to content authored by the caller.
pub const ROLE_USER: &str = "user";

/// Role given to content authored by an agent.
pub const ROLE_MODEL: &str = "model";

/// Ordered content parts with the role that produced them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    /// Producer role (`user` or `model`).
    pub role: String,
    /// Content parts in order.
    pub parts: Vec<Part>,
}

impl Content {
    /// Create content with the given role and parts.
    pub fn new(role: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            role: role.into(),
            parts,
        }
    }

    /// Create user content.
    pub fn user(parts: Vec<Part>) -> Self {
        Self::new(ROLE_USER, parts)
    }

    /// Create model content.
    pub fn model(parts: Vec<Part>) -> Self {
        Self::new(ROLE_MODEL, parts)
    }

    /// Whether there are no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Side effects requested by an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventActions {
    /// Escalate control to the parent agent.
    #[serde(default)]
    pub escalate: bool,
    /// Hand the conversation over to another agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_to_agent: Option<String>,
    /// Session state changes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_delta: Map<String, Value>,
}

impl EventActions {
    /// Whether no action is requested.
    pub fn is_empty(&self) -> bool {
        !self.escalate && self.transfer_to_agent.is_none() && self.state_delta.is_empty()
    }
}

/// One unit of agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: String,
    /// Invocation this event belongs to.
    #[serde(default)]
    pub invocation_id: String,
    /// Name of the agent (or `user`) that produced the event.
    pub author: String,
    /// Agent-tree branch, when the engine tracks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Emitted content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    /// Fragment that is not final for this turn.
    #[serde(default)]
    pub partial: bool,
    /// Last event of the turn.
    #[serde(default)]
    pub turn_complete: bool,
    /// Error code, when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Error message, when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Requested side effects.
    #[serde(default)]
    pub actions: EventActions,
    /// Ids of function calls in `content` that complete asynchronously.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub long_running_tool_ids: Vec<String>,
    /// Citation metadata from the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_metadata: Option<Value>,
    /// Grounding metadata from the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<Value>,
    /// Token usage metadata from the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Value>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_metadata: Map<String, Value>,
}

impl Event {
    /// Create an empty event for the given author.
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: String::new(),
            author: author.into(),
            branch: None,
            content: None,
            partial: false,
            turn_complete: false,
            error_code: None,
            error_message: None,
            actions: EventActions::default(),
            long_running_tool_ids: Vec::new(),
            citation_metadata: None,
            grounding_metadata: None,
            usage_metadata: None,
            custom_metadata: Map::new(),
        }
    }

    /// Create an error-bearing event.
    pub fn error(author: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut event = Self::new(author);
        event.error_code = Some(code.into());
        event.error_message = Some(message.into());
        event.turn_complete = true;
        event
    }

    /// Set the content.
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = Some(content);
        self
    }

    /// Set model content built from parts.
    pub fn with_parts(self, parts: Vec<Part>) -> Self {
        self.with_content(Content::model(parts))
    }

    /// Mark the event as a partial fragment.
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = partial;
        self
    }

    /// Set the invocation id.
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = invocation_id.into();
        self
    }

    /// Mark function call ids as long-running.
    pub fn with_long_running_tool_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.long_running_tool_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Content parts, empty when there is no content.
    pub fn parts(&self) -> &[Part] {
        self.content.as_ref().map(|c| c.parts.as_slice()).unwrap_or(&[])
    }

    /// Whether the event carries at least one part.
    pub fn has_content(&self) -> bool {
        !self.parts().is_empty()
    }

    /// Whether the event reports a failure.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some() || self.error_message.is_some()
    }

    /// Whether every part is text or thought (and there is at least one).
    pub fn is_text_only(&self) -> bool {
        self.has_content() && self.parts().iter().all(Part::is_text)
    }

    /// Whether a function call id is declared long-running on this event.
    pub fn is_long_running(&self, call_id: &str) -> bool {
        self.long_running_tool_ids.iter().any(|id| id == call_id)
    }

    /// Look up a custom metadata string value.
    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom_metadata.get(key).and_then(Value::as_str)
    }
}
