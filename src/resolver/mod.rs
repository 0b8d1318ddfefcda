//! Task-state resolution.
//!
//! Every invocation ends in exactly one terminal status update. The state is
//! chosen by strict priority:
//!
//! ```text
//!   recorded failure  >  input-required message  >  completed
//! ```
//!
//! Actions seen during the run are folded into the terminal update's
//! metadata: escalate is OR'd across events, transfer-to-agent keeps the last
//! target.

use crate::event::Event;
use crate::metadata;
use crate::protocol::{
    Artifact, Message, Metadata, Role, TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent, WirePart,
};
use serde_json::Value;

/// The failure that decides a failed terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Error code, when the failing event carried one.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

/// Per-invocation terminal state resolver.
#[derive(Debug, Default)]
pub struct TaskStateResolver {
    failure: Option<Failure>,
    escalate: bool,
    transfer_to_agent: Option<String>,
}

impl TaskStateResolver {
    /// Create a resolver with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record errors and actions of an engine event.
    pub fn record(&mut self, event: &Event) {
        if event.is_error() {
            let message = event
                .error_message
                .clone()
                .or_else(|| event.error_code.clone())
                .unwrap_or_default();
            self.record_failure(event.error_code.clone(), message);
        }
        self.escalate |= event.actions.escalate;
        if let Some(target) = &event.actions.transfer_to_agent {
            self.transfer_to_agent = Some(target.clone());
        }
    }

    /// Record a failure. Only the first one is kept.
    pub fn record_failure(&mut self, code: Option<String>, message: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(Failure {
                code,
                message: message.into(),
            });
        }
    }

    /// The failure that will decide the terminal, if any.
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Build the terminal status update.
    pub fn resolve(&self, task_id: &str, context_id: &str, input_required: Option<Message>) -> TaskStatusUpdateEvent {
        let (state, message) = match (&self.failure, input_required) {
            (Some(failure), _) => (TaskState::Failed, Some(self.failure_message(failure, task_id, context_id))),
            (None, Some(message)) => (TaskState::InputRequired, Some(message)),
            (None, None) => (TaskState::Completed, None),
        };
        tracing::debug!(task_id, state = %state, "Resolved terminal state");

        let mut update = TaskStatusUpdateEvent::new(task_id, context_id, state, message, true);
        update.metadata = self.actions_metadata();
        update
    }

    /// Build a canceled terminal status update.
    pub fn canceled(&self, task_id: &str, context_id: &str) -> TaskStatusUpdateEvent {
        let mut update = TaskStatusUpdateEvent::new(task_id, context_id, TaskState::Canceled, None, true);
        update.metadata = self.actions_metadata();
        update
    }

    /// Build the empty last-chunk update that closes an open partial artifact.
    pub fn closing_partial_update(&self, task_id: &str, context_id: &str, artifact_id: &str) -> TaskArtifactUpdateEvent {
        let mut meta = Metadata::new();
        meta.insert(metadata::PARTIAL.to_string(), Value::Bool(true));
        TaskArtifactUpdateEvent {
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
            artifact: Artifact {
                artifact_id: artifact_id.to_string(),
                name: None,
                parts: Vec::new(),
                metadata: None,
            },
            append: true,
            last_chunk: true,
            metadata: Some(meta),
        }
    }

    fn failure_message(&self, failure: &Failure, task_id: &str, context_id: &str) -> Message {
        let mut message =
            Message::new(Role::Agent, vec![WirePart::text(failure.message.clone())]).for_task(task_id, context_id);
        if let Some(code) = &failure.code {
            let mut meta = Metadata::new();
            meta.insert(metadata::ERROR_CODE.to_string(), Value::String(code.clone()));
            message.metadata = Some(meta);
        }
        message
    }

    fn actions_metadata(&self) -> Option<Metadata> {
        let mut meta = Metadata::new();
        if self.escalate {
            meta.insert(metadata::ESCALATE.to_string(), Value::Bool(true));
        }
        if let Some(target) = &self.transfer_to_agent {
            meta.insert(metadata::TRANSFER_TO_AGENT.to_string(), Value::String(target.clone()));
        }
        (!meta.is_empty()).then_some(meta)
    }
}
