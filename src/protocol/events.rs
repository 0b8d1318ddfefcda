//! Streamed protocol updates and the request envelope.

use super::types::{Artifact, Message, Metadata, Task, TaskState, TaskStatus};
use serde::{Deserialize, Serialize};

/// Status change of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// Task the update belongs to.
    pub task_id: String,
    /// Conversation the task belongs to.
    pub context_id: String,
    /// New status.
    pub status: TaskStatus,
    /// Whether this is the last update for the task.
    #[serde(rename = "final", default)]
    pub is_final: bool,
    /// Update metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl TaskStatusUpdateEvent {
    /// Create a status update.
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        state: TaskState,
        message: Option<Message>,
        is_final: bool,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(state, message),
            is_final,
            metadata: None,
        }
    }
}

/// Artifact content written to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// Task the update belongs to.
    pub task_id: String,
    /// Conversation the task belongs to.
    pub context_id: String,
    /// Artifact content.
    pub artifact: Artifact,
    /// Append to the existing artifact instead of replacing it.
    #[serde(default)]
    pub append: bool,
    /// Last chunk of this artifact.
    #[serde(default)]
    pub last_chunk: bool,
    /// Update metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Anything a peer can deliver in response to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WireEvent {
    /// A direct message reply, no task involved.
    Message(Message),
    /// A full task snapshot.
    Task(Task),
    /// A status change.
    StatusUpdate(TaskStatusUpdateEvent),
    /// Artifact content.
    ArtifactUpdate(TaskArtifactUpdateEvent),
    /// Any event kind this bridge does not know.
    #[serde(other)]
    Unknown,
}

impl WireEvent {
    /// Metadata attached to the event itself.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Message(m) => m.metadata.as_ref(),
            Self::Task(t) => t.metadata.as_ref(),
            Self::StatusUpdate(u) => u.metadata.as_ref(),
            Self::ArtifactUpdate(u) => u.metadata.as_ref(),
            Self::Unknown => None,
        }
    }

    /// Task id carried by the event, when any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Message(m) => m.task_id.as_deref(),
            Self::Task(t) => Some(&t.id),
            Self::StatusUpdate(u) => Some(&u.task_id),
            Self::ArtifactUpdate(u) => Some(&u.task_id),
            Self::Unknown => None,
        }
    }

    /// Context id carried by the event, when any.
    pub fn context_id(&self) -> Option<&str> {
        match self {
            Self::Message(m) => m.context_id.as_deref(),
            Self::Task(t) => Some(&t.context_id),
            Self::StatusUpdate(u) => Some(&u.context_id),
            Self::ArtifactUpdate(u) => Some(&u.context_id),
            Self::Unknown => None,
        }
    }

    /// Task state carried by the event, when any.
    pub fn state(&self) -> Option<TaskState> {
        match self {
            Self::Task(t) => Some(t.status.state),
            Self::StatusUpdate(u) => Some(u.status.state),
            _ => None,
        }
    }

    /// Whether this update closes the task stream.
    pub fn is_final(&self) -> bool {
        match self {
            Self::StatusUpdate(u) => u.is_final,
            Self::Task(t) => t.status.state.ends_invocation(),
            Self::Message(_) => true,
            _ => false,
        }
    }
}

impl From<TaskStatusUpdateEvent> for WireEvent {
    fn from(event: TaskStatusUpdateEvent) -> Self {
        Self::StatusUpdate(event)
    }
}

impl From<TaskArtifactUpdateEvent> for WireEvent {
    fn from(event: TaskArtifactUpdateEvent) -> Self {
        Self::ArtifactUpdate(event)
    }
}

/// Options for a send request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConfiguration {
    /// Wait for the task to finish before answering.
    #[serde(default)]
    pub blocking: bool,
    /// Number of history messages to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
}

/// A message send request, used for both blocking and streaming calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// The message to send.
    pub message: Message,
    /// Request options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendConfiguration>,
    /// Request metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl SendMessageRequest {
    /// Wrap a message in a request with no options.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            configuration: None,
            metadata: None,
        }
    }
}
