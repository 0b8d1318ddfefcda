//! Wire-level task, message and part types.
//!
//! Field names follow the A2A JSON encoding (camelCase, `kind` discriminators).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Free-form metadata attached to wire objects.
pub type Metadata = Map<String, Value>;

/// Lifecycle state of a protocol task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Accepted, not started.
    Submitted,
    /// In progress.
    Working,
    /// Waiting for input from the caller.
    InputRequired,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
    /// Stopped on request.
    Canceled,
    /// Any state this bridge does not recognise.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Working => "working",
            Self::InputRequired => "input-required",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the task can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Whether this state ends an invocation (terminal or waiting for input).
    pub fn ends_invocation(&self) -> bool {
        self.is_terminal() || matches!(self, Self::InputRequired)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The calling side.
    User,
    /// The agent side.
    Agent,
}

/// Wire text part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    /// The text.
    pub text: String,
    /// Part metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// File payload: inline bytes or a URI, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    /// Base64 encoded bytes.
    #[serde(rename_all = "camelCase")]
    Bytes {
        /// Base64 payload.
        bytes: String,
        /// MIME type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// File name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Reference to a file.
    #[serde(rename_all = "camelCase")]
    Uri {
        /// File location.
        uri: String,
        /// MIME type.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// File name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Wire file part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePart {
    /// File payload.
    pub file: FileContent,
    /// Part metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Wire structured-data part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPart {
    /// Structured payload.
    pub data: Map<String, Value>,
    /// Part metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A content part on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WirePart {
    /// Text.
    Text(TextPart),
    /// File bytes or reference.
    File(FilePart),
    /// Structured data.
    Data(DataPart),
    /// A part kind this bridge does not know.
    #[serde(other)]
    Unknown,
}

impl WirePart {
    /// Create a plain text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPart {
            text: text.into(),
            metadata: None,
        })
    }

    /// Part metadata, if any.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Text(p) => p.metadata.as_ref(),
            Self::File(p) => p.metadata.as_ref(),
            Self::Data(p) => p.metadata.as_ref(),
            Self::Unknown => None,
        }
    }
}

/// A message exchanged between caller and agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier.
    pub message_id: String,
    /// Sender.
    pub role: Role,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<WirePart>,
    /// Task this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Conversation this message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Message metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Message {
    /// Create a message with a generated id.
    pub fn new(role: Role, parts: Vec<WirePart>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            role,
            parts,
            task_id: None,
            context_id: None,
            metadata: None,
        }
    }

    /// Attach task and context ids.
    pub fn for_task(mut self, task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.context_id = Some(context_id.into());
        self
    }
}

/// Current status of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Lifecycle state.
    pub state: TaskState,
    /// Optional message explaining the state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    /// Create a status stamped with the current time.
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            message,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// A named, appendable sequence of parts attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact identifier.
    pub artifact_id: String,
    /// Optional name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Content parts.
    #[serde(default)]
    pub parts: Vec<WirePart>,
    /// Artifact metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// The remote-visible unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier.
    pub id: String,
    /// Conversation correlation id.
    pub context_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Artifacts produced so far.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Messages exchanged so far.
    #[serde(default)]
    pub history: Vec<Message>,
    /// Task metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}
