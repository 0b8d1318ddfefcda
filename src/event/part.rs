//! Content parts carried by invocation events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A function call requested by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Call identifier, used to match the response.
    #[serde(default)]
    pub id: String,
    /// Name of the function.
    pub name: String,
    /// Arguments as a JSON object.
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The response to a previously issued function call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Identifier of the call this answers.
    #[serde(default)]
    pub id: String,
    /// Name of the function.
    pub name: String,
    /// Response payload.
    #[serde(default)]
    pub response: Map<String, Value>,
}

/// Source code emitted by a model for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableCode {
    /// Programming language of `code`.
    pub language: String,
    /// The code itself.
    pub code: String,
}

/// The outcome of running [`ExecutableCode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExecutionResult {
    /// Outcome label (e.g. `OUTCOME_OK`).
    pub outcome: String,
    /// Captured output.
    #[serde(default)]
    pub output: String,
}

/// Inline file bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blob {
    /// MIME type of the data.
    pub mime_type: String,
    /// Raw bytes.
    pub data: Vec<u8>,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A reference to a file stored elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileData {
    /// MIME type of the referenced file.
    pub mime_type: String,
    /// Location of the file.
    pub file_uri: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Atomic piece of an event's content.
///
/// Exactly one payload per part; the variant is the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain or reasoning ("thought") text.
    Text {
        /// The text.
        text: String,
        /// Whether this text is model reasoning rather than an answer.
        #[serde(default)]
        thought: bool,
    },
    /// Inline file bytes.
    InlineData(Blob),
    /// External file reference.
    FileData(FileData),
    /// A function call.
    FunctionCall(FunctionCall),
    /// A function response.
    FunctionResponse(FunctionResponse),
    /// Executable code.
    ExecutableCode(ExecutableCode),
    /// Code execution result.
    CodeExecutionResult(CodeExecutionResult),
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            thought: false,
        }
    }

    /// Create a thought part.
    pub fn thought(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            thought: true,
        }
    }

    /// Create a function call part.
    pub fn function_call(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self::FunctionCall(FunctionCall {
            id: id.into(),
            name: name.into(),
            args,
        })
    }

    /// Create a function response part.
    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: Map<String, Value>,
    ) -> Self {
        Self::FunctionResponse(FunctionResponse {
            id: id.into(),
            name: name.into(),
            response,
        })
    }

    /// Whether this is a text or thought part.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Text and thought flag, when this is a text part.
    pub fn as_text(&self) -> Option<(&str, bool)> {
        match self {
            Self::Text { text, thought } => Some((text.as_str(), *thought)),
            _ => None,
        }
    }

    /// The function call, when this is one.
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    /// The function response, when this is one.
    pub fn as_function_response(&self) -> Option<&FunctionResponse> {
        match self {
            Self::FunctionResponse(response) => Some(response),
            _ => None,
        }
    }
}
