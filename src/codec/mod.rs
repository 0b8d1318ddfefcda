//! Content-part codec.
//!
//! Converts internal [`Part`]s to wire [`WirePart`]s and back. Text maps to
//! text, files map to file parts (inline bytes or URI), and every other part
//! kind travels as a data part tagged with `abk_type`.
//!
//! ```text
//!   Part::Text { thought }     ◀──▶  text  (+ abk_thought)
//!   Part::InlineData           ◀──▶  file  { bytes: base64 }
//!   Part::FileData             ◀──▶  file  { uri }
//!   Part::FunctionCall         ◀──▶  data  (abk_type = function_call, abk_is_long_running)
//!   Part::FunctionResponse     ◀──▶  data  (abk_type = function_response)
//!   Part::ExecutableCode       ◀──▶  data  (abk_type = executable_code)
//!   Part::CodeExecutionResult  ◀──▶  data  (abk_type = code_execution_result)
//!   untagged data              ───▶  Part::Text holding the JSON
//! ```

use crate::error::{BridgeError, BridgeResult};
use crate::event::{Blob, Content, FileData, Part, ROLE_MODEL, ROLE_USER};
use crate::metadata;
use crate::protocol::{DataPart, FileContent, FilePart, Message, Metadata, Role, TextPart, WirePart};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// `abk_type` value for function calls.
pub const TYPE_FUNCTION_CALL: &str = "function_call";
/// `abk_type` value for function responses.
pub const TYPE_FUNCTION_RESPONSE: &str = "function_response";
/// `abk_type` value for executable code.
pub const TYPE_EXECUTABLE_CODE: &str = "executable_code";
/// `abk_type` value for code execution results.
pub const TYPE_CODE_EXECUTION_RESULT: &str = "code_execution_result";

/// Custom internal-to-wire conversion consulted before the default mapping.
pub trait ToWireConverter: Send + Sync {
    /// Converter name, used in errors and logs.
    fn name(&self) -> &str;

    /// Convert a part, or return `None` to defer to the next converter.
    fn convert(&self, part: &Part, is_long_running: bool) -> BridgeResult<Option<WirePart>>;
}

/// Custom wire-to-internal conversion consulted before the default mapping.
pub trait ToInternalConverter: Send + Sync {
    /// Converter name, used in errors and logs.
    fn name(&self) -> &str;

    /// Convert a part, or return `None` to defer to the next converter.
    fn convert(&self, part: &WirePart) -> BridgeResult<Option<Part>>;
}

/// Bidirectional part converter.
///
/// # Example
///
/// ```
/// use abk_a2a::codec::PartCodec;
/// use abk_a2a::event::Part;
///
/// let codec = PartCodec::new();
/// let parts = vec![Part::text("hello"), Part::thought("thinking")];
/// let wire = codec.to_wire(&parts, &[]).unwrap();
/// assert_eq!(codec.to_internal(&wire).unwrap(), parts);
/// ```
#[derive(Clone, Default)]
pub struct PartCodec {
    to_wire: Vec<Arc<dyn ToWireConverter>>,
    to_internal: Vec<Arc<dyn ToInternalConverter>>,
}

impl fmt::Debug for PartCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to_wire: Vec<&str> = self.to_wire.iter().map(|c| c.name()).collect();
        let to_internal: Vec<&str> = self.to_internal.iter().map(|c| c.name()).collect();
        f.debug_struct("PartCodec")
            .field("to_wire", &to_wire)
            .field("to_internal", &to_internal)
            .finish()
    }
}

impl PartCodec {
    /// Create a codec with only the default mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom internal-to-wire converter. Converters run in
    /// registration order.
    pub fn with_to_wire(mut self, converter: Arc<dyn ToWireConverter>) -> Self {
        self.to_wire.push(converter);
        self
    }

    /// Register a custom wire-to-internal converter. Converters run in
    /// registration order.
    pub fn with_to_internal(mut self, converter: Arc<dyn ToInternalConverter>) -> Self {
        self.to_internal.push(converter);
        self
    }

    /// Convert internal parts to wire parts.
    ///
    /// Function calls whose id is in `long_running_ids` carry
    /// `abk_is_long_running: true`.
    pub fn to_wire(&self, parts: &[Part], long_running_ids: &[String]) -> BridgeResult<Vec<WirePart>> {
        parts
            .iter()
            .map(|part| {
                let is_long_running = part
                    .as_function_call()
                    .map(|call| long_running_ids.iter().any(|id| *id == call.id))
                    .unwrap_or(false);
                self.part_to_wire(part, is_long_running)
            })
            .collect()
    }

    /// Convert wire parts to internal parts.
    pub fn to_internal(&self, parts: &[WirePart]) -> BridgeResult<Vec<Part>> {
        parts.iter().map(|part| self.part_to_internal(part)).collect()
    }

    /// Build a wire message from internal parts.
    pub fn to_wire_message(&self, role: Role, parts: &[Part], long_running_ids: &[String]) -> BridgeResult<Message> {
        Ok(Message::new(role, self.to_wire(parts, long_running_ids)?))
    }

    /// Decode a wire message into internal content.
    pub fn message_to_content(&self, message: &Message) -> BridgeResult<Content> {
        let role = match message.role {
            Role::User => ROLE_USER,
            Role::Agent => ROLE_MODEL,
        };
        Ok(Content::new(role, self.to_internal(&message.parts)?))
    }

    fn part_to_wire(&self, part: &Part, is_long_running: bool) -> BridgeResult<WirePart> {
        for converter in &self.to_wire {
            if let Some(converted) = converter.convert(part, is_long_running)? {
                return Ok(converted);
            }
        }

        let wire = match part {
            Part::Text { text, thought } => WirePart::Text(TextPart {
                text: text.clone(),
                metadata: thought.then(|| flag_metadata(metadata::THOUGHT)),
            }),
            Part::InlineData(blob) => WirePart::File(FilePart {
                file: FileContent::Bytes {
                    bytes: BASE64.encode(&blob.data),
                    mime_type: Some(blob.mime_type.clone()),
                    name: blob.display_name.clone(),
                },
                metadata: None,
            }),
            Part::FileData(file) => WirePart::File(FilePart {
                file: FileContent::Uri {
                    uri: file.file_uri.clone(),
                    mime_type: Some(file.mime_type.clone()),
                    name: file.display_name.clone(),
                },
                metadata: None,
            }),
            Part::FunctionCall(call) => {
                let mut part = data_part(call, TYPE_FUNCTION_CALL)?;
                if is_long_running {
                    if let WirePart::Data(DataPart { metadata: Some(meta), .. }) = &mut part {
                        meta.insert(metadata::IS_LONG_RUNNING.to_string(), Value::Bool(true));
                    }
                }
                part
            }
            Part::FunctionResponse(response) => data_part(response, TYPE_FUNCTION_RESPONSE)?,
            Part::ExecutableCode(code) => data_part(code, TYPE_EXECUTABLE_CODE)?,
            Part::CodeExecutionResult(result) => data_part(result, TYPE_CODE_EXECUTION_RESULT)?,
        };
        Ok(wire)
    }

    fn part_to_internal(&self, part: &WirePart) -> BridgeResult<Part> {
        for converter in &self.to_internal {
            if let Some(converted) = converter.convert(part)? {
                return Ok(converted);
            }
        }

        match part {
            WirePart::Text(text) => Ok(Part::Text {
                text: text.text.clone(),
                thought: metadata::flag(text.metadata.as_ref(), metadata::THOUGHT),
            }),
            WirePart::File(file) => match &file.file {
                FileContent::Bytes { bytes, mime_type, name } => {
                    let data = BASE64
                        .decode(bytes)
                        .map_err(|e| BridgeError::conversion(format!("invalid base64 file bytes: {}", e)))?;
                    Ok(Part::InlineData(Blob {
                        mime_type: mime_type.clone().unwrap_or_default(),
                        data,
                        display_name: name.clone(),
                    }))
                }
                FileContent::Uri { uri, mime_type, name } => Ok(Part::FileData(FileData {
                    mime_type: mime_type.clone().unwrap_or_default(),
                    file_uri: uri.clone(),
                    display_name: name.clone(),
                })),
            },
            WirePart::Data(data) => {
                let kind = data
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(metadata::TYPE))
                    .and_then(Value::as_str);
                match kind {
                    Some(TYPE_FUNCTION_CALL) => Ok(Part::FunctionCall(from_data(data, TYPE_FUNCTION_CALL)?)),
                    Some(TYPE_FUNCTION_RESPONSE) => {
                        Ok(Part::FunctionResponse(from_data(data, TYPE_FUNCTION_RESPONSE)?))
                    }
                    Some(TYPE_EXECUTABLE_CODE) => Ok(Part::ExecutableCode(from_data(data, TYPE_EXECUTABLE_CODE)?)),
                    Some(TYPE_CODE_EXECUTION_RESULT) => {
                        Ok(Part::CodeExecutionResult(from_data(data, TYPE_CODE_EXECUTION_RESULT)?))
                    }
                    _ => Ok(Part::text(serde_json::to_string(&data.data)?)),
                }
            }
            WirePart::Unknown => {
                tracing::warn!("Unsupported wire part kind");
                Err(BridgeError::conversion("unsupported wire part kind"))
            }
        }
    }
}

/// Ids of long-running function calls among decoded wire parts.
pub fn long_running_ids(parts: &[WirePart]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|part| match part {
            WirePart::Data(data) => Some(data),
            _ => None,
        })
        .filter(|data| {
            let meta = data.metadata.as_ref();
            meta.and_then(|m| m.get(metadata::TYPE)).and_then(Value::as_str) == Some(TYPE_FUNCTION_CALL)
                && metadata::flag(meta, metadata::IS_LONG_RUNNING)
        })
        .filter_map(|data| data.data.get("id").and_then(Value::as_str).map(str::to_string))
        .collect()
}

fn flag_metadata(key: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(key.to_string(), Value::Bool(true));
    metadata
}

fn data_part<T: Serialize>(payload: &T, kind: &str) -> BridgeResult<WirePart> {
    let data = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        _ => return Err(BridgeError::conversion(format!("{} payload is not an object", kind))),
    };
    let mut metadata = Metadata::new();
    metadata.insert(metadata::TYPE.to_string(), Value::String(kind.to_string()));
    Ok(WirePart::Data(DataPart {
        data,
        metadata: Some(metadata),
    }))
}

fn from_data<T: DeserializeOwned>(data: &DataPart, kind: &str) -> BridgeResult<T> {
    serde_json::from_value(Value::Object(data.data.clone()))
        .map_err(|e| BridgeError::conversion(format!("malformed {} data part: {}", kind, e)))
}
