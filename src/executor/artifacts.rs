//! Artifact bookkeeping for one executor run.
//!
//! A run writes to at most two artifacts:
//!
//! ```text
//!   partial artifact   fragments (append, abk_partial)  ──▶  closed by one
//!                      authoritative write (append = false, last_chunk = true)
//!   main artifact      first write creates it, later writes append
//! ```

use crate::codec::PartCodec;
use crate::error::BridgeResult;
use crate::event::Event;
use crate::metadata;
use crate::protocol::{Artifact, Metadata, TaskArtifactUpdateEvent, WireEvent, WirePart};
use serde_json::Value;
use uuid::Uuid;

/// Tracks the partial and main artifact ids of a task.
#[derive(Debug)]
pub(crate) struct ArtifactWriter<'a> {
    task_id: &'a str,
    context_id: &'a str,
    codec: &'a PartCodec,
    main_id: Option<String>,
    partial_id: Option<String>,
}

impl<'a> ArtifactWriter<'a> {
    pub(crate) fn new(task_id: &'a str, context_id: &'a str, codec: &'a PartCodec) -> Self {
        Self {
            task_id,
            context_id,
            codec,
            main_id: None,
            partial_id: None,
        }
    }

    /// Id of the partial artifact, while it is open.
    pub(crate) fn open_partial(&self) -> Option<&str> {
        self.partial_id.as_deref()
    }

    /// Forget the open partial artifact after it was closed elsewhere.
    pub(crate) fn mark_partial_closed(&mut self) {
        self.partial_id = None;
    }

    /// Build a fragment write to the partial artifact.
    pub(crate) fn partial_fragment(&mut self, event: &Event) -> BridgeResult<WireEvent> {
        let parts = self.codec.to_wire(event.parts(), &event.long_running_tool_ids)?;
        let (artifact_id, append) = match self.partial_id.clone() {
            Some(id) => (id, true),
            None => {
                let id = Uuid::new_v4().to_string();
                self.partial_id = Some(id.clone());
                (id, false)
            }
        };
        let mut meta = metadata::event_to_wire(event);
        meta.insert(metadata::PARTIAL.to_string(), Value::Bool(true));
        Ok(self.update(artifact_id, parts, append, false, meta))
    }

    /// Build the authoritative write that replaces and closes the partial artifact.
    ///
    /// Returns `None` when no partial artifact is open.
    pub(crate) fn close_partial(&mut self, event: &Event) -> BridgeResult<Option<WireEvent>> {
        let Some(artifact_id) = self.partial_id.clone() else {
            return Ok(None);
        };
        let parts = self.codec.to_wire(event.parts(), &event.long_running_tool_ids)?;
        self.partial_id = None;
        Ok(Some(self.update(artifact_id, parts, false, true, metadata::event_to_wire(event))))
    }

    /// Build a write to the main artifact, or `None` when the event has no parts.
    pub(crate) fn main(&mut self, event: &Event) -> BridgeResult<Option<WireEvent>> {
        if !event.has_content() {
            return Ok(None);
        }
        let parts = self.codec.to_wire(event.parts(), &event.long_running_tool_ids)?;
        let (artifact_id, append) = match self.main_id.clone() {
            Some(id) => (id, true),
            None => {
                let id = Uuid::new_v4().to_string();
                self.main_id = Some(id.clone());
                (id, false)
            }
        };
        Ok(Some(self.update(artifact_id, parts, append, false, metadata::event_to_wire(event))))
    }

    fn update(
        &self,
        artifact_id: String,
        parts: Vec<WirePart>,
        append: bool,
        last_chunk: bool,
        meta: Metadata,
    ) -> WireEvent {
        WireEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: self.task_id.to_string(),
            context_id: self.context_id.to_string(),
            artifact: Artifact {
                artifact_id,
                name: None,
                parts,
                metadata: None,
            },
            append,
            last_chunk,
            metadata: (!meta.is_empty()).then_some(meta),
        })
    }
}

