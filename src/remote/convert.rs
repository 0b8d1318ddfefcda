//! Wire event to internal event conversion.

use super::{RunContext, REMOTE_TASK_FAILED};
use crate::codec::{self, PartCodec};
use crate::error::BridgeResult;
use crate::event::{Content, Event, ROLE_MODEL};
use crate::metadata;
use crate::protocol::{
    Message, Metadata, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus, TaskStatusUpdateEvent, WireEvent,
    WirePart,
};
use serde_json::Value;

/// Convert one wire event into at most one internal event.
///
/// Every produced event is authored by `author`, carries the run's invocation
/// id and records the remote task id, context id and state under the `a2a:`
/// keys. Returns `None` for updates that carry nothing to relay.
pub fn wire_to_event(
    codec: &PartCodec,
    author: &str,
    ctx: &RunContext,
    wire: &WireEvent,
) -> BridgeResult<Option<Event>> {
    match wire {
        WireEvent::Message(message) => message_event(codec, author, ctx, message).map(Some),
        WireEvent::Task(task) => task_event(codec, author, ctx, task),
        WireEvent::StatusUpdate(update) => status_event(codec, author, ctx, update),
        WireEvent::ArtifactUpdate(update) => artifact_event(codec, author, ctx, update),
        WireEvent::Unknown => {
            tracing::debug!("Ignoring unknown wire event kind");
            Ok(None)
        }
    }
}

fn message_event(codec: &PartCodec, author: &str, ctx: &RunContext, message: &Message) -> BridgeResult<Event> {
    let mut event = ctx.event(author);
    set_content(&mut event, codec, &message.parts)?;
    event.turn_complete = true;
    if let (Some(task_id), Some(context_id)) = (&message.task_id, &message.context_id) {
        stamp(&mut event, task_id, context_id, None);
    } else if let Some(context_id) = &message.context_id {
        event
            .custom_metadata
            .insert(metadata::CONTEXT_ID.to_string(), Value::String(context_id.clone()));
    }
    apply(&mut event, message.metadata.as_ref());
    Ok(event)
}

fn task_event(codec: &PartCodec, author: &str, ctx: &RunContext, task: &Task) -> BridgeResult<Option<Event>> {
    let state = task.status.state;
    if state == TaskState::Failed {
        let mut event = failed_event(author, ctx, &task.id, &task.status);
        stamp(&mut event, &task.id, &task.context_id, Some(state));
        apply(&mut event, task.metadata.as_ref());
        return Ok(Some(event));
    }
    if !state.ends_invocation() {
        return Ok(None);
    }

    let mut parts: Vec<WirePart> = task
        .artifacts
        .iter()
        .flat_map(|artifact| artifact.parts.iter().cloned())
        .collect();
    let status_message = task.status.message.as_ref();
    if let Some(message) = status_message {
        parts.extend(message.parts.iter().cloned());
    }

    let mut event = ctx.event(author);
    set_content(&mut event, codec, &parts)?;
    event.turn_complete = true;
    stamp(&mut event, &task.id, &task.context_id, Some(state));
    apply(&mut event, task.metadata.as_ref());
    apply(&mut event, status_message.and_then(|m| m.metadata.as_ref()));
    Ok(Some(event))
}

fn status_event(
    codec: &PartCodec,
    author: &str,
    ctx: &RunContext,
    update: &TaskStatusUpdateEvent,
) -> BridgeResult<Option<Event>> {
    let state = update.status.state;
    let status_message = update.status.message.as_ref();

    let mut event = if state == TaskState::Failed {
        failed_event(author, ctx, &update.task_id, &update.status)
    } else if update.is_final || state.ends_invocation() {
        let mut event = ctx.event(author);
        if let Some(message) = status_message {
            set_content(&mut event, codec, &message.parts)?;
        }
        event.turn_complete = true;
        event
    } else {
        // Progress message of a running task.
        let Some(message) = status_message else {
            return Ok(None);
        };
        let mut event = ctx.event(author);
        set_content(&mut event, codec, &message.parts)?;
        if !event.has_content() {
            return Ok(None);
        }
        event.partial = true;
        event
    };

    stamp(&mut event, &update.task_id, &update.context_id, Some(state));
    apply(&mut event, update.metadata.as_ref());
    apply(&mut event, status_message.and_then(|m| m.metadata.as_ref()));
    apply_actions(&mut event, update.metadata.as_ref());
    Ok(Some(event))
}

fn artifact_event(
    codec: &PartCodec,
    author: &str,
    ctx: &RunContext,
    update: &TaskArtifactUpdateEvent,
) -> BridgeResult<Option<Event>> {
    let mut event = ctx.event(author);
    set_content(&mut event, codec, &update.artifact.parts)?;
    if !event.has_content() {
        return Ok(None);
    }
    event.partial = metadata::flag(update.metadata.as_ref(), metadata::PARTIAL);
    stamp(&mut event, &update.task_id, &update.context_id, Some(TaskState::Working));
    apply(&mut event, update.metadata.as_ref());
    apply(&mut event, update.artifact.metadata.as_ref());
    Ok(Some(event))
}

fn set_content(event: &mut Event, codec: &PartCodec, parts: &[WirePart]) -> BridgeResult<()> {
    let internal = codec.to_internal(parts)?;
    if !internal.is_empty() {
        event.content = Some(Content::new(ROLE_MODEL, internal));
        event.long_running_tool_ids = codec::long_running_ids(parts);
    }
    Ok(())
}

fn failed_event(author: &str, ctx: &RunContext, task_id: &str, status: &TaskStatus) -> Event {
    let text = status
        .message
        .as_ref()
        .map(message_text)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| format!("remote task {} failed", task_id));
    tracing::debug!(task_id, "Remote task failed: {}", text);
    ctx.error_event(author, REMOTE_TASK_FAILED, text)
}

fn message_text(message: &Message) -> String {
    message
        .parts
        .iter()
        .filter_map(|part| match part {
            WirePart::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

fn stamp(event: &mut Event, task_id: &str, context_id: &str, state: Option<TaskState>) {
    let custom = &mut event.custom_metadata;
    custom.insert(metadata::TASK_ID.to_string(), Value::String(task_id.to_string()));
    custom.insert(metadata::CONTEXT_ID.to_string(), Value::String(context_id.to_string()));
    if let Some(state) = state {
        custom.insert(metadata::TASK_STATE.to_string(), Value::String(state.as_str().to_string()));
    }
}

fn apply(event: &mut Event, meta: Option<&Metadata>) {
    if let Some(meta) = meta {
        metadata::apply_wire(event, meta);
    }
}

fn apply_actions(event: &mut Event, meta: Option<&Metadata>) {
    if metadata::flag(meta, metadata::ESCALATE) {
        event.actions.escalate = true;
    }
    if let Some(target) = meta
        .and_then(|m| m.get(metadata::TRANSFER_TO_AGENT))
        .and_then(Value::as_str)
    {
        event.actions.transfer_to_agent = Some(target.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Part;
    use crate::protocol::{Artifact, Role};
    use serde_json::{json, Map};

    fn ctx() -> RunContext {
        RunContext::new(Vec::new()).with_invocation_id("inv-1")
    }

    fn convert(wire: &WireEvent) -> Option<Event> {
        wire_to_event(&PartCodec::new(), "remote", &ctx(), wire).unwrap()
    }

    fn artifact(parts: Vec<WirePart>, meta: Option<Metadata>) -> WireEvent {
        WireEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            artifact: Artifact {
                artifact_id: "a1".to_string(),
                name: None,
                parts,
                metadata: None,
            },
            append: true,
            last_chunk: false,
            metadata: meta,
        })
    }

    #[test]
    fn test_artifact_update_carries_task_ids() {
        let event = convert(&artifact(vec![WirePart::text("hi")], None)).unwrap();

        assert_eq!(event.author, "remote");
        assert_eq!(event.invocation_id, "inv-1");
        assert_eq!(event.parts(), &[Part::text("hi")]);
        assert!(!event.partial);
        assert_eq!(event.custom_str(metadata::TASK_ID), Some("t1"));
        assert_eq!(event.custom_str(metadata::CONTEXT_ID), Some("c1"));
        assert_eq!(event.custom_str(metadata::TASK_STATE), Some("working"));
    }

    #[test]
    fn test_partial_flag_and_round_trip_metadata() {
        let mut meta = Map::new();
        meta.insert(metadata::PARTIAL.to_string(), json!(true));
        meta.insert(metadata::AUTHOR.to_string(), json!("writer"));
        meta.insert(metadata::USAGE_METADATA.to_string(), json!({"tokens": 12}));
        let event = convert(&artifact(vec![WirePart::text("Hel")], Some(meta))).unwrap();

        assert!(event.partial);
        assert_eq!(event.custom_str("a2a:author"), Some("writer"));
        assert_eq!(event.usage_metadata, Some(json!({"tokens": 12})));
    }

    #[test]
    fn test_empty_artifact_update_is_skipped() {
        assert!(convert(&artifact(Vec::new(), None)).is_none());
    }

    #[test]
    fn test_failed_status_becomes_error_event() {
        let message = Message::new(Role::Agent, vec![WirePart::text("quota exceeded")]);
        let update = TaskStatusUpdateEvent::new("t1", "c1", TaskState::Failed, Some(message), true);
        let event = convert(&update.into()).unwrap();

        assert_eq!(event.error_code.as_deref(), Some(REMOTE_TASK_FAILED));
        assert_eq!(event.error_message.as_deref(), Some("quota exceeded"));
        assert_eq!(event.custom_str(metadata::TASK_STATE), Some("failed"));
    }

    #[test]
    fn test_input_required_status_marks_long_running_calls() {
        let codec = PartCodec::new();
        let mut message = codec
            .to_wire_message(Role::Agent, &[Part::function_call("c1", "approve", Map::new())], &["c1".to_string()])
            .unwrap();
        message.metadata = Some(Map::from_iter([(
            metadata::CUSTOM_METADATA.to_string(),
            json!({"a2a:task_id": "downstream", "note": "x"}),
        )]));
        let update = TaskStatusUpdateEvent::new("t1", "c1", TaskState::InputRequired, Some(message), true);
        let event = convert(&update.into()).unwrap();

        assert!(event.turn_complete);
        assert_eq!(event.long_running_tool_ids, vec!["c1".to_string()]);
        assert_eq!(event.custom_str(metadata::TASK_STATE), Some("input-required"));
        assert_eq!(event.custom_str(metadata::TASK_ID), Some("t1"));
    }

    #[test]
    fn test_working_status_message_is_progress() {
        let message = Message::new(Role::Agent, vec![WirePart::text("searching...")]);
        let update = TaskStatusUpdateEvent::new("t1", "c1", TaskState::Working, Some(message), false);
        let event = convert(&update.into()).unwrap();
        assert!(event.partial);

        let bare = TaskStatusUpdateEvent::new("t1", "c1", TaskState::Working, None, false);
        assert!(convert(&bare.into()).is_none());
    }

    #[test]
    fn test_terminal_actions_restored() {
        let mut update = TaskStatusUpdateEvent::new("t1", "c1", TaskState::Completed, None, true);
        update.metadata = Some(Map::from_iter([
            (metadata::ESCALATE.to_string(), json!(true)),
            (metadata::TRANSFER_TO_AGENT.to_string(), json!("billing")),
        ]));
        let event = convert(&update.into()).unwrap();

        assert!(!event.has_content());
        assert!(event.actions.escalate);
        assert_eq!(event.actions.transfer_to_agent.as_deref(), Some("billing"));
    }

    #[test]
    fn test_completed_task_snapshot_collects_artifacts() {
        let task = Task {
            id: "t1".to_string(),
            context_id: "c1".to_string(),
            status: TaskStatus::new(TaskState::Completed, None),
            artifacts: vec![Artifact {
                artifact_id: "a1".to_string(),
                name: None,
                parts: vec![WirePart::text("done")],
                metadata: None,
            }],
            history: Vec::new(),
            metadata: None,
        };
        let event = convert(&WireEvent::Task(task.clone())).unwrap();
        assert_eq!(event.parts(), &[Part::text("done")]);

        let submitted = Task {
            status: TaskStatus::new(TaskState::Submitted, None),
            ..task
        };
        assert!(convert(&WireEvent::Task(submitted)).is_none());
    }

    #[test]
    fn test_unknown_wire_event_is_ignored() {
        assert!(convert(&WireEvent::Unknown).is_none());
    }

    #[test]
    fn test_unknown_part_kind_is_an_error() {
        let result = wire_to_event(&PartCodec::new(), "remote", &ctx(), &artifact(vec![WirePart::Unknown], None));
        assert!(result.unwrap_err().is_conversion());
    }
}
