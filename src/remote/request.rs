//! Outgoing message construction.

use crate::codec::PartCodec;
use crate::error::BridgeResult;
use crate::event::{Event, Part, ROLE_USER};
use crate::metadata;
use crate::protocol::{Message, Role, TaskState};

/// The message to send and what it was built from.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Wire message, with task and context ids when continuing a task.
    pub message: Message,
    /// Internal parts the message was encoded from.
    pub parts: Vec<Part>,
    /// The agent's last reply in the conversation.
    pub previous: Option<Event>,
}

/// Build the message for the events since `agent_name` last replied.
///
/// User events are sent as they are. Text and tool activity of other agents
/// is rewritten into plain context text. The context id of the agent's most
/// recent reply is reused, and its task id too when that reply was waiting
/// for input.
///
/// Returns `None` when there is nothing new to send.
pub fn build_outgoing(agent_name: &str, events: &[Event], codec: &PartCodec) -> BridgeResult<Option<OutgoingMessage>> {
    let last_reply = events.iter().rposition(|e| e.author == agent_name);
    let since = last_reply.map_or(0, |i| i + 1);

    let mut parts = Vec::new();
    for event in &events[since..] {
        if event.partial || event.is_error() {
            continue;
        }
        if event.author == ROLE_USER {
            parts.extend(event.parts().iter().cloned());
        } else {
            parts.extend(context_parts(event));
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }

    let previous = last_reply.map(|i| events[i].clone());
    let mut message = codec.to_wire_message(Role::User, &parts, &[])?;
    message.context_id = events
        .iter()
        .rev()
        .filter(|e| e.author == agent_name)
        .find_map(|e| e.custom_str(metadata::CONTEXT_ID))
        .map(str::to_string);
    if let Some(previous) = &previous {
        if previous.custom_str(metadata::TASK_STATE) == Some(TaskState::InputRequired.as_str()) {
            message.task_id = previous.custom_str(metadata::TASK_ID).map(str::to_string);
        }
    }

    Ok(Some(OutgoingMessage {
        message,
        parts,
        previous,
    }))
}

fn context_parts(event: &Event) -> Vec<Part> {
    let author = &event.author;
    event
        .parts()
        .iter()
        .filter_map(|part| match part {
            Part::Text { thought: true, .. } => None,
            Part::Text { text, .. } => Some(format!("For context: [{}] said: {}", author, text)),
            Part::FunctionCall(call) => Some(format!(
                "For context: [{}] called tool `{}` with parameters: {}",
                author,
                call.name,
                serde_json::Value::Object(call.args.clone())
            )),
            Part::FunctionResponse(response) => Some(format!(
                "For context: [{}] tool `{}` returned result: {}",
                author,
                response.name,
                serde_json::Value::Object(response.response.clone())
            )),
            _ => None,
        })
        .map(Part::text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WirePart;
    use serde_json::{json, Map, Value};

    fn user(text: &str) -> Event {
        Event::new(ROLE_USER).with_content(crate::event::Content::user(vec![Part::text(text)]))
    }

    fn reply(state: TaskState) -> Event {
        let mut event = Event::new("remote").with_parts(vec![Part::text("earlier answer")]);
        event
            .custom_metadata
            .insert(metadata::TASK_ID.to_string(), json!("t1"));
        event
            .custom_metadata
            .insert(metadata::CONTEXT_ID.to_string(), json!("c1"));
        event
            .custom_metadata
            .insert(metadata::TASK_STATE.to_string(), Value::String(state.as_str().to_string()));
        event
    }

    #[test]
    fn test_whole_history_when_agent_never_replied() {
        let events = vec![user("hello"), user("anyone there?")];
        let outgoing = build_outgoing("remote", &events, &PartCodec::new()).unwrap().unwrap();

        assert_eq!(outgoing.parts, vec![Part::text("hello"), Part::text("anyone there?")]);
        assert!(outgoing.previous.is_none());
        assert!(outgoing.message.task_id.is_none());
        assert!(outgoing.message.context_id.is_none());
        assert_eq!(outgoing.message.role, Role::User);
    }

    #[test]
    fn test_only_events_since_last_reply() {
        let events = vec![user("first"), reply(TaskState::Completed), user("second")];
        let outgoing = build_outgoing("remote", &events, &PartCodec::new()).unwrap().unwrap();

        assert_eq!(outgoing.message.parts, vec![WirePart::text("second")]);
        assert_eq!(outgoing.message.context_id.as_deref(), Some("c1"));
        assert!(outgoing.message.task_id.is_none());
    }

    #[test]
    fn test_input_required_reply_continues_task() {
        let events = vec![user("first"), reply(TaskState::InputRequired), user("approved")];
        let outgoing = build_outgoing("remote", &events, &PartCodec::new()).unwrap().unwrap();

        assert_eq!(outgoing.message.task_id.as_deref(), Some("t1"));
        assert_eq!(outgoing.message.context_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_other_agents_become_context() {
        let mut args = Map::new();
        args.insert("city".to_string(), json!("Oslo"));
        let helper = Event::new("planner").with_parts(vec![
            Part::thought("hidden"),
            Part::text("checking weather"),
            Part::function_call("c1", "weather", args),
        ]);
        let events = vec![user("plan my trip"), helper];
        let outgoing = build_outgoing("remote", &events, &PartCodec::new()).unwrap().unwrap();

        assert_eq!(
            outgoing.parts,
            vec![
                Part::text("plan my trip"),
                Part::text("For context: [planner] said: checking weather"),
                Part::text("For context: [planner] called tool `weather` with parameters: {\"city\":\"Oslo\"}"),
            ]
        );
    }

    #[test]
    fn test_nothing_new_to_send() {
        let events = vec![user("first"), reply(TaskState::Completed)];
        assert!(build_outgoing("remote", &events, &PartCodec::new()).unwrap().is_none());
        assert!(build_outgoing("remote", &[], &PartCodec::new()).unwrap().is_none());
    }
}
