//! Long-running call tracking.
//!
//! Outbound, [`LongRunningTracker`] pulls long-running function calls (and
//! responses to them) out of the event stream and collects them into the
//! single input-required message that closes the task. Inbound,
//! [`validate_pending_input`] checks that a new request answers every call
//! the remote side is still waiting for.

mod validation;

pub use validation::{missing_input_error, validate_pending_input};

use crate::codec::PartCodec;
use crate::error::BridgeResult;
use crate::event::{Event, Part};
use crate::metadata;
use crate::protocol::{Message, Metadata, Role};
use std::collections::{HashMap, HashSet};

/// A long-running call surfaced to the remote side and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    /// Function call id.
    pub call_id: String,
    /// Invocation that issued the call.
    pub invocation_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PartKind {
    Call,
    Response,
}

/// Per-invocation long-running call tracker.
///
/// Calls surfaced by earlier invocations of the task are registered with
/// [`LongRunningTracker::resume`].
///
/// # Example
///
/// ```
/// use abk_a2a::event::{Event, Part};
/// use abk_a2a::tracker::LongRunningTracker;
/// use serde_json::Map;
///
/// let mut tracker = LongRunningTracker::new();
/// let event = Event::new("agent")
///     .with_parts(vec![Part::text("asking"), Part::function_call("c1", "approve", Map::new())])
///     .with_long_running_tool_ids(["c1"]);
///
/// let emitted = tracker.process(&event).unwrap();
/// assert_eq!(emitted.parts(), &[Part::text("asking")]);
/// assert!(tracker.is_input_required());
/// ```
#[derive(Debug, Default)]
pub struct LongRunningTracker {
    surfaced: HashMap<String, PendingCall>,
    added: HashSet<(PartKind, String)>,
    parts: Vec<Part>,
    source_metadata: Metadata,
}

impl LongRunningTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Withhold long-running parts of an event.
    ///
    /// Returns `None` when nothing is left to emit, the event itself when it
    /// has no long-running parts, and a trimmed copy otherwise.
    pub fn process(&mut self, event: &Event) -> Option<Event> {
        let mut kept = Vec::with_capacity(event.parts().len());
        let mut withheld = false;

        for part in event.parts() {
            match part {
                Part::FunctionCall(call) if event.is_long_running(&call.id) => {
                    self.surfaced.entry(call.id.clone()).or_insert_with(|| PendingCall {
                        call_id: call.id.clone(),
                        invocation_id: event.invocation_id.clone(),
                    });
                    self.add(PartKind::Call, &call.id, part);
                    withheld = true;
                }
                Part::FunctionResponse(response) if self.surfaced.contains_key(&response.id) => {
                    self.add(PartKind::Response, &response.id, part);
                    withheld = true;
                }
                _ => kept.push(part.clone()),
            }
        }

        if !withheld {
            return Some(event.clone());
        }
        self.source_metadata = metadata::event_to_wire(event);
        tracing::debug!(
            pending = self.surfaced.len(),
            "Withheld long-running parts from event {}",
            event.id
        );
        if kept.is_empty() {
            return None;
        }

        let mut trimmed = event.clone();
        if let Some(content) = trimmed.content.as_mut() {
            content.parts = kept;
        }
        let surfaced = &self.surfaced;
        trimmed.long_running_tool_ids.retain(|id| !surfaced.contains_key(id));
        Some(trimmed)
    }

    /// Register calls an earlier invocation of the same task surfaced.
    ///
    /// Responses to them are withheld like responses to calls surfaced in
    /// this invocation. The calls themselves are not surfaced again.
    pub fn resume(&mut self, calls: impl IntoIterator<Item = PendingCall>) {
        for call in calls {
            self.surfaced.entry(call.call_id.clone()).or_insert(call);
        }
    }

    fn add(&mut self, kind: PartKind, call_id: &str, part: &Part) {
        if self.added.insert((kind, call_id.to_string())) {
            self.parts.push(part.clone());
        }
    }

    /// Whether an input-required message has been accumulated.
    pub fn is_input_required(&self) -> bool {
        !self.parts.is_empty()
    }

    /// Accumulated input-required parts in surfacing order.
    pub fn input_required_parts(&self) -> &[Part] {
        &self.parts
    }

    /// Calls surfaced in this task and not yet answered.
    pub fn pending_calls(&self) -> Vec<&PendingCall> {
        let mut pending: Vec<&PendingCall> = self
            .surfaced
            .values()
            .filter(|call| !self.added.contains(&(PartKind::Response, call.call_id.clone())))
            .collect();
        pending.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        pending
    }

    /// Build the input-required status message for a task.
    ///
    /// Surfaced calls are marked long-running on the wire, and the message
    /// carries the metadata of the event that last contributed to it.
    pub fn input_required_message(
        &self,
        codec: &PartCodec,
        task_id: &str,
        context_id: &str,
    ) -> BridgeResult<Option<Message>> {
        if self.parts.is_empty() {
            return Ok(None);
        }
        let ids: Vec<String> = self.surfaced.keys().cloned().collect();
        let mut message = codec
            .to_wire_message(Role::Agent, &self.parts, &ids)?
            .for_task(task_id, context_id);
        if !self.source_metadata.is_empty() {
            message.metadata = Some(self.source_metadata.clone());
        }
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WirePart;
    use serde_json::{json, Map};

    fn call(id: &str) -> Part {
        Part::function_call(id, "approve", Map::new())
    }

    fn response(id: &str) -> Part {
        let mut payload = Map::new();
        payload.insert("status".to_string(), json!("pending"));
        Part::function_response(id, "approve", payload)
    }

    #[test]
    fn test_ordinary_event_passes_through() {
        let mut tracker = LongRunningTracker::new();
        let event = Event::new("a").with_parts(vec![Part::text("hi"), call("c9")]);
        assert_eq!(tracker.process(&event), Some(event));
        assert!(!tracker.is_input_required());
    }

    #[test]
    fn test_fully_withheld_event_is_skipped() {
        let mut tracker = LongRunningTracker::new();
        let event = Event::new("a")
            .with_parts(vec![call("c1")])
            .with_long_running_tool_ids(["c1"]);
        assert!(tracker.process(&event).is_none());
        assert_eq!(tracker.input_required_parts(), &[call("c1")]);
    }

    #[test]
    fn test_original_event_untouched() {
        let mut tracker = LongRunningTracker::new();
        let event = Event::new("a")
            .with_parts(vec![Part::text("x"), call("c1")])
            .with_long_running_tool_ids(["c1"]);
        let before = event.clone();
        let trimmed = tracker.process(&event).unwrap();
        assert_eq!(event, before);
        assert_eq!(trimmed.parts(), &[Part::text("x")]);
        assert!(trimmed.long_running_tool_ids.is_empty());
    }

    #[test]
    fn test_response_to_surfaced_call_is_withheld() {
        let mut tracker = LongRunningTracker::new();
        let first = Event::new("a")
            .with_parts(vec![call("c1")])
            .with_long_running_tool_ids(["c1"]);
        tracker.process(&first);

        let second = Event::new("a").with_parts(vec![response("c1"), response("c2")]);
        let emitted = tracker.process(&second).unwrap();
        assert_eq!(emitted.parts(), &[response("c2")]);
        assert_eq!(tracker.input_required_parts(), &[call("c1"), response("c1")]);
        assert!(tracker.pending_calls().is_empty());
    }

    #[test]
    fn test_response_to_resumed_call_is_withheld() {
        let mut tracker = LongRunningTracker::new();
        tracker.resume([PendingCall {
            call_id: "c1".to_string(),
            invocation_id: "inv-0".to_string(),
        }]);
        assert!(!tracker.is_input_required());

        let event = Event::new("a").with_parts(vec![Part::text("still waiting"), response("c1")]);
        let emitted = tracker.process(&event).unwrap();
        assert_eq!(emitted.parts(), &[Part::text("still waiting")]);
        assert_eq!(tracker.input_required_parts(), &[response("c1")]);
    }

    #[test]
    fn test_surfacing_twice_never_duplicates() {
        let mut tracker = LongRunningTracker::new();
        let event = Event::new("a")
            .with_parts(vec![call("c1")])
            .with_long_running_tool_ids(["c1"]);
        tracker.process(&event);
        tracker.process(&event);
        assert_eq!(tracker.input_required_parts().len(), 1);
        assert_eq!(tracker.pending_calls().len(), 1);
        assert_eq!(tracker.pending_calls()[0].call_id, "c1");
    }

    #[test]
    fn test_input_required_message_marks_calls() {
        let mut tracker = LongRunningTracker::new();
        let event = Event::new("a")
            .with_invocation_id("inv-1")
            .with_parts(vec![call("c1")])
            .with_long_running_tool_ids(["c1"]);
        tracker.process(&event);

        let codec = PartCodec::new();
        let message = tracker.input_required_message(&codec, "t1", "ctx").unwrap().unwrap();
        assert_eq!(message.task_id.as_deref(), Some("t1"));
        assert_eq!(crate::codec::long_running_ids(&message.parts), vec!["c1".to_string()]);
        assert!(matches!(message.parts[0], WirePart::Data(_)));
        let meta = message.metadata.unwrap();
        assert_eq!(meta[metadata::INVOCATION_ID], json!("inv-1"));
    }

    #[test]
    fn test_no_message_without_calls() {
        let tracker = LongRunningTracker::new();
        let codec = PartCodec::new();
        assert!(tracker.input_required_message(&codec, "t", "c").unwrap().is_none());
    }
}
