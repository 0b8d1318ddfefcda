//! Streaming aggregator.
//!
//! Accumulates partial text and thought fragments of one turn and releases
//! them as a single consolidated block. Raw fragments never cross the bridge
//! on the inbound side; only consolidated blocks and non-text events do.
//!
//! One aggregator belongs to exactly one invocation and is dropped with it.

use crate::event::{Content, Event, Part, ROLE_MODEL};
use crate::metadata;
use crate::protocol::WireEvent;

/// Per-invocation text and thought accumulator.
#[derive(Debug, Clone, Default)]
pub struct StreamingAggregator {
    text: String,
    thought: String,
    /// First absorbed fragment, used for author and ids of the flushed block.
    template: Option<Event>,
}

impl StreamingAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is accumulated.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.thought.is_empty()
    }

    /// Accumulated answer text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Accumulated thought text.
    pub fn thought(&self) -> &str {
        &self.thought
    }

    /// Absorb a partial text-only event.
    ///
    /// Returns `false` (and leaves the state untouched) for any other event.
    pub fn absorb(&mut self, event: &Event) -> bool {
        if !event.partial || !event.is_text_only() {
            return false;
        }
        for part in event.parts() {
            if let Some((text, thought)) = part.as_text() {
                if thought {
                    self.thought.push_str(text);
                } else {
                    self.text.push_str(text);
                }
            }
        }
        if self.template.is_none() {
            self.template = Some(event.clone());
        }
        true
    }

    /// Take the consolidated parts (thought block first) and clear the state.
    pub fn take_parts(&mut self) -> Vec<Part> {
        let mut parts = Vec::with_capacity(2);
        if !self.thought.is_empty() {
            parts.push(Part::thought(std::mem::take(&mut self.thought)));
        }
        if !self.text.is_empty() {
            parts.push(Part::text(std::mem::take(&mut self.text)));
        }
        self.template = None;
        parts
    }

    /// Drop everything accumulated without emitting it.
    pub fn discard(&mut self) {
        self.text.clear();
        self.thought.clear();
        self.template = None;
    }

    /// Flush the accumulated block as a standalone non-partial event.
    ///
    /// `fallback` supplies author and ids when no fragment was kept.
    pub fn flush(&mut self, fallback: Option<&Event>) -> Option<Event> {
        if self.is_empty() {
            self.template = None;
            return None;
        }
        let mut event = self
            .template
            .take()
            .or_else(|| fallback.cloned())
            .unwrap_or_else(|| Event::new(""));
        let parts = self.take_parts();
        event.id = uuid::Uuid::new_v4().to_string();
        event.partial = false;
        event.error_code = None;
        event.error_message = None;
        event.long_running_tool_ids.clear();
        let role = event
            .content
            .as_ref()
            .map(|c| c.role.clone())
            .unwrap_or_else(|| ROLE_MODEL.to_string());
        event.content = Some(Content::new(role, parts));
        Some(event)
    }

    /// Release the accumulated block ahead of `event`.
    ///
    /// A content-less event receives the block directly; otherwise the block
    /// is emitted as a preceding event.
    pub fn merge_before(&mut self, mut event: Event) -> Vec<Event> {
        if self.is_empty() {
            self.template = None;
            return vec![event];
        }
        if !event.has_content() {
            let parts = self.take_parts();
            let role = event
                .content
                .as_ref()
                .map(|c| c.role.clone())
                .unwrap_or_else(|| ROLE_MODEL.to_string());
            event.content = Some(Content::new(role, parts));
            return vec![event];
        }
        match self.flush(Some(&event)) {
            Some(block) => vec![block, event],
            None => vec![event],
        }
    }

    /// Decide what to emit for a wire event and the event derived from it.
    pub fn observe(&mut self, wire: &WireEvent, derived: Option<Event>) -> Vec<Event> {
        if metadata::flag(wire.metadata(), metadata::NO_AGGREGATION) {
            return derived.into_iter().collect();
        }

        match wire {
            WireEvent::StatusUpdate(update) if update.is_final || update.status.state.ends_invocation() => {
                return match derived {
                    // A bare terminal marker adds nothing once the block is out.
                    Some(event) if self.is_empty() && is_bare(&event) => Vec::new(),
                    Some(event) => self.merge_before(event),
                    None => self.flush(None).into_iter().collect(),
                };
            }
            WireEvent::Task(_) => {
                self.discard();
                return derived.into_iter().collect();
            }
            WireEvent::ArtifactUpdate(update) if !update.append => self.discard(),
            _ => {}
        }

        let Some(event) = derived else {
            return Vec::new();
        };
        if self.absorb(&event) {
            return Vec::new();
        }
        self.merge_before(event)
    }
}

fn is_bare(event: &Event) -> bool {
    !event.has_content() && !event.is_error() && event.actions.is_empty()
}
