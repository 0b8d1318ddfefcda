//! Inbound side: a local agent backed by a remote A2A peer.
//!
//! ```text
//!   conversation ─▶ outgoing message ─▶ validation ─▶ before-request interceptors
//!        ─▶ RemoteClient (blocking | streaming) ─▶ wire events
//!        ─▶ convert ─▶ aggregator ─▶ after-event interceptors ─▶ EventStream
//! ```

mod agent;
mod client;
mod convert;
mod request;

pub use agent::{RemoteAgent, RemoteAgentConfig};
pub use client::{ClientFactory, RemoteClient, SharedClientFactory, WireEventStream};
pub use convert::wire_to_event;
pub use request::{build_outgoing, OutgoingMessage};

use crate::event::Event;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Error code of an event reporting a failed remote call.
pub const REMOTE_TRANSPORT_ERROR: &str = "remote_transport_error";
/// Error code of an event reporting an unconvertible remote reply.
pub const REMOTE_CONVERSION_ERROR: &str = "remote_conversion_error";
/// Error code of an event reporting a remote task that ended in `failed`.
pub const REMOTE_TASK_FAILED: &str = "remote_task_failed";

/// Conversation state handed to one remote agent run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Invocation id stamped on every produced event.
    pub invocation_id: String,
    /// Branch of the agent tree the run belongs to.
    pub branch: Option<String>,
    /// Session events so far, oldest first.
    pub events: Vec<Event>,
    /// Fired to stop the run.
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Create a context over a conversation with a fresh invocation id.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            invocation_id: Uuid::new_v4().to_string(),
            branch: None,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing invocation id.
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = invocation_id.into();
        self
    }

    /// Set the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start an event authored by `author` in this invocation.
    pub(crate) fn event(&self, author: &str) -> Event {
        let mut event = Event::new(author).with_invocation_id(self.invocation_id.clone());
        event.branch = self.branch.clone();
        event
    }

    /// An error event authored by `author` in this invocation.
    pub(crate) fn error_event(&self, author: &str, code: &str, message: impl Into<String>) -> Event {
        let mut event = Event::error(author, code, message).with_invocation_id(self.invocation_id.clone());
        event.branch = self.branch.clone();
        event
    }
}
