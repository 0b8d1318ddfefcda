//! Invocation engine interface.
//!
//! The engine runs the agent tree and produces internal events. The bridge
//! only consumes it through [`InvocationEngine`]; it never looks inside.

use crate::error::BridgeResult;
use crate::event::{Content, Event};
use crate::protocol::Metadata;
use futures_util::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Lazy, single-pass sequence of engine events.
///
/// Dropping the stream early must release everything it holds.
pub type EventStream = Pin<Box<dyn Stream<Item = BridgeResult<Event>> + Send>>;

/// One invocation handed to the engine.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Protocol task id the invocation reports to.
    pub task_id: String,
    /// Conversation id.
    pub context_id: String,
    /// Invocation id assigned by the bridge.
    pub invocation_id: String,
    /// Caller input.
    pub content: Content,
    /// Request metadata from the wire.
    pub metadata: Metadata,
    /// Fired when the invocation is canceled.
    pub cancel: CancellationToken,
}

/// Produces the internal event stream for an invocation.
///
/// # Example
///
/// ```
/// use abk_a2a::engine::{self, EventStream, InvocationEngine, InvocationRequest};
/// use abk_a2a::event::{Event, Part};
/// use abk_a2a::BridgeResult;
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl InvocationEngine for Echo {
///     async fn run(&self, request: InvocationRequest) -> BridgeResult<EventStream> {
///         let reply = Event::new("echo").with_content(request.content.clone());
///         Ok(engine::from_events(vec![Ok(reply)]))
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait InvocationEngine: Send + Sync {
    /// Start an invocation and return its event stream.
    async fn run(&self, request: InvocationRequest) -> BridgeResult<EventStream>;
}

/// Wrap a fixed list of results as an [`EventStream`].
pub fn from_events(events: Vec<BridgeResult<Event>>) -> EventStream {
    Box::pin(futures_util::stream::iter(events))
}
