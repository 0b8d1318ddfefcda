//! Remote peer interface.

use crate::error::BridgeResult;
use crate::protocol::{AgentCard, SendMessageRequest, WireEvent};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// Wire events delivered by a streaming call, in arrival order.
pub type WireEventStream = Pin<Box<dyn Stream<Item = BridgeResult<WireEvent>> + Send>>;

/// A connection to one remote A2A agent.
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    /// Send a message and wait for the single reply.
    async fn send_message(&self, request: SendMessageRequest) -> BridgeResult<WireEvent>;

    /// Send a message and subscribe to the task's updates.
    async fn send_message_stream(&self, request: SendMessageRequest) -> BridgeResult<WireEventStream>;
}

/// Selects a client for an agent card.
pub trait ClientFactory: Send + Sync {
    /// Create a client, or fail when no compatible channel exists.
    fn create(&self, card: &AgentCard) -> BridgeResult<Arc<dyn RemoteClient>>;
}

/// Factory handing out one pre-built client for every card.
#[derive(Clone)]
pub struct SharedClientFactory {
    client: Arc<dyn RemoteClient>,
}

impl SharedClientFactory {
    /// Wrap a client.
    pub fn new(client: Arc<dyn RemoteClient>) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for SharedClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClientFactory").finish_non_exhaustive()
    }
}

impl ClientFactory for SharedClientFactory {
    fn create(&self, _card: &AgentCard) -> BridgeResult<Arc<dyn RemoteClient>> {
        Ok(Arc::clone(&self.client))
    }
}
