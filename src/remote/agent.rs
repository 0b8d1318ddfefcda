//! Remote agent run loop.

use super::client::ClientFactory;
use super::convert::wire_to_event;
use super::request::build_outgoing;
use super::{RunContext, REMOTE_CONVERSION_ERROR, REMOTE_TRANSPORT_ERROR};
use crate::aggregator::StreamingAggregator;
use crate::codec::PartCodec;
use crate::engine::EventStream;
use crate::error::BridgeResult;
use crate::event::Event;
use crate::interceptor::InterceptorChain;
use crate::metadata;
use crate::protocol::{AgentCard, Metadata, SendMessageRequest, WireEvent};
use crate::tracker::validate_pending_input;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Remote agent settings.
#[derive(Debug, Clone)]
pub struct RemoteAgentConfig {
    /// Name the agent's events are authored by.
    pub name: String,
    /// Prefer streaming calls when the agent card allows them.
    pub streaming: bool,
    /// Capacity of the channel between the run task and the consumer.
    pub channel_capacity: usize,
    /// Metadata added to every outgoing request.
    pub request_metadata: Metadata,
}

impl Default for RemoteAgentConfig {
    fn default() -> Self {
        Self {
            name: "remote_agent".to_string(),
            streaming: true,
            channel_capacity: 32,
            request_metadata: Metadata::new(),
        }
    }
}

type EventSender = mpsc::Sender<BridgeResult<Event>>;

/// A local agent whose turns are served by a remote A2A peer.
///
/// # Example
///
/// ```no_run
/// use abk_a2a::protocol::AgentCard;
/// use abk_a2a::remote::{RemoteAgent, RemoteAgentConfig, RemoteClient, RunContext, SharedClientFactory};
/// use futures_util::StreamExt;
/// use std::sync::Arc;
///
/// # async fn example(client: Arc<dyn RemoteClient>, history: Vec<abk_a2a::event::Event>) {
/// let card = AgentCard::new("weather", "http://localhost:9000").with_streaming(true);
/// let agent = RemoteAgent::new(RemoteAgentConfig::default(), card, Arc::new(SharedClientFactory::new(client)));
///
/// let mut events = agent.run(RunContext::new(history));
/// while let Some(event) = events.next().await {
///     println!("{:?}", event);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct RemoteAgent {
    config: RemoteAgentConfig,
    card: AgentCard,
    factory: Arc<dyn ClientFactory>,
    codec: PartCodec,
    interceptors: InterceptorChain,
}

impl std::fmt::Debug for RemoteAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgent")
            .field("config", &self.config)
            .field("card", &self.card)
            .field("interceptors", &self.interceptors)
            .finish()
    }
}

impl RemoteAgent {
    /// Create a remote agent for a card.
    pub fn new(config: RemoteAgentConfig, card: AgentCard, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            card,
            factory,
            codec: PartCodec::new(),
            interceptors: InterceptorChain::new(),
        }
    }

    /// Use a codec with custom part converters.
    pub fn with_codec(mut self, codec: PartCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Use an interceptor chain.
    pub fn with_interceptors(mut self, interceptors: InterceptorChain) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Agent name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The card the agent talks to.
    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Run one turn against the remote peer.
    ///
    /// The exchange happens on a spawned task; events arrive in order. The
    /// task stops when the run's cancellation token fires or the returned
    /// stream is dropped.
    pub fn run(&self, ctx: RunContext) -> EventStream {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let agent = self.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    tracing::debug!(agent = %agent.config.name, "Remote agent run canceled");
                }
                _ = tx.closed() => {
                    tracing::debug!(agent = %agent.config.name, "Remote agent consumer dropped");
                }
                _ = agent.exchange(&ctx, &tx) => {}
            }
        });

        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    async fn exchange(&self, ctx: &RunContext, tx: &EventSender) {
        let name = self.config.name.as_str();
        if ctx.events.is_empty() {
            send(tx, Ok(self.empty_event(ctx))).await;
            return;
        }

        let outgoing = match build_outgoing(name, &ctx.events, &self.codec) {
            Ok(Some(outgoing)) => outgoing,
            Ok(None) => {
                send(tx, Ok(self.empty_event(ctx))).await;
                return;
            }
            Err(e) => {
                send(tx, Ok(ctx.error_event(name, REMOTE_CONVERSION_ERROR, e.message()))).await;
                return;
            }
        };

        if let Some(mut event) = validate_pending_input(name, outgoing.previous.as_ref(), &outgoing.parts) {
            event.invocation_id = ctx.invocation_id.clone();
            send(tx, Ok(event)).await;
            return;
        }

        let mut request = SendMessageRequest::new(outgoing.message);
        request.metadata = Some(self.request_metadata(ctx));

        match self.interceptors.run_before(ctx, &mut request).await {
            Ok(None) => {}
            Ok(Some(event)) => {
                send(tx, Ok(event)).await;
                return;
            }
            Err(e) => {
                send(tx, Err(e)).await;
                return;
            }
        }

        let client = match self.factory.create(&self.card) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(agent = name, url = %self.card.url, "No client for remote agent: {}", e);
                let error = ctx.error_event(name, REMOTE_TRANSPORT_ERROR, e.message());
                self.deliver(ctx, tx, &request, error).await;
                return;
            }
        };

        let mut aggregator = StreamingAggregator::new();
        if self.config.streaming && self.card.capabilities.streaming {
            let mut stream = match client.send_message_stream(request.clone()).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.transport_error(ctx, tx, &request, &e.to_string()).await;
                    return;
                }
            };
            while let Some(item) = stream.next().await {
                let wire = match item {
                    Ok(wire) => wire,
                    Err(e) => {
                        self.transport_error(ctx, tx, &request, &e.to_string()).await;
                        return;
                    }
                };
                if !self.relay(ctx, tx, &request, &mut aggregator, &wire).await {
                    return;
                }
            }
        } else {
            match client.send_message(request.clone()).await {
                Ok(wire) => {
                    if !self.relay(ctx, tx, &request, &mut aggregator, &wire).await {
                        return;
                    }
                }
                Err(e) => {
                    self.transport_error(ctx, tx, &request, &e.to_string()).await;
                    return;
                }
            }
        }

        // The reply ended without a terminal update.
        if let Some(event) = aggregator.flush(None) {
            self.deliver(ctx, tx, &request, event).await;
        }
    }

    /// Convert one wire event and deliver what the aggregator releases.
    ///
    /// Returns `false` when the run must stop.
    async fn relay(
        &self,
        ctx: &RunContext,
        tx: &EventSender,
        request: &SendMessageRequest,
        aggregator: &mut StreamingAggregator,
        wire: &WireEvent,
    ) -> bool {
        let name = self.config.name.as_str();
        let derived = match wire_to_event(&self.codec, name, ctx, wire) {
            Ok(derived) => derived,
            Err(e) => {
                tracing::warn!(agent = name, "Failed to convert remote reply: {}", e);
                if let Some(block) = aggregator.flush(None) {
                    if !self.deliver(ctx, tx, request, block).await {
                        return false;
                    }
                }
                let error = ctx.error_event(name, REMOTE_CONVERSION_ERROR, e.message());
                self.deliver(ctx, tx, request, error).await;
                return false;
            }
        };

        for event in aggregator.observe(wire, derived) {
            if !self.deliver(ctx, tx, request, event).await {
                return false;
            }
        }
        true
    }

    /// Run the after-event interceptors and send the result.
    async fn deliver(&self, ctx: &RunContext, tx: &EventSender, request: &SendMessageRequest, event: Event) -> bool {
        match self.interceptors.run_after(ctx, request, event).await {
            Ok(event) => send(tx, Ok(event)).await,
            Err(e) => {
                send(tx, Err(e)).await;
                false
            }
        }
    }

    async fn transport_error(&self, ctx: &RunContext, tx: &EventSender, request: &SendMessageRequest, message: &str) {
        tracing::warn!(agent = %self.config.name, url = %self.card.url, "Remote call failed: {}", message);
        let error = ctx.error_event(&self.config.name, REMOTE_TRANSPORT_ERROR, message);
        self.deliver(ctx, tx, request, error).await;
    }

    fn empty_event(&self, ctx: &RunContext) -> Event {
        let mut event = ctx.event(&self.config.name);
        event.turn_complete = true;
        event
    }

    fn request_metadata(&self, ctx: &RunContext) -> Metadata {
        let mut meta = self.config.request_metadata.clone();
        meta.insert(
            metadata::INVOCATION_ID.to_string(),
            Value::String(ctx.invocation_id.clone()),
        );
        meta
    }
}

/// Send an item to the consumer. Returns `false` once the consumer is gone.
async fn send(tx: &EventSender, item: BridgeResult<Event>) -> bool {
    tx.send(item).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Content, Part, ROLE_USER};
    use crate::protocol::{Artifact, Message, Role, TaskArtifactUpdateEvent, TaskState, TaskStatusUpdateEvent, WirePart};
    use crate::remote::{RemoteClient, SharedClientFactory, WireEventStream};
    use crate::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedClient {
        replies: Mutex<Vec<BridgeResult<WireEvent>>>,
        requests: Mutex<Vec<SendMessageRequest>>,
        stream_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(replies: Vec<BridgeResult<WireEvent>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
                stream_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl RemoteClient for ScriptedClient {
        async fn send_message(&self, request: SendMessageRequest) -> BridgeResult<WireEvent> {
            self.requests.lock().unwrap().push(request);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(BridgeError::transport("no reply scripted"));
            }
            replies.remove(0)
        }

        async fn send_message_stream(&self, request: SendMessageRequest) -> BridgeResult<WireEventStream> {
            self.requests.lock().unwrap().push(request);
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            let replies = std::mem::take(&mut *self.replies.lock().unwrap());
            Ok(Box::pin(futures_util::stream::iter(replies)))
        }
    }

    fn agent(client: Arc<ScriptedClient>, streaming: bool) -> RemoteAgent {
        let config = RemoteAgentConfig {
            name: "remote".to_string(),
            ..RemoteAgentConfig::default()
        };
        let card = AgentCard::new("remote", "http://localhost:9000").with_streaming(streaming);
        RemoteAgent::new(config, card, Arc::new(SharedClientFactory::new(client)))
    }

    fn history() -> Vec<Event> {
        vec![Event::new(ROLE_USER).with_content(Content::user(vec![Part::text("hi")]))]
    }

    fn fragment(text: &str) -> BridgeResult<WireEvent> {
        let mut meta = Metadata::new();
        meta.insert(metadata::PARTIAL.to_string(), Value::Bool(true));
        Ok(WireEvent::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t1".to_string(),
            context_id: "c1".to_string(),
            artifact: Artifact {
                artifact_id: "p1".to_string(),
                name: None,
                parts: vec![WirePart::text(text)],
                metadata: None,
            },
            append: true,
            last_chunk: false,
            metadata: Some(meta),
        }))
    }

    fn completed() -> BridgeResult<WireEvent> {
        Ok(TaskStatusUpdateEvent::new("t1", "c1", TaskState::Completed, None, true).into())
    }

    async fn collect(stream: EventStream) -> Vec<BridgeResult<Event>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_streaming_reply_is_aggregated() {
        let client = ScriptedClient::new(vec![fragment("Hel"), fragment("lo"), completed()]);
        let events = collect(agent(client.clone(), true).run(RunContext::new(history()))).await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.parts(), &[Part::text("Hello")]);
        assert!(event.turn_complete);
        assert_eq!(event.custom_str(metadata::TASK_STATE), Some("completed"));
        assert_eq!(client.stream_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blocking_when_card_cannot_stream() {
        let reply = Message::new(Role::Agent, vec![WirePart::text("sunny")]).for_task("t1", "c1");
        let client = ScriptedClient::new(vec![Ok(WireEvent::Message(reply))]);
        let events = collect(agent(client.clone(), false).run(RunContext::new(history()))).await;

        assert_eq!(client.stream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().parts(), &[Part::text("sunny")]);

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].message.parts, vec![WirePart::text("hi")]);
        let meta = requests[0].metadata.as_ref().unwrap();
        assert!(meta.contains_key(metadata::INVOCATION_ID));
    }

    #[tokio::test]
    async fn test_empty_conversation_skips_peer() {
        let client = ScriptedClient::new(vec![completed()]);
        let events = collect(agent(client.clone(), true).run(RunContext::new(Vec::new()))).await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert!(!event.has_content());
        assert!(!event.is_error());
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream_stops() {
        let client = ScriptedClient::new(vec![
            fragment("Hel"),
            Err(BridgeError::transport("connection reset")),
            completed(),
        ]);
        let events = collect(agent(client, true).run(RunContext::new(history()))).await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.error_code.as_deref(), Some(REMOTE_TRANSPORT_ERROR));
        assert!(event.error_message.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_stream_without_terminal_flushes() {
        let client = ScriptedClient::new(vec![fragment("Hel"), fragment("lo")]);
        let events = collect(agent(client, true).run(RunContext::new(history()))).await;

        assert_eq!(events.len(), 1);
        let event = events[0].as_ref().unwrap();
        assert_eq!(event.parts(), &[Part::text("Hello")]);
        assert!(!event.partial);
    }

    #[tokio::test]
    async fn test_canceled_run_emits_nothing() {
        let client = ScriptedClient::new(vec![fragment("Hel"), completed()]);
        let ctx = RunContext::new(history());
        ctx.cancel.cancel();
        let events = collect(agent(client, true).run(ctx)).await;
        assert!(events.is_empty());
    }
}
