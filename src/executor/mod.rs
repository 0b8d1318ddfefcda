//! Outbound executor: drives one invocation and reports it as A2A task updates.
//!
//! ```text
//!   submitted (new task only) ─▶ working ─▶ artifact updates ... ─▶ terminal
//!                                                       completed | failed |
//!                                                  input-required | canceled
//! ```
//!
//! Every run owns its own aggregator, tracker and resolver. The last update
//! written for a task is always marked `final`, unless writing to the queue
//! itself failed.

mod artifacts;

use crate::aggregator::StreamingAggregator;
use crate::codec::{self, PartCodec};
use crate::engine::{EventStream, InvocationEngine, InvocationRequest};
use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;
use crate::metadata;
use crate::observability::Logger;
use crate::protocol::{Message, Metadata, Task, TaskState, TaskStatus, TaskStatusUpdateEvent, WireEvent};
use crate::resolver::TaskStateResolver;
use crate::tracker::{LongRunningTracker, PendingCall};
use artifacts::ArtifactWriter;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Error code recorded when an engine event cannot be converted.
pub const CONVERSION_ERROR_CODE: &str = "conversion_error";

/// Ordered sink for outbound wire updates.
#[async_trait::async_trait]
pub trait EventQueue: Send + Sync {
    /// Append one update. A failure aborts the run.
    async fn write(&self, event: WireEvent) -> BridgeResult<()>;
}

#[async_trait::async_trait]
impl EventQueue for mpsc::Sender<WireEvent> {
    async fn write(&self, event: WireEvent) -> BridgeResult<()> {
        self.send(event)
            .await
            .map_err(|_| BridgeError::queue_write("event queue receiver dropped"))
    }
}

/// Executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Name reported as the author of the run.
    pub agent_name: String,
    /// Write partial fragments to an ephemeral artifact while streaming.
    pub emit_partial_artifacts: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            agent_name: "agent".to_string(),
            emit_partial_artifacts: true,
        }
    }
}

/// A message to execute, optionally continuing an existing task.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// Caller message.
    pub message: Message,
    /// Stored task the message continues, if any.
    pub task: Option<Task>,
    /// Request metadata.
    pub metadata: Metadata,
}

impl ExecuteRequest {
    /// Create a request for a message.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            task: None,
            metadata: Metadata::new(),
        }
    }

    /// Continue an existing task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }
}

/// Per-run translation state.
struct Run<'a> {
    task_id: &'a str,
    context_id: &'a str,
    queue: &'a dyn EventQueue,
    cancel: &'a CancellationToken,
    writer: ArtifactWriter<'a>,
    aggregator: StreamingAggregator,
    tracker: LongRunningTracker,
    resolver: TaskStateResolver,
}

/// Translates an invocation engine's event stream into A2A task updates.
pub struct Executor {
    engine: Arc<dyn InvocationEngine>,
    codec: PartCodec,
    config: ExecutorConfig,
    logger: Option<Arc<Logger>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("codec", &self.codec)
            .field("config", &self.config)
            .finish()
    }
}

impl Executor {
    /// Create an executor for an engine.
    pub fn new(engine: Arc<dyn InvocationEngine>, config: ExecutorConfig) -> Self {
        Self {
            engine,
            codec: PartCodec::new(),
            config,
            logger: None,
        }
    }

    /// Use a codec with custom part converters.
    pub fn with_codec(mut self, codec: PartCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Attach a transcript logger.
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Executor settings.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one invocation to its terminal update.
    ///
    /// Returns an error only when the request is unusable or a queue write
    /// failed; every other failure ends in a `failed` terminal update.
    pub async fn execute(
        &self,
        request: ExecuteRequest,
        queue: &dyn EventQueue,
        cancel: CancellationToken,
    ) -> BridgeResult<()> {
        if request.message.parts.is_empty() {
            return Err(BridgeError::invalid_request("message has no parts"));
        }

        let is_new = request.task.is_none();
        let (task_id, context_id) = match &request.task {
            Some(task) => (task.id.clone(), task.context_id.clone()),
            None => (
                request
                    .message
                    .task_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                request
                    .message
                    .context_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ),
        };
        tracing::debug!(task_id = %task_id, new_task = is_new, "Executing A2A request");
        self.transcript(|logger| logger.log_invocation_start(&self.config.agent_name, &task_id, &context_id, is_new));

        let mut run = Run {
            task_id: &task_id,
            context_id: &context_id,
            queue,
            cancel: &cancel,
            writer: ArtifactWriter::new(&task_id, &context_id, &self.codec),
            aggregator: StreamingAggregator::new(),
            tracker: LongRunningTracker::new(),
            resolver: TaskStateResolver::new(),
        };
        if let Some(task) = &request.task {
            run.tracker.resume(pending_calls(task));
        }

        if is_new {
            let mut message = request.message.clone();
            message.task_id = Some(task_id.clone());
            message.context_id = Some(context_id.clone());
            let task = Task {
                id: task_id.clone(),
                context_id: context_id.clone(),
                status: TaskStatus::new(TaskState::Submitted, None),
                artifacts: Vec::new(),
                history: vec![message],
                metadata: None,
            };
            self.emit(&run, WireEvent::Task(task)).await?;
        }
        let working = TaskStatusUpdateEvent::new(&task_id, &context_id, TaskState::Working, None, false);
        self.emit(&run, working.into()).await?;

        let content = match self.codec.message_to_content(&request.message) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(task_id = %task_id, "Request message conversion failed: {}", e);
                run.resolver.record_failure(Some(CONVERSION_ERROR_CODE.to_string()), e.to_string());
                return self.finish(&mut run).await;
            }
        };

        let engine_request = InvocationRequest {
            task_id: task_id.clone(),
            context_id: context_id.clone(),
            invocation_id: Uuid::new_v4().to_string(),
            content,
            metadata: request.metadata.clone(),
            cancel: cancel.child_token(),
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancel_run(&run).await,
            started = self.engine.run(engine_request) => started,
        };
        let mut stream: EventStream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                run.resolver.record_failure(None, e.message());
                return self.finish(&mut run).await;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(stream);
                    return self.cancel_run(&run).await;
                }
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Err(e)) => {
                    tracing::warn!(task_id = %task_id, "Invocation engine failed: {}", e);
                    run.resolver.record_failure(None, e.message());
                    break;
                }
                Some(Ok(event)) => match self.process_event(&mut run, event).await {
                    Ok(()) => {}
                    Err(e) if e.is_queue_write() => return Err(e),
                    Err(e) => {
                        run.resolver.record_failure(Some(CONVERSION_ERROR_CODE.to_string()), e.to_string());
                        break;
                    }
                },
            }
        }

        drop(stream);
        self.finish(&mut run).await
    }

    /// Write a `canceled` terminal for an externally canceled task.
    pub async fn cancel(&self, task: &Task, queue: &dyn EventQueue) -> BridgeResult<()> {
        if task.status.state.is_terminal() {
            return Err(BridgeError::invalid_request(format!(
                "task {} is already {}",
                task.id, task.status.state
            )));
        }
        let update = TaskStateResolver::new().canceled(&task.id, &task.context_id);
        let event = WireEvent::StatusUpdate(update);
        self.transcript(|logger| logger.log_wire_event(&event));
        queue.write(event).await?;
        self.transcript(|logger| logger.log_terminal(&task.id, TaskState::Canceled));
        Ok(())
    }

    async fn process_event(&self, run: &mut Run<'_>, event: Event) -> BridgeResult<()> {
        run.resolver.record(&event);
        let Some(event) = run.tracker.process(&event) else {
            return Ok(());
        };

        if event.partial {
            // Errors and actions were recorded above; only output is written.
            if !event.has_content() {
                return Ok(());
            }
            if run.aggregator.absorb(&event) && !self.config.emit_partial_artifacts {
                return Ok(());
            }
            if self.config.emit_partial_artifacts {
                let fragment = run.writer.partial_fragment(&event)?;
                return self.emit(run, fragment).await;
            }
        }

        if event.parts().iter().any(|p| p.is_text()) {
            run.aggregator.discard();
        }
        let mut events = run.aggregator.merge_before(event).into_iter();
        if run.writer.open_partial().is_some() {
            if let Some(first) = events.next() {
                if let Some(update) = run.writer.close_partial(&first)? {
                    self.emit(run, update).await?;
                }
            }
        }
        for event in events {
            if let Some(update) = run.writer.main(&event)? {
                self.emit(run, update).await?;
            }
        }
        Ok(())
    }

    /// Flush in-flight content, close the partial artifact and write the terminal.
    async fn finish(&self, run: &mut Run<'_>) -> BridgeResult<()> {
        if run.cancel.is_cancelled() {
            return self.cancel_run(run).await;
        }
        let block = run.aggregator.flush(None);
        if let Some(artifact_id) = run.writer.open_partial().map(str::to_string) {
            match &block {
                Some(block) => {
                    if let Some(update) = run.writer.close_partial(block)? {
                        self.emit(run, update).await?;
                    }
                }
                None => {
                    let update = run
                        .resolver
                        .closing_partial_update(run.task_id, run.context_id, &artifact_id);
                    run.writer.mark_partial_closed();
                    self.emit(run, update.into()).await?;
                }
            }
        } else if let Some(block) = &block {
            if let Some(update) = run.writer.main(block)? {
                self.emit(run, update).await?;
            }
        }

        let input_required = run
            .tracker
            .input_required_message(&self.codec, run.task_id, run.context_id)?;
        let terminal = run.resolver.resolve(run.task_id, run.context_id, input_required);
        let state = terminal.status.state;
        if let Some(failure) = run.resolver.failure() {
            let message = failure.message.clone();
            self.transcript(|logger| logger.log_error(&message, None));
        }
        self.write(run, terminal.into()).await?;
        self.transcript(|logger| logger.log_terminal(run.task_id, state));
        Ok(())
    }

    async fn cancel_run(&self, run: &Run<'_>) -> BridgeResult<()> {
        tracing::debug!(task_id = %run.task_id, "Invocation canceled");
        let update = run.resolver.canceled(run.task_id, run.context_id);
        self.write(run, update.into()).await?;
        self.transcript(|logger| logger.log_terminal(run.task_id, TaskState::Canceled));
        Ok(())
    }

    /// Write a non-terminal update.
    ///
    /// Once the run is canceled the update is dropped, so a stalled queue
    /// cannot hold the run past cancellation.
    async fn emit(&self, run: &Run<'_>, event: WireEvent) -> BridgeResult<()> {
        tokio::select! {
            biased;
            _ = run.cancel.cancelled() => {
                tracing::debug!(task_id = %run.task_id, "Dropping update of canceled run");
                Ok(())
            }
            written = self.write(run, event) => written,
        }
    }

    async fn write(&self, run: &Run<'_>, event: WireEvent) -> BridgeResult<()> {
        self.transcript(|logger| logger.log_wire_event(&event));
        run.queue.write(event).await
    }

    fn transcript<F>(&self, f: F)
    where
        F: FnOnce(&Logger) -> anyhow::Result<()>,
    {
        if let Some(logger) = &self.logger {
            if let Err(e) = f(logger) {
                tracing::warn!("Failed to write transcript: {:#}", e);
            }
        }
    }
}

/// Long-running calls a stored task is still waiting on.
fn pending_calls(task: &Task) -> Vec<PendingCall> {
    if task.status.state != TaskState::InputRequired {
        return Vec::new();
    }
    let Some(message) = &task.status.message else {
        return Vec::new();
    };
    let invocation_id = message
        .metadata
        .as_ref()
        .and_then(|meta| meta.get(metadata::INVOCATION_ID))
        .and_then(Value::as_str)
        .unwrap_or_default();
    codec::long_running_ids(&message.parts)
        .into_iter()
        .map(|call_id| PendingCall {
            call_id,
            invocation_id: invocation_id.to_string(),
        })
        .collect()
}
