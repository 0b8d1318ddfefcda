//! End-to-end tests: a remote agent talking to an executor in the same process.
//!
//! The in-process client plays the A2A server: it hands each request to an
//! `Executor` and relays the updates it writes, keeping a small task store so
//! follow-up messages continue their task.

use abk_a2a::engine::{self, EventStream, InvocationEngine, InvocationRequest};
use abk_a2a::event::{Content, Event, Part, ROLE_USER};
use abk_a2a::executor::{ExecuteRequest, Executor, ExecutorConfig};
use abk_a2a::metadata;
use abk_a2a::protocol::{AgentCard, Artifact, SendMessageRequest, Task, TaskStatus, WireEvent};
use abk_a2a::remote::{RemoteAgent, RemoteAgentConfig, RemoteClient, RunContext, SharedClientFactory, WireEventStream};
use abk_a2a::BridgeResult;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// Engine replaying one script per invocation
struct ScriptedEngine {
    scripts: Mutex<Vec<Vec<Event>>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedEngine {
    fn new(scripts: Vec<Vec<Event>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InvocationEngine for ScriptedEngine {
    async fn run(&self, request: InvocationRequest) -> BridgeResult<EventStream> {
        self.requests.lock().unwrap().push(request);
        let mut scripts = self.scripts.lock().unwrap();
        let script = if scripts.is_empty() { Vec::new() } else { scripts.remove(0) };
        Ok(engine::from_events(script.into_iter().map(Ok).collect()))
    }
}

// Engine whose turns are served by another remote agent
struct RelayEngine(RemoteAgent);

#[async_trait]
impl InvocationEngine for RelayEngine {
    async fn run(&self, request: InvocationRequest) -> BridgeResult<EventStream> {
        let user = Event::new(ROLE_USER).with_content(request.content.clone());
        Ok(self.0.run(RunContext::new(vec![user]).with_cancel(request.cancel.clone())))
    }
}

type TaskStore = Arc<Mutex<HashMap<String, Task>>>;

struct InProcessClient {
    executor: Arc<Executor>,
    tasks: TaskStore,
}

impl InProcessClient {
    fn new(engine: Arc<dyn InvocationEngine>) -> Arc<Self> {
        Arc::new(Self {
            executor: Arc::new(Executor::new(engine, ExecutorConfig::default())),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn execute_request(&self, request: SendMessageRequest) -> ExecuteRequest {
        let known = request
            .message
            .task_id
            .as_ref()
            .and_then(|id| self.tasks.lock().unwrap().get(id).cloned());
        let mut execute = ExecuteRequest::new(request.message);
        if let Some(task) = known {
            execute = execute.with_task(task);
        }
        execute.metadata = request.metadata.unwrap_or_default();
        execute
    }
}

fn record(tasks: &TaskStore, event: &WireEvent) {
    let mut tasks = tasks.lock().unwrap();
    match event {
        WireEvent::Task(task) => {
            tasks.insert(task.id.clone(), task.clone());
        }
        WireEvent::StatusUpdate(update) => {
            let task = tasks.entry(update.task_id.clone()).or_insert_with(|| Task {
                id: update.task_id.clone(),
                context_id: update.context_id.clone(),
                status: update.status.clone(),
                artifacts: Vec::new(),
                history: Vec::new(),
                metadata: None,
            });
            task.status = update.status.clone();
        }
        _ => {}
    }
}

// Fold a run's updates into the task snapshot a blocking call returns
fn fold_task(events: &[WireEvent]) -> Task {
    let mut ids = (String::new(), String::new());
    let mut status = None;
    let mut artifacts: Vec<Artifact> = Vec::new();
    for event in events {
        match event {
            WireEvent::ArtifactUpdate(update) => {
                match artifacts.iter_mut().find(|a| a.artifact_id == update.artifact.artifact_id) {
                    Some(existing) if update.append => existing.parts.extend(update.artifact.parts.clone()),
                    Some(existing) => *existing = update.artifact.clone(),
                    None => artifacts.push(update.artifact.clone()),
                }
            }
            WireEvent::StatusUpdate(update) => {
                ids = (update.task_id.clone(), update.context_id.clone());
                status = Some(update.status.clone());
            }
            _ => {}
        }
    }
    Task {
        id: ids.0,
        context_id: ids.1,
        status: status.unwrap_or_else(|| TaskStatus::new(abk_a2a::protocol::TaskState::Unknown, None)),
        artifacts,
        history: Vec::new(),
        metadata: None,
    }
}

#[async_trait]
impl RemoteClient for InProcessClient {
    async fn send_message(&self, request: SendMessageRequest) -> BridgeResult<WireEvent> {
        let (tx, mut rx) = mpsc::channel(256);
        self.executor
            .execute(self.execute_request(request), &tx, CancellationToken::new())
            .await?;
        drop(tx);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            record(&self.tasks, &event);
            events.push(event);
        }
        Ok(WireEvent::Task(fold_task(&events)))
    }

    async fn send_message_stream(&self, request: SendMessageRequest) -> BridgeResult<WireEventStream> {
        let (tx, rx) = mpsc::channel(256);
        let executor = Arc::clone(&self.executor);
        let execute = self.execute_request(request);
        tokio::spawn(async move {
            let _ = executor.execute(execute, &tx, CancellationToken::new()).await;
        });

        let tasks = Arc::clone(&self.tasks);
        Ok(Box::pin(futures_util::stream::unfold(rx, move |mut rx| {
            let tasks = Arc::clone(&tasks);
            async move {
                let event = rx.recv().await?;
                record(&tasks, &event);
                Some((Ok(event), rx))
            }
        })))
    }
}

fn remote_agent(name: &str, client: Arc<InProcessClient>, streaming: bool) -> RemoteAgent {
    let config = RemoteAgentConfig {
        name: name.to_string(),
        ..RemoteAgentConfig::default()
    };
    let card = AgentCard::new(name, "in-process").with_streaming(streaming);
    RemoteAgent::new(config, card, Arc::new(SharedClientFactory::new(client)))
}

fn user(parts: Vec<Part>) -> Event {
    Event::new(ROLE_USER).with_content(Content::user(parts))
}

fn fragment(text: &str) -> Event {
    Event::new("writer").with_parts(vec![Part::text(text)]).with_partial(true)
}

fn approval_call() -> Event {
    Event::new("writer")
        .with_parts(vec![Part::function_call("c1", "approve", Map::new())])
        .with_long_running_tool_ids(["c1"])
}

async fn run(agent: &RemoteAgent, history: Vec<Event>) -> Vec<Event> {
    agent
        .run(RunContext::new(history))
        .map(|item| item.expect("run should not fail"))
        .collect()
        .await
}

#[tokio::test]
async fn test_streamed_fragments_arrive_as_one_block() {
    let engine = ScriptedEngine::new(vec![vec![fragment("Hel"), fragment("lo"), Event::new("writer")]]);
    let agent = remote_agent("writer", InProcessClient::new(engine), true);

    let events = run(&agent, vec![user(vec![Part::text("greet me")])]).await;

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.author, "writer");
    assert_eq!(event.parts(), &[Part::text("Hello")]);
    assert!(!event.partial);
    assert_eq!(event.custom_str("a2a:author"), Some("writer"));
    assert!(event.custom_str(metadata::TASK_ID).is_some());
}

#[tokio::test]
async fn test_blocking_call_returns_task_snapshot() {
    let engine = ScriptedEngine::new(vec![vec![Event::new("writer").with_parts(vec![Part::text("Sunny")])]]);
    let agent = remote_agent("writer", InProcessClient::new(engine.clone()), false);

    let events = run(&agent, vec![user(vec![Part::text("weather?")])]).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].parts(), &[Part::text("Sunny")]);
    assert_eq!(events[0].custom_str(metadata::TASK_STATE), Some("completed"));

    let requests = engine.requests.lock().unwrap();
    assert_eq!(requests[0].content.parts, vec![Part::text("weather?")]);
    assert!(requests[0].metadata.contains_key(metadata::INVOCATION_ID));
}

#[tokio::test]
async fn test_input_required_then_answer_continues_task() {
    let engine = ScriptedEngine::new(vec![
        vec![approval_call()],
        vec![Event::new("writer").with_parts(vec![Part::text("approved, sending")])],
    ]);
    let client = InProcessClient::new(engine.clone());
    let agent = remote_agent("writer", client.clone(), true);

    let mut history = vec![user(vec![Part::text("send the report")])];
    let first = run(&agent, history.clone()).await;
    assert_eq!(first.len(), 1);
    let waiting = first[0].clone();
    assert_eq!(waiting.long_running_tool_ids, vec!["c1".to_string()]);
    assert!(waiting.parts()[0].as_function_call().is_some());
    assert_eq!(waiting.custom_str(metadata::TASK_STATE), Some("input-required"));
    let task_id = waiting.custom_str(metadata::TASK_ID).unwrap().to_string();

    let mut answer = Map::new();
    answer.insert("approved".to_string(), json!(true));
    history.push(waiting);
    history.push(user(vec![Part::function_response("c1", "approve", answer)]));
    let second = run(&agent, history).await;

    assert_eq!(second.len(), 1);
    assert_eq!(second[0].parts(), &[Part::text("approved, sending")]);
    assert_eq!(second[0].custom_str(metadata::TASK_ID), Some(task_id.as_str()));

    let requests = engine.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].task_id, task_id);
    assert!(requests[1].content.parts[0].as_function_response().is_some());
}

#[tokio::test]
async fn test_unanswered_call_is_validated_locally() {
    let engine = ScriptedEngine::new(vec![vec![approval_call()]]);
    let agent = remote_agent("writer", InProcessClient::new(engine.clone()), true);

    let mut history = vec![user(vec![Part::text("send the report")])];
    let first = run(&agent, history.clone()).await;
    history.push(first[0].clone());
    history.push(user(vec![Part::text("what do you need?")]));

    let validation = run(&agent, history.clone()).await;
    assert_eq!(validation.len(), 1);
    let event = &validation[0];
    assert!(!event.is_error());
    assert_eq!(event.custom_str(metadata::TASK_STATE), Some("input-required"));
    assert_eq!(
        metadata::string_list(event, metadata::VALIDATION_ERRORS),
        vec!["no input provided for call c1".to_string()]
    );
    assert_eq!(engine.requests.lock().unwrap().len(), 1);

    // Asking again keeps a single error.
    history.push(event.clone());
    history.push(user(vec![Part::text("still confused")]));
    let again = run(&agent, history).await;
    assert_eq!(metadata::string_list(&again[0], metadata::VALIDATION_ERRORS).len(), 1);
}

#[tokio::test]
async fn test_input_required_crosses_two_hops() {
    // planner -> coordinator -> writer, where the writer needs approval
    let writer = ScriptedEngine::new(vec![vec![approval_call()]]);
    let to_writer = remote_agent("writer", InProcessClient::new(writer), true);
    let coordinator = InProcessClient::new(Arc::new(RelayEngine(to_writer)));
    let to_coordinator = remote_agent("coordinator", coordinator, true);

    let events = run(&to_coordinator, vec![user(vec![Part::text("send the report")])]).await;

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.author, "coordinator");
    assert_eq!(event.long_running_tool_ids, vec!["c1".to_string()]);
    assert_eq!(event.parts()[0].as_function_call().unwrap().name, "approve");
    assert_eq!(event.custom_str(metadata::TASK_STATE), Some("input-required"));
    assert!(!event.is_error());
}

#[tokio::test]
async fn test_remote_failure_is_an_error_event() {
    let engine = ScriptedEngine::new(vec![vec![Event::error("writer", "quota", "quota exceeded")]]);
    let agent = remote_agent("writer", InProcessClient::new(engine), true);

    let events = run(&agent, vec![user(vec![Part::text("write")])]).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].error_code.as_deref(), Some("remote_task_failed"));
    assert_eq!(events[0].error_message.as_deref(), Some("quota exceeded"));
    assert_eq!(events[0].custom_str("a2a:error_code"), Some("quota"));
}
