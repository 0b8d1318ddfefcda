//! Interceptor chains around remote calls.
//!
//! Interceptors run in registration order. The first one that returns an
//! event or an error ends the chain; later interceptors never run.

use crate::error::{BridgeError, BridgeResult};
use crate::event::Event;
use crate::protocol::SendMessageRequest;
use crate::remote::RunContext;
use std::fmt;
use std::sync::Arc;

/// Runs before a request is sent to the remote agent.
///
/// May edit the request in place. Returning `Some(event)` skips the call and
/// yields that event instead.
#[async_trait::async_trait]
pub trait BeforeRequestInterceptor: Send + Sync {
	/// Interceptor name, used in errors and logs.
	fn name(&self) -> &str;

	/// Inspect or edit the outgoing request.
	async fn before_request(
		&self,
		ctx: &RunContext,
		request: &mut SendMessageRequest,
	) -> BridgeResult<Option<Event>>;
}

/// Runs on every event converted from the remote agent's reply.
///
/// Returning `Some(event)` replaces the converted event.
#[async_trait::async_trait]
pub trait AfterEventInterceptor: Send + Sync {
	/// Interceptor name, used in errors and logs.
	fn name(&self) -> &str;

	/// Inspect or replace a converted event.
	async fn after_event(
		&self,
		ctx: &RunContext,
		request: &SendMessageRequest,
		event: &Event,
	) -> BridgeResult<Option<Event>>;
}

/// Ordered before-request and after-event interceptor lists.
#[derive(Clone, Default)]
pub struct InterceptorChain {
	before: Vec<Arc<dyn BeforeRequestInterceptor>>,
	after: Vec<Arc<dyn AfterEventInterceptor>>,
}

impl fmt::Debug for InterceptorChain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InterceptorChain")
			.field("before", &self.before.iter().map(|i| i.name()).collect::<Vec<_>>())
			.field("after", &self.after.iter().map(|i| i.name()).collect::<Vec<_>>())
			.finish()
	}
}

impl InterceptorChain {
	/// Create an empty chain.
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a before-request interceptor.
	pub fn with_before(mut self, interceptor: Arc<dyn BeforeRequestInterceptor>) -> Self {
		self.before.push(interceptor);
		self
	}

	/// Append an after-event interceptor.
	pub fn with_after(mut self, interceptor: Arc<dyn AfterEventInterceptor>) -> Self {
		self.after.push(interceptor);
		self
	}

	/// Whether no interceptor is registered.
	pub fn is_empty(&self) -> bool {
		self.before.is_empty() && self.after.is_empty()
	}

	/// Run the before-request interceptors.
	pub async fn run_before(
		&self,
		ctx: &RunContext,
		request: &mut SendMessageRequest,
	) -> BridgeResult<Option<Event>> {
		for interceptor in &self.before {
			let result = interceptor
				.before_request(ctx, request)
				.await
				.map_err(|e| wrap(interceptor.name(), e))?;
			if let Some(event) = result {
				tracing::debug!("Before-request interceptor {} short-circuited the call", interceptor.name());
				return Ok(Some(event));
			}
		}
		Ok(None)
	}

	/// Run the after-event interceptors, returning the event to relay.
	pub async fn run_after(
		&self,
		ctx: &RunContext,
		request: &SendMessageRequest,
		event: Event,
	) -> BridgeResult<Event> {
		for interceptor in &self.after {
			let result = interceptor
				.after_event(ctx, request, &event)
				.await
				.map_err(|e| wrap(interceptor.name(), e))?;
			if let Some(replacement) = result {
				return Ok(replacement);
			}
		}
		Ok(event)
	}
}

fn wrap(name: &str, error: BridgeError) -> BridgeError {
	match error {
		BridgeError::Interceptor { .. } => error,
		other => BridgeError::interceptor(name, other.message()),
	}
}
