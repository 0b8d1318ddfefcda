//! ABK A2A - Bridge between an agent invocation engine and the A2A protocol
//!
//! The bridge translates in both directions:
//!
//! - **outbound** - the [`executor`] drives a local invocation and reports it
//!   to a remote caller as A2A task status and artifact updates;
//! - **inbound** - a [`remote`] agent forwards the conversation to an A2A peer
//!   and turns its replies back into internal events.
//!
//! The building blocks shared by both directions are always compiled:
//! [`codec`], [`aggregator`], [`tracker`], [`resolver`] and [`metadata`].
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! abk-a2a = { version = "0.1" }                       # bridge (default)
//! abk-a2a = { version = "0.1", features = ["config"] }
//! abk-a2a = { version = "0.1", features = ["all"] }
//! ```
//!
//! # Example: serving a local engine
//!
//! ```ignore
//! use abk_a2a::executor::{ExecuteRequest, Executor, ExecutorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let executor = Executor::new(engine, ExecutorConfig::default());
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! executor.execute(ExecuteRequest::new(message), &tx, CancellationToken::new()).await?;
//! while let Some(update) = rx.recv().await {
//!     println!("{:?}", update);
//! }
//! ```

#![warn(missing_docs)]

/// Bridge error type.
pub mod error;

/// Internal event model.
pub mod event;

/// A2A wire model.
pub mod protocol;

/// Metadata key namespacing.
pub mod metadata;

/// Content-part codec.
pub mod codec;

/// Streaming text aggregation.
pub mod aggregator;

/// Long-running call tracking.
pub mod tracker;

/// Terminal task-state resolution.
pub mod resolver;

/// Invocation engine interface (enabled with the `bridge` feature)
#[cfg(feature = "bridge")]
pub mod engine;

/// Remote call interceptors (enabled with the `bridge` feature)
#[cfg(feature = "bridge")]
pub mod interceptor;

/// Outbound executor (enabled with the `bridge` feature)
#[cfg(feature = "bridge")]
pub mod executor;

/// Inbound remote agent (enabled with the `bridge` feature)
#[cfg(feature = "bridge")]
pub mod remote;

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

pub use error::{BridgeError, BridgeResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::event::{Content, Event, Part};
    pub use crate::protocol::{AgentCard, Message, Task, TaskState, WireEvent};

    #[cfg(feature = "bridge")]
    pub use crate::engine::{EventStream, InvocationEngine, InvocationRequest};

    #[cfg(feature = "bridge")]
    pub use crate::executor::{EventQueue, ExecuteRequest, Executor, ExecutorConfig};

    #[cfg(feature = "bridge")]
    pub use crate::remote::{ClientFactory, RemoteAgent, RemoteAgentConfig, RemoteClient, RunContext};

    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;
}
