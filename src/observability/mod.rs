//! Observability for the bridge.
//!
//! Runtime diagnostics go through `tracing`. This module adds an optional
//! markdown transcript that an [`Executor`](crate::executor::Executor) writes
//! to when one is attached.
//!
//! # Example
//!
//! ```no_run
//! use abk_a2a::observability::Logger;
//! use abk_a2a::protocol::TaskState;
//!
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//! logger.log_invocation_start("weather", "task-1", "ctx-1", true).unwrap();
//! logger.log_terminal("task-1", TaskState::Completed).unwrap();
//! ```

pub mod logger;

pub use logger::Logger;
