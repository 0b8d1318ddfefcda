//! Error types for the A2A bridge.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors that can occur while translating between internal events and the
/// A2A wire protocol.
///
/// # Example
///
/// ```
/// use abk_a2a::BridgeError;
///
/// let error = BridgeError::conversion("data part has no object payload");
/// assert!(error.to_string().contains("data part"));
/// assert!(error.is_conversion());
/// ```
#[derive(Debug, Error)]
pub enum BridgeError {
	/// A wire part or internal part could not be converted.
	#[error("conversion failed: {message}")]
	Conversion {
		/// Description of the malformed input.
		message: String,
	},

	/// The remote peer could not be reached or answered with a transport failure.
	#[error("transport error: {message}")]
	Transport {
		/// Description of the transport failure.
		message: String,
	},

	/// An interceptor aborted the chain.
	#[error("interceptor {name} failed: {message}")]
	Interceptor {
		/// Name of the interceptor that failed.
		name: String,
		/// Description of the failure.
		message: String,
	},

	/// Writing to the outbound event queue failed.
	#[error("failed to write to event queue: {message}")]
	QueueWrite {
		/// Description of the write failure.
		message: String,
	},

	/// The invocation engine reported an error.
	#[error("invocation engine error: {message}")]
	Engine {
		/// Message reported by the engine.
		message: String,
	},

	/// The request handed to the bridge is unusable.
	#[error("invalid request: {message}")]
	InvalidRequest {
		/// Description of the problem.
		message: String,
	},

	/// A serialization or deserialization error occurred.
	#[error("serialization error: {message}")]
	Serialization {
		/// Description of the serialization error.
		message: String,
	},
}

impl BridgeError {
	/// Create a Conversion error.
	pub fn conversion(message: impl Into<String>) -> Self {
		Self::Conversion {
			message: message.into(),
		}
	}

	/// Create a Transport error.
	pub fn transport(message: impl Into<String>) -> Self {
		Self::Transport {
			message: message.into(),
		}
	}

	/// Create an Interceptor error.
	pub fn interceptor(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Interceptor {
			name: name.into(),
			message: message.into(),
		}
	}

	/// Create a QueueWrite error.
	pub fn queue_write(message: impl Into<String>) -> Self {
		Self::QueueWrite {
			message: message.into(),
		}
	}

	/// Create an Engine error.
	pub fn engine(message: impl Into<String>) -> Self {
		Self::Engine {
			message: message.into(),
		}
	}

	/// Create an InvalidRequest error.
	pub fn invalid_request(message: impl Into<String>) -> Self {
		Self::InvalidRequest {
			message: message.into(),
		}
	}

	/// Create a Serialization error.
	pub fn serialization(message: impl Into<String>) -> Self {
		Self::Serialization {
			message: message.into(),
		}
	}

	/// Whether this is a conversion error.
	pub fn is_conversion(&self) -> bool {
		matches!(self, Self::Conversion { .. })
	}

	/// Whether this is a transport error.
	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport { .. })
	}

	/// Whether this is a queue write error.
	pub fn is_queue_write(&self) -> bool {
		matches!(self, Self::QueueWrite { .. })
	}

	/// The bare message without the variant prefix.
	pub fn message(&self) -> &str {
		match self {
			Self::Conversion { message }
			| Self::Transport { message }
			| Self::Interceptor { message, .. }
			| Self::QueueWrite { message }
			| Self::Engine { message }
			| Self::InvalidRequest { message }
			| Self::Serialization { message } => message,
		}
	}
}

impl From<serde_json::Error> for BridgeError {
	fn from(err: serde_json::Error) -> Self {
		Self::serialization(err.to_string())
	}
}
