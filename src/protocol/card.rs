//! Remote agent descriptor.

use serde::{Deserialize, Serialize};

/// Optional protocol features an agent supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Whether the agent can stream updates.
    #[serde(default)]
    pub streaming: bool,
}

/// Public description of a remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Endpoint the agent is reachable at.
    pub url: String,
    /// Supported capabilities.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

impl AgentCard {
    /// Create a card with no optional capabilities.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            capabilities: AgentCapabilities::default(),
        }
    }

    /// Set the streaming capability.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.capabilities.streaming = streaming;
        self
    }
}
