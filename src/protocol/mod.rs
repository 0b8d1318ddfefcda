//! A2A wire model.
//!
//! Every wire element is a tagged union with an explicit `kind`
//! discriminator and an `Unknown` catch-all, so newer peers never make
//! deserialization fail outright.

mod card;
mod events;
mod types;

pub use card::{AgentCapabilities, AgentCard};
pub use events::{
    SendConfiguration, SendMessageRequest, TaskArtifactUpdateEvent, TaskStatusUpdateEvent, WireEvent,
};
pub use types::{
    Artifact, DataPart, FileContent, FilePart, Message, Metadata, Role, Task, TaskState, TaskStatus, TextPart,
    WirePart,
};
