//! Markdown transcript of bridge activity.

use crate::protocol::{Metadata, TaskState, WireEvent};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Transcript logger for executor runs.
///
/// Appends one markdown section per invocation start, wire update, terminal
/// state and error. At `DEBUG` level every wire update is also dumped as JSON.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => {
                let mut dir = std::env::temp_dir();
                dir.push("abk-a2a-logs");
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
                let filename = format!("bridge_{}_{}.md", Utc::now().timestamp_millis(), std::process::id());
                dir.join(filename)
            }
        };

        let log_level = log_level.unwrap_or("INFO").to_uppercase();

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self { log_file, log_level };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# A2A Bridge Transcript\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    fn is_debug(&self) -> bool {
        self.log_level == "DEBUG"
    }

    /// Log the start of an invocation.
    ///
    /// # Arguments
    /// * `agent` - Name of the agent serving the task.
    /// * `task_id` - Protocol task id.
    /// * `context_id` - Conversation id.
    /// * `new_task` - Whether the task was created by this invocation.
    pub fn log_invocation_start(&self, agent: &str, task_id: &str, context_id: &str, new_task: bool) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Invocation Started - {}\n\n**Agent:** {}\n**Task:** {}{}\n**Context:** {}\n\n",
            now.to_rfc3339(),
            agent,
            task_id,
            if new_task { " (new)" } else { "" },
            context_id
        );

        self.append_to_log(&content)?;
        tracing::info!(agent, task_id, "Invocation started");
        Ok(())
    }

    /// Log one outbound wire update.
    pub fn log_wire_event(&self, event: &WireEvent) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let summary = match event {
            WireEvent::Task(task) => format!("**Task snapshot:** {} ({})", task.id, task.status.state),
            WireEvent::StatusUpdate(update) => format!(
                "**Status:** {}{}",
                update.status.state,
                if update.is_final { " (final)" } else { "" }
            ),
            WireEvent::ArtifactUpdate(update) => format!(
                "**Artifact:** {} ({} parts, append: {}, last chunk: {})",
                update.artifact.artifact_id,
                update.artifact.parts.len(),
                update.append,
                update.last_chunk
            ),
            WireEvent::Message(message) => format!("**Message:** {} parts", message.parts.len()),
            WireEvent::Unknown => "**Unknown event**".to_string(),
        };

        let mut content = format!("### Wire Update - {}\n\n{}\n\n", now.to_rfc3339(), summary);
        if self.is_debug() {
            content.push_str(&format!(
                "```json\n{}\n```\n\n",
                serde_json::to_string_pretty(event).unwrap_or_default()
            ));
        }

        self.append_to_log(&content)
    }

    /// Log the terminal state of a task.
    pub fn log_terminal(&self, task_id: &str, state: TaskState) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Invocation Finished - {}\n\n**Task:** {}\n**State:** {}\n\n---\n\n",
            now.to_rfc3339(),
            task_id,
            state
        );

        self.append_to_log(&content)?;
        tracing::info!(task_id, state = %state, "Invocation finished");
        Ok(())
    }

    /// Log error with context.
    ///
    /// # Arguments
    /// * `error` - Error message.
    /// * `context` - Additional context information.
    pub fn log_error(&self, error: &str, context: Option<&Metadata>) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!("### Error - {}\n\n**Error:** {}\n\n", now.to_rfc3339(), error);

        if let Some(ctx) = context {
            content.push_str(&format!(
                "**Context:** {}\n\n",
                serde_json::to_string_pretty(ctx).unwrap_or_default()
            ));
        }

        self.append_to_log(&content)?;
        tracing::error!("{}", error);
        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}
