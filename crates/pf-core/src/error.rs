//! Unified error type for the postforge pipeline.
//!
//! All crates funnel their failures into [`Error`]. Configuration errors are
//! fatal to a run; agent-level errors are contained at the agent boundary and
//! recorded as failed reports rather than propagated.

use std::path::PathBuf;

/// Unified error type covering all failure modes in postforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration file could not be found.
    #[error("Config file not found: {}", path.display())]
    ConfigNotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The merged configuration violated the schema.
    #[error("Config validation failed: {}", violations.join("; "))]
    ConfigSchema {
        /// Every violated constraint, not just the first.
        violations: Vec<String>,
    },

    /// An agent failed during validation or execution.
    #[error("Agent error [{agent}]: {message}")]
    AgentExecution {
        /// Name of the agent that failed.
        agent: String,
        /// Human-readable error description.
        message: String,
    },

    /// A required external tool is missing or unresponsive.
    #[error("Tool unavailable [{tool}]: {reason}")]
    ToolUnavailable {
        /// Name of the tool.
        tool: String,
        /// Why it is considered unavailable.
        reason: String,
    },

    /// An external tool (ffmpeg, ffprobe, whisper) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The processing log could not be persisted.
    #[error("Processing log write failed: {message}")]
    LogWrite {
        /// Human-readable error description.
        message: String,
    },

    /// Output from an external tool could not be parsed.
    #[error("Parse error [{what}]: {message}")]
    Parse {
        /// What was being parsed (e.g. "ffprobe duration").
        what: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::ConfigNotFound`].
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Convenience constructor for [`Error::ConfigSchema`].
    pub fn config_schema(violations: Vec<String>) -> Self {
        Error::ConfigSchema { violations }
    }

    /// Convenience constructor for [`Error::AgentExecution`].
    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Error::AgentExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ToolUnavailable`].
    pub fn tool_unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ToolUnavailable {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::LogWrite`].
    pub fn log_write(message: impl Into<String>) -> Self {
        Error::LogWrite {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Parse`].
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    /// True for errors that make the whole run unusable before any agent
    /// starts (missing or invalid configuration).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. } | Error::ConfigSchema { .. }
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
