//! Error types for configuration loading and tool invocation.
//!
//! Compilation itself never fails; these cover the two edges that touch the
//! outside world: reading selector configuration and manifests from disk,
//! and turning a tool call into a finished process.

use thiserror::Error;

use crate::DoneReason;

/// Errors raised while loading configuration or manifest files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A command pattern in a selector rule is not a valid regex.
    #[error("invalid command pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Reasons a single tool call produced no command output.
///
/// A command that ran and exited non-zero is not an error; its output is
/// returned as data.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid tool input: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("failed to locate current executable: {0}")]
    ExecutablePath(#[source] std::io::Error),

    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to capture command output: {0}")]
    Capture(#[source] std::io::Error),

    #[error("command cancelled")]
    Cancelled,

    #[error("command deadline exceeded")]
    DeadlineExceeded,

    /// A hook or the execution path panicked; carries the panic message.
    #[error("tool call panicked: {0}")]
    Panicked(String),
}

impl From<DoneReason> for InvocationError {
    fn from(reason: DoneReason) -> Self {
        match reason {
            DoneReason::Cancelled => Self::Cancelled,
            DoneReason::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}
