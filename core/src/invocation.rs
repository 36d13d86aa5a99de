//! Tool call payloads, results, and the per-call context.
//!
//! A call arrives as a [`CallRequest`] whose `arguments` decode into a
//! [`ToolInput`]: a map of flag values plus the raw positional text. The
//! outcome is a [`CallResult`], carrying a [`ToolOutput`] when the command
//! ran, or an error message when it could not.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A single flag value in a tool payload.
///
/// # Examples
///
/// ```
/// use command_tools_core::FlagValue;
///
/// let value: FlagValue = serde_json::from_str(r#"{"env": "prod", "tier": "web"}"#).unwrap();
/// assert_eq!(value.to_string(), "env=prod,tier=web");
///
/// let value: FlagValue = serde_json::from_str("[1, 2]").unwrap();
/// assert_eq!(value.to_string(), "[1,2]");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<FlagValue>),
    Map(BTreeMap<String, FlagValue>),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::List(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// Decoded tool arguments: `{"flags": {...}, "args": "..."}`.
///
/// Both fields are optional and tolerate `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub flags: BTreeMap<String, FlagValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: String,
}

impl ToolInput {
    /// Decodes call arguments; `null` means no flags and no arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_tools_core::{FlagValue, ToolInput};
    /// use serde_json::json;
    ///
    /// let input = ToolInput::from_arguments(&json!({"flags": {"name": "Ada"}})).unwrap();
    /// assert_eq!(input.flags["name"], FlagValue::from("Ada"));
    /// assert!(input.args.is_empty());
    ///
    /// assert_eq!(ToolInput::from_arguments(&json!(null)).unwrap(), ToolInput::default());
    /// ```
    pub fn from_arguments(arguments: &Value) -> serde_json::Result<Self> {
        if arguments.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(arguments)
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An inbound tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl CallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Captured result of one command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// What a tool call returns to the caller.
///
/// `text` always carries a human-readable rendering: the serialized
/// [`ToolOutput`] on success, the error message otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub is_error: bool,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<ToolOutput>,
}

impl CallResult {
    /// A result for a command that ran, whatever its exit code.
    pub fn success(output: ToolOutput) -> Self {
        Self {
            is_error: false,
            text: serde_json::to_string(&output).unwrap_or_default(),
            structured_content: Some(output),
        }
    }

    /// A result for a call that produced no command output.
    pub fn from_error(error: &impl fmt::Display) -> Self {
        Self {
            is_error: true,
            text: error.to_string(),
            structured_content: None,
        }
    }

    /// Exit code of the command, when it ran.
    pub fn exit_code(&self) -> Option<i32> {
        self.structured_content.as_ref().map(|output| output.exit_code)
    }
}

/// Why an [`InvocationContext`] stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation and deadline for one tool call.
///
/// Contexts derived with [`with_timeout`](Self::with_timeout) share the
/// parent's cancellation, so cancelling a parent stops every derived call.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use command_tools_core::{DoneReason, InvocationContext};
///
/// let parent = InvocationContext::new();
/// let child = parent.with_timeout(Duration::from_secs(30));
/// assert!(child.deadline().is_some());
///
/// parent.cancel();
/// assert_eq!(child.done_reason(), Some(DoneReason::Cancelled));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Derives a context whose deadline is at most `timeout` from now.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing <= candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn done_reason(&self) -> Option<DoneReason> {
        if self.cancel.is_cancelled() {
            return Some(DoneReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> DoneReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => DoneReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => DoneReason::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                DoneReason::Cancelled
            }
        }
    }
}
