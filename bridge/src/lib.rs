//! Invocation bridge: structured tool calls back to command lines.
//!
//! Given a [`ToolSet`](command_tools_core::ToolSet) compiled from the running
//! program's own command tree, [`InvocationBridge`] turns each
//! [`CallRequest`](command_tools_core::CallRequest) into an argument vector,
//! re-executes the current binary with it, and returns the captured
//! stdout, stderr, and exit code.
//!
//! - [`build_argv`], [`flag_tokens`], [`tokenize_args`]: argument
//!   reconstruction.
//! - [`ProcessRunner`] / [`SelfExecRunner`]: execution with cancellation and
//!   deadlines.
//! - [`InvocationBridge`]: lookup, hooks, and the panic barrier.

mod args;
mod bridge;
mod runner;

pub use args::{build_argv, flag_tokens, tokenize_args};
pub use bridge::InvocationBridge;
pub use runner::{ProcessRunner, SelfExecRunner};
