//! Process execution for reconstructed calls.

use std::process::Stdio;

use async_trait::async_trait;
use command_tools_core::{InvocationContext, InvocationError, ToolOutput};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs an argument vector and captures its output.
///
/// The bridge only ever hands over arguments; which program receives them is
/// the runner's concern.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        ctx: &InvocationContext,
        argv: &[String],
    ) -> Result<ToolOutput, InvocationError>;
}

/// Re-executes the running binary.
///
/// The child gets a null stdin and piped stdout/stderr, and is killed when
/// the context is cancelled or its deadline passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfExecRunner;

impl SelfExecRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SelfExecRunner {
    async fn run(
        &self,
        ctx: &InvocationContext,
        argv: &[String],
    ) -> Result<ToolOutput, InvocationError> {
        if let Some(reason) = ctx.done_reason() {
            return Err(reason.into());
        }

        let program = std::env::current_exe().map_err(InvocationError::ExecutablePath)?;
        let mut command = Command::new(&program);
        command
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program.display(), argv = ?argv, "Spawning command");
        let child = command.spawn().map_err(InvocationError::Spawn)?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(InvocationError::Capture)?,
            reason = ctx.done() => {
                warn!(argv = ?argv, ?reason, "Killing command");
                return Err(reason.into());
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, "Command finished");
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_context_never_spawns() {
        let ctx = InvocationContext::new();
        ctx.cancel();
        let err = SelfExecRunner::new().run(&ctx, &[]).await.unwrap_err();
        assert!(matches!(err, InvocationError::Cancelled));
    }

    #[tokio::test]
    async fn test_reexecutes_current_binary() {
        // The current binary is this test harness, which lists its tests.
        let output = SelfExecRunner::new()
            .run(&InvocationContext::new(), &["--list".to_string()])
            .await
            .unwrap();
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("test_reexecutes_current_binary"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_output() {
        let output = SelfExecRunner::new()
            .run(&InvocationContext::new(), &["--no-such-harness-flag".to_string()])
            .await
            .unwrap();
        assert_ne!(output.exit_code, 0);
        assert!(!output.stderr.is_empty());
    }
}
