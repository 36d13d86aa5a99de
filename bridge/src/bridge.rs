//! Tool call dispatch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use command_tools_core::{
    CallRequest, CallResult, CompiledTool, InvocationContext, InvocationError, ToolInput, ToolSet,
};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::args::build_argv;
use crate::runner::{ProcessRunner, SelfExecRunner};

/// Answers tool calls against a compiled tool set.
///
/// Each call runs: lookup, payload decode, pre-invoke hook, argument
/// reconstruction, execution, post-invoke hook. Every failure along the way,
/// panics included, comes back as an error [`CallResult`] for that call only.
///
/// # Examples
///
/// ```no_run
/// use command_tools_bridge::InvocationBridge;
/// use command_tools_core::{CallRequest, CommandNode, InvocationContext, ToolCompiler};
/// use serde_json::json;
///
/// # async fn demo() {
/// let root = CommandNode::new("app").with_child(CommandNode::new("greet"));
/// let bridge = InvocationBridge::new(ToolCompiler::new().compile(&root));
///
/// let request = CallRequest::new("app_greet", json!({"flags": {"name": "Ada"}}));
/// let result = bridge.call(InvocationContext::new(), request).await;
/// println!("{}", result.text);
/// # }
/// ```
#[derive(Clone)]
pub struct InvocationBridge {
    tools: ToolSet,
    runner: Arc<dyn ProcessRunner>,
}

impl InvocationBridge {
    /// A bridge that re-executes the current binary.
    pub fn new(tools: ToolSet) -> Self {
        Self {
            tools,
            runner: Arc::new(SelfExecRunner::new()),
        }
    }

    pub fn with_runner(mut self, runner: impl ProcessRunner + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Handles one call. Never panics and never fails; problems are reported
    /// in the returned result.
    pub async fn call(&self, ctx: InvocationContext, request: CallRequest) -> CallResult {
        let tool = request.name.clone();
        info!(tool = %tool, "Tool call");

        match AssertUnwindSafe(self.dispatch(ctx, request)).catch_unwind().await {
            Ok(Ok(result)) => {
                debug!(tool = %tool, exit_code = ?result.exit_code(), "Tool call finished");
                result
            }
            Ok(Err(e)) => {
                warn!(tool = %tool, error = %e, "Tool call failed");
                CallResult::from_error(&e)
            }
            Err(panic) => {
                let e = InvocationError::Panicked(panic_message(panic.as_ref()));
                error!(tool = %tool, error = %e, "Tool call panicked");
                CallResult::from_error(&e)
            }
        }
    }

    async fn dispatch(
        &self,
        ctx: InvocationContext,
        mut request: CallRequest,
    ) -> Result<CallResult, InvocationError> {
        let compiled = self
            .tools
            .get(&request.name)
            .ok_or_else(|| InvocationError::UnknownTool(request.name.clone()))?;
        let selector = Arc::clone(&compiled.selector);

        let (ctx, outcome) = match ToolInput::from_arguments(&request.arguments) {
            Ok(mut input) => {
                let ctx = selector.pre_invoke(ctx, &mut request, &mut input);
                let outcome = self.execute(&ctx, compiled, &input).await;
                (ctx, outcome)
            }
            Err(e) => (ctx, Err(InvocationError::InvalidPayload(e))),
        };

        selector.post_invoke(&ctx, &request, outcome)
    }

    async fn execute(
        &self,
        ctx: &InvocationContext,
        tool: &CompiledTool,
        input: &ToolInput,
    ) -> Result<CallResult, InvocationError> {
        let argv = build_argv(tool, input);
        debug!(tool = %tool.tool.name, argv = ?argv, "Reconstructed arguments");
        let output = self.runner.run(ctx, &argv).await?;
        Ok(CallResult::success(output))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
