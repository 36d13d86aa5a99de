use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use command_tools_bridge::{InvocationBridge, ProcessRunner};
use command_tools_core::{
    CallRequest, CallResult, CommandNode, FlagDescriptor, FlagType, InvocationContext,
    InvocationError, Selector, ToolCompiler, ToolOutput, ToolSet,
};
use serde_json::json;

/// Records every argument vector and answers with a fixed output.
#[derive(Clone, Default)]
struct RecordingRunner {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    output: ToolOutput,
}

impl RecordingRunner {
    fn exiting(exit_code: i32) -> Self {
        Self {
            output: ToolOutput {
                stdout: "out\n".into(),
                stderr: "err\n".into(),
                exit_code,
            },
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
    async fn run(
        &self,
        ctx: &InvocationContext,
        argv: &[String],
    ) -> Result<ToolOutput, InvocationError> {
        if let Some(reason) = ctx.done_reason() {
            return Err(reason.into());
        }
        self.calls.lock().unwrap().push(argv.to_vec());
        Ok(self.output.clone())
    }
}

fn tree() -> CommandNode {
    CommandNode::new("app")
        .not_runnable()
        .with_child(
            CommandNode::new("greet")
                .with_local_flag(FlagDescriptor::new("name", FlagType::String))
                .with_local_flag(FlagDescriptor::new("shout", FlagType::Bool)),
        )
        .with_child(
            CommandNode::new("math")
                .not_runnable()
                .with_child(CommandNode::new("sum")),
        )
}

fn compile(selectors: Vec<Selector>) -> ToolSet {
    selectors
        .into_iter()
        .fold(ToolCompiler::new(), ToolCompiler::with_selector)
        .compile(&tree())
}

#[tokio::test]
async fn test_call_reconstructs_argv() {
    let runner = RecordingRunner::exiting(0);
    let bridge = InvocationBridge::new(compile(vec![])).with_runner(runner.clone());

    let result = bridge
        .call(
            InvocationContext::new(),
            CallRequest::new(
                "app_greet",
                json!({"flags": {"name": "Ada", "shout": true}, "args": "extra 'two words'"}),
            ),
        )
        .await;

    assert!(!result.is_error);
    assert_eq!(
        runner.calls(),
        vec![vec!["greet", "--name", "Ada", "--shout", "extra", "two words"]]
    );
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&result.text).unwrap(),
        json!({"stdout": "out\n", "stderr": "err\n", "exitCode": 0})
    );
}

#[tokio::test]
async fn test_nested_tool_and_null_arguments() {
    let runner = RecordingRunner::exiting(0);
    let bridge = InvocationBridge::new(compile(vec![])).with_runner(runner.clone());

    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_math_sum", json!(null)))
        .await;
    assert!(!result.is_error);
    assert_eq!(runner.calls(), vec![vec!["math", "sum"]]);
}

#[tokio::test]
async fn test_non_zero_exit_is_not_an_error() {
    let bridge =
        InvocationBridge::new(compile(vec![])).with_runner(RecordingRunner::exiting(3));
    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_greet", json!({})))
        .await;

    assert!(!result.is_error);
    assert_eq!(result.exit_code(), Some(3));
}

#[tokio::test]
async fn test_unknown_tool_is_error_result() {
    let runner = RecordingRunner::exiting(0);
    let bridge = InvocationBridge::new(compile(vec![])).with_runner(runner.clone());
    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_nope", json!({})))
        .await;

    assert!(result.is_error);
    assert_eq!(result.text, "unknown tool: app_nope");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_payload_reaches_post_hook() {
    let seen = Arc::new(Mutex::new(None));
    let recorder = Arc::clone(&seen);
    let selector = Selector::new().with_post_invoke(move |_ctx, _request, outcome| {
        *recorder.lock().unwrap() = Some(matches!(outcome, Err(InvocationError::InvalidPayload(_))));
        outcome
    });
    let bridge = InvocationBridge::new(compile(vec![selector]))
        .with_runner(RecordingRunner::exiting(0));

    let result = bridge
        .call(
            InvocationContext::new(),
            CallRequest::new("app_greet", json!({"flags": "name=Ada"})),
        )
        .await;

    assert!(result.is_error);
    assert!(result.text.starts_with("invalid tool input"));
    assert_eq!(*seen.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn test_pre_hook_rewrites_payload() {
    let selector = Selector::new().with_pre_invoke(|ctx, _request, input| {
        input.flags.remove("name");
        input.args = "--dry-run".into();
        ctx
    });
    let runner = RecordingRunner::exiting(0);
    let bridge = InvocationBridge::new(compile(vec![selector])).with_runner(runner.clone());

    bridge
        .call(
            InvocationContext::new(),
            CallRequest::new("app_greet", json!({"flags": {"name": "Ada"}})),
        )
        .await;
    assert_eq!(runner.calls(), vec![vec!["greet", "--dry-run"]]);
}

#[tokio::test]
async fn test_pre_hook_deadline_reaches_runner() {
    let selector = Selector::new()
        .with_pre_invoke(|ctx, _request, _input| ctx.with_timeout(Duration::ZERO));
    let runner = RecordingRunner::exiting(0);
    let bridge = InvocationBridge::new(compile(vec![selector])).with_runner(runner.clone());

    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_greet", json!({})))
        .await;
    assert!(result.is_error);
    assert_eq!(result.text, "command deadline exceeded");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_post_hook_can_redact() {
    let selector = Selector::new().with_post_invoke(|_ctx, _request, outcome| {
        outcome.map(|_| CallResult::success(ToolOutput {
            stdout: "[redacted]".into(),
            ..Default::default()
        }))
    });
    let bridge = InvocationBridge::new(compile(vec![selector]))
        .with_runner(RecordingRunner::exiting(0));

    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_greet", json!({})))
        .await;
    assert_eq!(result.structured_content.unwrap().stdout, "[redacted]");
}

#[tokio::test]
async fn test_hook_panics_are_isolated() {
    let panicking = Selector::new()
        .matching(|node: &CommandNode| node.name() == "greet")
        .with_pre_invoke(|_ctx, _request, _input| panic!("pre-hook exploded"));
    let calm = Selector::new();
    let runner = RecordingRunner::exiting(0);
    let bridge =
        InvocationBridge::new(compile(vec![panicking, calm])).with_runner(runner.clone());

    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_greet", json!({})))
        .await;
    assert!(result.is_error);
    assert_eq!(result.text, "tool call panicked: pre-hook exploded");

    // The bridge keeps serving other calls.
    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_math_sum", json!({})))
        .await;
    assert!(!result.is_error);
    assert_eq!(runner.calls(), vec![vec!["math", "sum"]]);
}

#[tokio::test]
async fn test_post_hook_panic_with_formatted_message() {
    let selector = Selector::new().with_post_invoke(|_ctx, request, _outcome| {
        panic!("post-hook failed for {}", request.name)
    });
    let bridge = InvocationBridge::new(compile(vec![selector]))
        .with_runner(RecordingRunner::exiting(0));

    let result = bridge
        .call(InvocationContext::new(), CallRequest::new("app_greet", json!({})))
        .await;
    assert_eq!(result.text, "tool call panicked: post-hook failed for app_greet");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_calls_are_independent() {
    let runner = RecordingRunner::exiting(0);
    let bridge = Arc::new(InvocationBridge::new(compile(vec![])).with_runner(runner.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge
                    .call(
                        InvocationContext::new(),
                        CallRequest::new("app_greet", json!({"flags": {"name": format!("n{i}")}})),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        assert!(!handle.await.unwrap().is_error);
    }
    assert_eq!(runner.calls().len(), 8);
}
