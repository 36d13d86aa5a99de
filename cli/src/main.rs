//! `cmdtools`: a small command tree that can serve itself as tools.
//!
//! The demo commands (`greet`, `echo`, `math`, `fail`, `wait`) run directly
//! from a shell. `tools list` compiles the same tree into tool descriptions,
//! and `tools call` answers one structured call by re-executing this binary.

mod output;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use command_tools_bridge::InvocationBridge;
use command_tools_core::{
    CallRequest, ClapTreeAdapter, InvocationContext, ToolManifest, ToolSet, ToolsConfig,
    validate_tools,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, format_manifest};

const BIN_NAME: &str = "cmdtools";
const LOG_ENV: &str = "CMDTOOLS_LOG";

#[derive(Debug, Parser)]
#[command(name = "cmdtools", version)]
#[command(about = "Demo commands, callable directly or as structured tools")]
#[command(subcommand_required = true)]
struct Cli {
    /// Print extra detail to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a greeting.
    #[command(after_help = "  cmdtools greet --name Ada --style fancy\n  cmdtools greet --times 3 --shout")]
    Greet(GreetArgs),
    /// Print words joined by a separator.
    Echo(EchoArgs),
    /// Arithmetic over a list of numbers.
    Math(MathArgs),
    /// Exit with a chosen status code.
    Fail(FailArgs),
    /// Sleep before printing.
    Wait(WaitArgs),
    /// Compile the tool set and check it.
    #[command(hide = true)]
    Selftest,
    /// Expose this command tree as tools.
    Tools(ToolsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Style {
    Plain,
    Fancy,
}

#[derive(Debug, Args)]
struct GreetArgs {
    /// Who to greet.
    #[arg(long, default_value = "world")]
    name: String,
    /// How many times to repeat the greeting.
    #[arg(long, default_value_t = 1)]
    times: u32,
    /// Uppercase the greeting.
    #[arg(long)]
    shout: bool,
    /// Greeting style.
    #[arg(long, value_enum, default_value_t = Style::Plain)]
    style: Style,
    /// Word used instead of "Hello". Replaced by --style.
    #[arg(long)]
    salutation: Option<String>,
}

#[derive(Debug, Args)]
struct EchoArgs {
    /// Uppercase the output.
    #[arg(long)]
    upper: bool,
    /// Text placed between words.
    #[arg(long, default_value = " ")]
    separator: String,
    /// Words to print.
    #[arg(required = true)]
    words: Vec<String>,
}

#[derive(Debug, Args)]
#[command(subcommand_required = true)]
struct MathArgs {
    #[command(subcommand)]
    command: MathCommand,
}

#[derive(Debug, Subcommand)]
enum MathCommand {
    /// Add numbers together.
    Sum(SumArgs),
    /// Print the largest number.
    Max(MaxArgs),
}

#[derive(Debug, Args)]
struct SumArgs {
    /// Digits after the decimal point.
    #[arg(long, default_value_t = 2)]
    precision: u8,
    /// Numbers to add.
    #[arg(required = true, allow_negative_numbers = true)]
    numbers: Vec<f64>,
}

#[derive(Debug, Args)]
struct MaxArgs {
    /// Numbers to compare.
    #[arg(required = true, allow_negative_numbers = true)]
    numbers: Vec<f64>,
}

#[derive(Debug, Args)]
struct FailArgs {
    /// Exit code to return.
    #[arg(long, default_value_t = 1)]
    code: i32,
    /// Message written to stderr before exiting.
    #[arg(long)]
    message: Option<String>,
}

#[derive(Debug, Args)]
struct WaitArgs {
    /// Seconds to sleep.
    #[arg(long, default_value_t = 1)]
    seconds: u64,
}

#[derive(Debug, Args)]
#[command(subcommand_required = true)]
struct ToolsArgs {
    /// YAML file with selector rules.
    #[arg(long, global = true)]
    tools_config: Option<PathBuf>,
    #[command(subcommand)]
    command: ToolsCommand,
}

#[derive(Debug, Subcommand)]
enum ToolsCommand {
    /// Print the tool manifest.
    List(ListArgs),
    /// Run one tool call and print its result as JSON.
    Call(CallArgs),
    /// Check tool names and schemas, and optionally a saved manifest.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CallArgs {
    /// Tool name, as printed by `tools list`.
    tool: String,
    /// JSON arguments (`{"flags": {...}, "args": "..."}`). Read from stdin
    /// when omitted.
    #[arg(long)]
    payload: Option<String>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// JSON manifest from `tools list` to compare against the current tools.
    #[arg(long)]
    manifest: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Greet(args) => run_greet(args, cli.verbose),
        Command::Echo(args) => run_echo(args),
        Command::Math(args) => run_math(args),
        Command::Fail(args) => run_fail(args),
        Command::Wait(args) => run_wait(args),
        Command::Selftest => run_selftest(),
        Command::Tools(args) => run_tools(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for tool output.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run_greet(args: GreetArgs, verbose: bool) -> Result<(), String> {
    let salutation = args.salutation.as_deref().unwrap_or("Hello");
    let mut line = match args.style {
        Style::Plain => format!("{salutation}, {}!", args.name),
        Style::Fancy => format!("*** {salutation}, {}! ***", args.name),
    };
    if args.shout {
        line = line.to_uppercase();
    }
    if verbose {
        eprintln!("greeting {} {} time(s)", args.name, args.times);
    }
    for _ in 0..args.times {
        println!("{line}");
    }
    Ok(())
}

fn run_echo(args: EchoArgs) -> Result<(), String> {
    let line = args.words.join(&args.separator);
    if args.upper {
        println!("{}", line.to_uppercase());
    } else {
        println!("{line}");
    }
    Ok(())
}

fn run_math(args: MathArgs) -> Result<(), String> {
    match args.command {
        MathCommand::Sum(args) => {
            let total: f64 = args.numbers.iter().sum();
            println!("{:.*}", usize::from(args.precision), total);
        }
        MathCommand::Max(args) => {
            let max = args
                .numbers
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            println!("{max}");
        }
    }
    Ok(())
}

fn run_fail(args: FailArgs) -> Result<(), String> {
    if let Some(message) = &args.message {
        eprintln!("{message}");
    }
    std::process::exit(args.code)
}

fn run_wait(args: WaitArgs) -> Result<(), String> {
    std::thread::sleep(Duration::from_secs(args.seconds));
    println!("waited {}s", args.seconds);
    Ok(())
}

fn run_selftest() -> Result<(), String> {
    let (tools, _) = build_tool_set(None)?;
    let errors = validate_tools(&tools);
    if !errors.is_empty() {
        return Err(format!("{} validation error(s)", errors.len()));
    }
    println!("ok: {} tools", tools.len());
    Ok(())
}

fn run_tools(args: ToolsArgs) -> Result<(), String> {
    let (tools, name) = build_tool_set(args.tools_config.as_deref())?;
    match args.command {
        ToolsCommand::List(list) => run_tools_list(&tools, &name, list),
        ToolsCommand::Call(call) => run_tools_call(tools, call),
        ToolsCommand::Validate(validate) => run_tools_validate(&tools, validate),
    }
}

/// Compiles this binary's own command tree. Returns the tools and the name
/// used for the manifest.
fn build_tool_set(config_path: Option<&Path>) -> Result<(ToolSet, String), String> {
    let config = match config_path {
        Some(path) => ToolsConfig::load(path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))?,
        None => ToolsConfig::default(),
    };
    let compiler = config
        .compiler()
        .map_err(|e| format!("invalid tools config: {e}"))?
        .with_reserved("tools");

    let adapter = ClapTreeAdapter::new()
        .deprecated_flag("salutation")
        .flag_schema(
            "times",
            json!({
                "type": "integer",
                "minimum": 1,
                "maximum": 10,
                "default": 1,
                "description": "How many times to repeat the greeting"
            }),
        );
    let root = adapter.adapt(&Cli::command());
    debug!(commands = root.node_count(), "Adapted command tree");

    let tools = compiler.compile(&root);
    let name = config.root_alias.unwrap_or_else(|| BIN_NAME.to_string());
    Ok((tools, name))
}

fn run_tools_list(tools: &ToolSet, name: &str, args: ListArgs) -> Result<(), String> {
    for finding in validate_tools(tools) {
        warn!(error = %finding, "Tool set problem");
    }
    let generated_at = chrono::Utc::now().to_rfc3339();
    let manifest = ToolManifest::new(name, generated_at, tools)
        .map_err(|e| format!("failed to build manifest: {e}"))?;
    let rendered = format_manifest(&manifest, args.format)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, rendered)
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            info!(path = %path.display(), tools = manifest.tool_count(), "Wrote tool manifest");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn run_tools_call(tools: ToolSet, args: CallArgs) -> Result<(), String> {
    let payload = match args.payload {
        Some(payload) => payload,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("failed to read payload from stdin: {e}"))?;
            buffer
        }
    };
    let arguments = if payload.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str::<Value>(&payload).map_err(|e| format!("invalid payload JSON: {e}"))?
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start runtime: {e}"))?;

    let request = CallRequest::new(args.tool, arguments);
    let result = runtime.block_on(async move {
        let token = CancellationToken::new();
        let interrupt = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling tool call");
                interrupt.cancel();
            }
        });

        let bridge = InvocationBridge::new(tools);
        bridge
            .call(InvocationContext::with_cancellation(token), request)
            .await
    });

    let rendered = serde_json::to_string_pretty(&result)
        .map_err(|e| format!("failed to serialize result: {e}"))?;
    println!("{rendered}");

    if result.is_error {
        Err(result.text)
    } else {
        Ok(())
    }
}

fn run_tools_validate(tools: &ToolSet, args: ValidateArgs) -> Result<(), String> {
    let mut problems: Vec<String> = validate_tools(tools)
        .iter()
        .map(ToString::to_string)
        .collect();

    if let Some(path) = &args.manifest {
        let manifest = ToolManifest::load(path)
            .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
        if !manifest.verify().map_err(|e| e.to_string())? {
            problems.push(format!("{}: tool hash does not match its tools", path.display()));
        } else if !manifest.matches(tools).map_err(|e| e.to_string())? {
            problems.push(format!("{}: tools changed since it was generated", path.display()));
        }
    }

    if problems.is_empty() {
        println!("ok: {} tools valid", tools.len());
        return Ok(());
    }
    for problem in &problems {
        eprintln!("  - {problem}");
    }
    Err(format!("{} problem(s) found", problems.len()))
}
