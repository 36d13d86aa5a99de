//! Tool call to argument vector reconstruction.
//!
//! The inverse of compilation: a compiled tool maps back to its subcommand
//! path, flag values back to tokens spelled the way the command line expects
//! them, and the free-form positional text is split with shell quoting rules.
//!
//! # Examples
//!
//! ```
//! use command_tools_bridge::build_argv;
//! use command_tools_core::{CommandNode, FlagDescriptor, FlagType, ToolCompiler, ToolInput};
//!
//! let root = CommandNode::new("app").not_runnable().with_child(
//!     CommandNode::new("greet")
//!         .with_local_flag(FlagDescriptor::new("name", FlagType::String))
//!         .with_local_flag(FlagDescriptor::new("shout", FlagType::Bool)),
//! );
//! let tools = ToolCompiler::new().with_root_alias("my_app").compile(&root);
//!
//! let input = ToolInput::default()
//!     .with_flag("shout", true)
//!     .with_flag("name", "Ada Lovelace")
//!     .with_args(r#"one "two three""#);
//!
//! assert_eq!(
//!     build_argv(tools.get("my_app_greet").unwrap(), &input),
//!     vec!["greet", "--name", "Ada Lovelace", "--shout", "one", "two three"]
//! );
//! ```

use std::collections::BTreeMap;

use command_tools_core::{CompiledTool, FlagSpelling, FlagSyntax, FlagValue, ToolInput};
use tracing::debug;

/// Flag tokens in key order.
///
/// Flags missing from `spellings` are spelled `--name`. With the standard
/// syntax `true` becomes a bare switch, `false` and `null` produce nothing,
/// each list element repeats the flag, and maps collapse to one
/// `k=v,k2=v2` value. Counters repeat the switch as many times as the
/// number asks; explicit booleans always carry `=true` or `=false`. A value
/// starting with `-` is attached with `=` so it is not read as a flag.
/// Entries with an empty name are dropped.
pub fn flag_tokens(
    flags: &BTreeMap<String, FlagValue>,
    spellings: &BTreeMap<String, FlagSpelling>,
) -> Vec<String> {
    let mut tokens = Vec::new();
    for (name, value) in flags {
        if name.is_empty() {
            debug!("Skipping flag with empty name");
            continue;
        }
        let spelling = spellings
            .get(name)
            .cloned()
            .unwrap_or_else(|| FlagSpelling::long(name));
        match (spelling.syntax, value) {
            (_, FlagValue::Null) => {}
            (FlagSyntax::Counter, FlagValue::Number(number)) => match number.as_u64() {
                Some(count) => {
                    for _ in 0..count {
                        tokens.push(spelling.switch.clone());
                    }
                }
                None => debug!(flag = %name, value = %number, "Skipping invalid count"),
            },
            (FlagSyntax::ExplicitBool, FlagValue::Bool(flag)) => {
                tokens.push(format!("{}={flag}", spelling.switch));
            }
            (_, FlagValue::Bool(false)) => {}
            (_, FlagValue::Bool(true)) => tokens.push(spelling.switch.clone()),
            (_, FlagValue::List(items)) => {
                for item in items.iter().filter(|item| **item != FlagValue::Null) {
                    push_value(&mut tokens, &spelling.switch, &item.to_string());
                }
            }
            (_, FlagValue::Number(_) | FlagValue::String(_) | FlagValue::Map(_)) => {
                push_value(&mut tokens, &spelling.switch, &value.to_string());
            }
        }
    }
    tokens
}

fn push_value(tokens: &mut Vec<String>, switch: &str, value: &str) {
    if value.starts_with('-') {
        tokens.push(format!("{switch}={value}"));
    } else {
        tokens.push(switch.to_string());
        tokens.push(value.to_string());
    }
}

/// Splits positional text like a POSIX shell would.
///
/// Text the shell rules cannot parse (an unterminated quote, a trailing
/// backslash) is split on whitespace instead.
pub fn tokenize_args(args: &str) -> Vec<String> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(args) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!(args, error = %e, "Falling back to whitespace splitting");
            args.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Full argument vector (program name excluded) for one call: the
/// subcommand path below the root, then flags, then positional arguments.
pub fn build_argv(tool: &CompiledTool, input: &ToolInput) -> Vec<String> {
    let mut argv: Vec<String> = tool.command_path.iter().skip(1).cloned().collect();
    argv.extend(flag_tokens(&input.flags, &tool.flags));
    argv.extend(tokenize_args(&input.args));
    argv
}
