//! Reading a clap command tree into [`CommandNode`]s.
//!
//! clap carries no notion of deprecation or per-flag schema overrides, so
//! those are registered on the adapter by command path or flag name.
//!
//! # Examples
//!
//! ```
//! use clap::{Arg, ArgAction, Command};
//! use command_tools_core::{ClapTreeAdapter, FlagType};
//!
//! let app = Command::new("app")
//!     .arg(Arg::new("verbose").long("verbose").action(ArgAction::SetTrue).global(true))
//!     .subcommand(
//!         Command::new("greet")
//!             .about("Say hello")
//!             .arg(Arg::new("name").long("name").default_value("world")),
//!     );
//!
//! let root = ClapTreeAdapter::new().adapt(&app);
//! let greet = &root.children[0];
//! assert_eq!(greet.path, vec!["app", "greet"]);
//! assert_eq!(greet.local_flags[0].flag_type, FlagType::String);
//! assert_eq!(greet.local_flags[0].default_value, "world");
//! assert_eq!(greet.inherited_flags[0].name, "verbose");
//! ```

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use serde_json::Value;
use tracing::trace;

use crate::{CommandNode, FlagDescriptor, FlagSyntax, FlagType};

/// Converts clap commands into command trees.
#[derive(Debug, Clone, Default)]
pub struct ClapTreeAdapter {
    deprecated_commands: HashSet<String>,
    deprecated_flags: HashSet<String>,
    flag_schemas: HashMap<String, Value>,
}

impl ClapTreeAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a command deprecated by its space-joined path (`"app old-sync"`).
    pub fn deprecated_command(mut self, path: impl Into<String>) -> Self {
        self.deprecated_commands.insert(path.into());
        self
    }

    /// Marks every flag with this name deprecated.
    pub fn deprecated_flag(mut self, name: impl Into<String>) -> Self {
        self.deprecated_flags.insert(name.into());
        self
    }

    /// Uses `schema` verbatim for every flag with this name.
    pub fn flag_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.flag_schemas.insert(name.into(), schema);
        self
    }

    /// Reads `command` and all of its subcommands.
    ///
    /// Works on both built and unbuilt commands: clap's generated help and
    /// version arguments are skipped, and global arguments already copied
    /// into subcommands by a build are not listed twice.
    pub fn adapt(&self, command: &Command) -> CommandNode {
        self.adapt_command(command, &[], &[])
    }

    fn adapt_command(
        &self,
        command: &Command,
        parent_path: &[String],
        inherited: &[FlagDescriptor],
    ) -> CommandNode {
        let mut path = parent_path.to_vec();
        path.push(command.get_name().to_string());

        let mut local_flags = Vec::new();
        let mut globals = Vec::new();
        for arg in command.get_arguments() {
            if arg.is_positional() || is_builtin(arg) {
                continue;
            }
            let flag = self.descriptor(arg);
            if arg.is_global_set() {
                if inherited.iter().any(|known| known.name == flag.name) {
                    continue;
                }
                globals.push(flag.clone());
            }
            local_flags.push(flag);
        }

        let command_path = path.join(" ");
        let has_flags = !local_flags.is_empty() || !inherited.is_empty();
        trace!(
            command = %command_path,
            local = local_flags.len(),
            inherited = inherited.len(),
            "Adapted command"
        );

        let mut child_inherited = inherited.to_vec();
        child_inherited.extend(globals);
        let children = command
            .get_subcommands()
            .map(|sub| self.adapt_command(sub, &path, &child_inherited))
            .collect();

        CommandNode {
            usage: usage_line(command, has_flags),
            short: command.get_about().map(ToString::to_string),
            long: command.get_long_about().map(ToString::to_string),
            examples: command
                .get_after_long_help()
                .or_else(|| command.get_after_help())
                .map(ToString::to_string),
            runnable: !command.is_subcommand_required_set(),
            hidden: command.is_hide_set(),
            deprecated: self.deprecated_commands.contains(&command_path),
            local_flags,
            inherited_flags: inherited.to_vec(),
            children,
            path,
        }
    }

    fn descriptor(&self, arg: &Arg) -> FlagDescriptor {
        let name = arg
            .get_long()
            .map(str::to_string)
            .unwrap_or_else(|| arg.get_id().to_string());
        let flag_type = flag_type(arg);
        let switch = match (arg.get_long(), arg.get_short()) {
            (None, Some(short)) => Some(format!("-{short}")),
            _ => None,
        };
        let action = arg.get_action();
        let syntax = match action {
            ArgAction::Count => FlagSyntax::Counter,
            ArgAction::SetTrue | ArgAction::SetFalse => FlagSyntax::Standard,
            _ if matches!(flag_type, FlagType::Bool | FlagType::BoolSlice) => {
                FlagSyntax::ExplicitBool
            }
            _ => FlagSyntax::Standard,
        };
        // A switch's "default" is its unset state, not a value to pass.
        let default_value = if matches!(action, ArgAction::SetTrue | ArgAction::SetFalse) {
            String::new()
        } else {
            raw_default(arg, &flag_type)
        };

        let choices = match flag_type {
            FlagType::Bool | FlagType::BoolSlice | FlagType::Count => Vec::new(),
            _ => arg
                .get_possible_values()
                .iter()
                .filter(|value| !value.is_hide_set())
                .map(|value| value.get_name().to_string())
                .collect(),
        };

        FlagDescriptor {
            usage: arg
                .get_long_help()
                .or_else(|| arg.get_help())
                .map(ToString::to_string)
                .unwrap_or_default(),
            default_value,
            hidden: arg.is_hide_set(),
            deprecated: self.deprecated_flags.contains(&name),
            required: arg.is_required_set(),
            choices,
            schema_override: self.flag_schemas.get(&name).cloned(),
            switch,
            syntax,
            flag_type,
            name,
        }
    }
}

fn is_builtin(arg: &Arg) -> bool {
    matches!(
        arg.get_action(),
        ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version
    )
}

fn takes_many(arg: &Arg) -> bool {
    matches!(arg.get_action(), ArgAction::Append)
        || arg.get_num_args().is_some_and(|range| range.max_values() > 1)
}

fn flag_type(arg: &Arg) -> FlagType {
    match arg.get_action() {
        ArgAction::SetTrue | ArgAction::SetFalse => return FlagType::Bool,
        ArgAction::Count => return FlagType::Count,
        _ => {}
    }
    let scalar = scalar_type(arg);
    if takes_many(arg) { scalar.slice() } else { scalar }
}

fn scalar_type(arg: &Arg) -> FlagType {
    let parsed = arg.get_value_parser().type_id();
    let known = [
        (TypeId::of::<bool>(), FlagType::Bool),
        (TypeId::of::<i8>(), FlagType::Int8),
        (TypeId::of::<i16>(), FlagType::Int16),
        (TypeId::of::<i32>(), FlagType::Int32),
        (TypeId::of::<i64>(), FlagType::Int64),
        (TypeId::of::<isize>(), FlagType::Int),
        (TypeId::of::<u8>(), FlagType::Uint8),
        (TypeId::of::<u16>(), FlagType::Uint16),
        (TypeId::of::<u32>(), FlagType::Uint32),
        (TypeId::of::<u64>(), FlagType::Uint64),
        (TypeId::of::<usize>(), FlagType::Uint),
        (TypeId::of::<f32>(), FlagType::Float32),
        (TypeId::of::<f64>(), FlagType::Float64),
        (TypeId::of::<String>(), FlagType::String),
        (TypeId::of::<PathBuf>(), FlagType::String),
        (TypeId::of::<OsString>(), FlagType::String),
        (TypeId::of::<Duration>(), FlagType::Duration),
        (TypeId::of::<IpAddr>(), FlagType::Ip),
        (TypeId::of::<Ipv4Addr>(), FlagType::Ip),
        (TypeId::of::<Ipv6Addr>(), FlagType::Ip),
    ];

    known
        .into_iter()
        .find(|(type_id, _)| parsed == *type_id)
        .map(|(_, flag_type)| flag_type)
        .unwrap_or_else(|| {
            let label = arg
                .get_value_names()
                .and_then(|names| names.first())
                .map(|name| name.to_string().to_lowercase())
                .unwrap_or_else(|| "custom".to_string());
            FlagType::Other(label)
        })
}

fn raw_default(arg: &Arg, flag_type: &FlagType) -> String {
    let values: Vec<String> = arg
        .get_default_values()
        .iter()
        .map(|value| value.to_string_lossy().into_owned())
        .collect();
    match values.as_slice() {
        [] => String::new(),
        [single] if !flag_type.is_collection() => single.clone(),
        many => format!("[{}]", many.join(",")),
    }
}

/// `name [flags] <REQUIRED> [OPTIONAL]...`
fn usage_line(command: &Command, has_flags: bool) -> String {
    let mut parts = vec![command.get_name().to_string()];
    if has_flags {
        parts.push("[flags]".to_string());
    }
    for arg in command.get_positionals() {
        let value_name = arg
            .get_value_names()
            .and_then(|names| names.first())
            .map(ToString::to_string)
            .unwrap_or_else(|| arg.get_id().to_string().to_uppercase());
        let mut part = if arg.is_required_set() {
            format!("<{value_name}>")
        } else {
            format!("[{value_name}]")
        };
        if takes_many(arg) {
            part.push_str("...");
        }
        parts.push(part);
    }
    parts.join(" ")
}
