//! Compile a CLI command tree into schema-described tools.
//!
//! This crate turns a hierarchy of commands into a flat set of tools that an
//! agent can call with structured input:
//!
//! - [`CommandNode`] / [`FlagDescriptor`]: the command tree view, built by
//!   hand or read from clap with [`ClapTreeAdapter`] (feature `clap`).
//! - [`fragment_for`], [`default_for`], [`flags_schema`]: flag type metadata
//!   to JSON-schema fragments with native defaults.
//! - [`Selector`] / [`ToolCompiler`]: first-match-wins selection of commands
//!   and flags, producing an immutable [`ToolSet`].
//! - [`ToolInput`], [`CallResult`], [`InvocationContext`]: the call-side
//!   types shared with the invocation bridge.
//! - [`ToolsConfig`]: YAML selector rules; [`ToolManifest`]: hashed tool
//!   snapshots; [`validate_tools`]: naming and shape checks.
//!
//! # Example
//!
//! ```
//! use command_tools_core::*;
//!
//! let root = CommandNode::new("mycli")
//!     .not_runnable()
//!     .with_inherited_flag(FlagDescriptor::new("verbose", FlagType::Bool))
//!     .with_child(
//!         CommandNode::new("run")
//!             .with_usage("run [flags] <SCRIPT>")
//!             .with_local_flag(
//!                 FlagDescriptor::new("port", FlagType::Int).with_default("8080").required(),
//!             ),
//!     );
//!
//! let tools = ToolCompiler::new().compile(&root);
//! let run = tools.get("mycli_run").unwrap();
//! let schema = serde_json::to_value(&run.tool.input_schema).unwrap();
//!
//! assert_eq!(schema["properties"]["flags"]["properties"]["port"]["default"], 8080);
//! assert_eq!(schema["properties"]["flags"]["required"][0], "port");
//! assert!(validate_tools(&tools).is_empty());
//! ```

#[cfg(feature = "clap")]
mod adapter;
mod compiler;
mod config;
mod error;
mod invocation;
mod manifest;
mod node;
mod schema;
mod selector;
mod validate;

#[cfg(feature = "clap")]
pub use adapter::ClapTreeAdapter;
pub use compiler::{
    CompiledTool, DEFAULT_RESERVED_COMMANDS, TOOL_NAME_SEPARATOR, Tool, ToolCompiler, ToolSet,
};
pub use config::{SelectorConfig, ToolsConfig};
pub use error::{ConfigError, InvocationError, Result};
pub use invocation::{
    CallRequest, CallResult, DoneReason, FlagValue, InvocationContext, ToolInput, ToolOutput,
};
pub use manifest::{MANIFEST_SCHEMA_VERSION, ToolManifest, tool_hash};
pub use node::{CommandNode, FlagDescriptor, FlagSpelling, FlagSyntax, FlagType};
pub use schema::{
    ARGS_DESCRIPTION, AdditionalProperties, SchemaFragment, SchemaTemplates, SchemaType,
    args_description, default_for, flag_property, flags_schema, fragment_for, required_for,
};
pub use selector::{
    PostInvokeHook, PreInvokeHook, Predicate, Selector, flag_names_in, flag_names_not_in,
};
pub use validate::{MAX_TOOL_NAME_LEN, ValidationError, validate_tool_description, validate_tools};
