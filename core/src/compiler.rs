//! Command tree to tool set compilation.
//!
//! The compiler walks a [`CommandNode`] tree depth-first, children before
//! their parent. Each node first passes the safety filters (hidden,
//! deprecated, non-runnable, reserved name); a node that fails one is never
//! shown to any selector, though its children are still visited. The first
//! selector whose command predicate accepts the node builds its tool.
//!
//! # Examples
//!
//! ```
//! use command_tools_core::{CommandNode, FlagDescriptor, FlagType, ToolCompiler};
//!
//! let root = CommandNode::new("app")
//!     .not_runnable()
//!     .with_child(
//!         CommandNode::new("greet")
//!             .with_short("Say hello")
//!             .with_local_flag(FlagDescriptor::new("name", FlagType::String)),
//!     )
//!     .with_child(CommandNode::new("help"));
//!
//! let tools = ToolCompiler::new().compile(&root);
//! assert_eq!(tools.names(), vec!["app_greet"]);
//!
//! let greet = tools.get("app_greet").unwrap();
//! assert_eq!(greet.tool.description, "Say hello");
//! assert_eq!(greet.tool.input_schema.properties.as_ref().unwrap().len(), 2);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    CommandNode, FlagDescriptor, FlagSpelling, SchemaFragment, SchemaTemplates, Selector,
    args_description, flags_schema,
};

/// Joins command path segments into a tool name.
pub const TOOL_NAME_SEPARATOR: char = '_';

/// Built-in command names that never become tools.
pub const DEFAULT_RESERVED_COMMANDS: &[&str] = &["help", "completion"];

/// A tool as described to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: SchemaFragment,
    pub output_schema: SchemaFragment,
}

/// A tool bound to the selector that produced it.
#[derive(Debug, Clone)]
pub struct CompiledTool {
    pub tool: Tool,
    /// Selector whose hooks run around calls to this tool.
    pub selector: Arc<Selector>,
    /// Full command path, root included.
    pub command_path: Vec<String>,
    /// Command-line spelling of every flag in the input schema.
    pub flags: BTreeMap<String, FlagSpelling>,
}

/// Immutable result of one compilation pass, in walk order.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<CompiledTool>,
}

impl ToolSet {
    /// Looks a tool up by name. With duplicate names the first one wins.
    pub fn get(&self, name: &str) -> Option<&CompiledTool> {
        self.tools.iter().find(|compiled| compiled.tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledTool> {
        self.tools.iter()
    }

    /// Tool descriptions, for listing.
    pub fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|compiled| compiled.tool.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|compiled| compiled.tool.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Compiles command trees into tool sets.
#[derive(Debug, Clone)]
pub struct ToolCompiler {
    selectors: Vec<Arc<Selector>>,
    root_alias: Option<String>,
    reserved: Vec<String>,
    templates: SchemaTemplates,
}

impl ToolCompiler {
    /// A compiler with the built-in reserved names and no selectors. Without
    /// selectors every command passing the safety filters is exposed with
    /// all its flags.
    pub fn new() -> Self {
        Self {
            selectors: Vec::new(),
            root_alias: None,
            reserved: DEFAULT_RESERVED_COMMANDS.iter().map(|name| name.to_string()).collect(),
            templates: SchemaTemplates::new(),
        }
    }

    /// Appends a selector; selectors are consulted in insertion order.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selectors.push(Arc::new(selector));
        self
    }

    /// Replaces the root segment of every tool name.
    pub fn with_root_alias(mut self, alias: impl Into<String>) -> Self {
        self.root_alias = Some(alias.into());
        self
    }

    /// Adds a command name that is never exposed, wherever it appears below
    /// the root.
    pub fn with_reserved(mut self, name: impl Into<String>) -> Self {
        self.reserved.push(name.into());
        self
    }

    pub fn selectors(&self) -> &[Arc<Selector>] {
        &self.selectors
    }

    /// Runs one compilation pass over `root`.
    pub fn compile(&self, root: &CommandNode) -> ToolSet {
        let default_selectors = [Arc::new(Selector::new())];
        let selectors = if self.selectors.is_empty() {
            &default_selectors[..]
        } else {
            &self.selectors[..]
        };

        let mut tools = Vec::new();
        self.walk(root, selectors, &mut tools);
        info!(
            root = %root.name(),
            commands = root.node_count(),
            tools = tools.len(),
            "Compiled command tree"
        );
        ToolSet { tools }
    }

    fn walk(&self, node: &CommandNode, selectors: &[Arc<Selector>], tools: &mut Vec<CompiledTool>) {
        for child in &node.children {
            self.walk(child, selectors, tools);
        }

        if let Some(reason) = self.excluded(node) {
            debug!(command = %node.command_path(), reason, "Command excluded from tools");
            return;
        }

        let Some(selector) = selectors.iter().find(|selector| selector.accepts_command(node)) else {
            debug!(command = %node.command_path(), "No selector matched command");
            return;
        };

        let (tool, flags) = self.build_tool(node, selector);
        debug!(command = %node.command_path(), tool = %tool.name, "Built tool");
        tools.push(CompiledTool {
            tool,
            selector: Arc::clone(selector),
            command_path: node.path.clone(),
            flags,
        });
    }

    /// Safety filters; the returned reason is only for logging.
    fn excluded(&self, node: &CommandNode) -> Option<&'static str> {
        if node.hidden {
            Some("hidden")
        } else if node.deprecated {
            Some("deprecated")
        } else if !node.runnable {
            Some("not runnable")
        } else if node
            .path
            .iter()
            .skip(1)
            .any(|segment| self.reserved.contains(segment))
        {
            Some("reserved name")
        } else {
            None
        }
    }

    fn build_tool(
        &self,
        node: &CommandNode,
        selector: &Selector,
    ) -> (Tool, BTreeMap<String, FlagSpelling>) {
        let local = |flag: &FlagDescriptor| selector.accepts_local_flag(flag);
        let inherited = |flag: &FlagDescriptor| selector.accepts_inherited_flag(flag);
        let flags = flags_schema(node, &local, &inherited);
        let spellings = spellings(node, &flags);

        let tool = Tool {
            name: self.tool_name(node),
            description: describe(node),
            input_schema: self.templates.input_schema(flags, args_description(&node.usage)),
            output_schema: self.templates.output_schema(),
        };
        (tool, spellings)
    }

    fn tool_name(&self, node: &CommandNode) -> String {
        let mut segments: Vec<&str> = node.path.iter().map(String::as_str).collect();
        if let (Some(alias), Some(root)) = (&self.root_alias, segments.first_mut()) {
            *root = alias.as_str();
        }
        segments.join(&TOOL_NAME_SEPARATOR.to_string())
    }
}

impl Default for ToolCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(node: &CommandNode) -> String {
    let mut description = non_blank(&node.long)
        .or_else(|| non_blank(&node.short))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Execute the {} command", node.command_path()));
    if let Some(examples) = node.examples.as_deref().filter(|text| !text.trim().is_empty()) {
        description.push_str("\n\nExamples:\n");
        description.push_str(examples.trim_end());
    }
    description
}

/// Spellings for the flags named in `flags`; a local flag shadows an
/// inherited one of the same name.
fn spellings(node: &CommandNode, flags: &SchemaFragment) -> BTreeMap<String, FlagSpelling> {
    let Some(properties) = flags.properties.as_ref() else {
        return BTreeMap::new();
    };
    properties
        .keys()
        .filter_map(|name| {
            node.local_flags
                .iter()
                .chain(&node.inherited_flags)
                .find(|flag| &flag.name == name)
                .map(|flag| (name.clone(), flag.spelling()))
        })
        .collect()
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|text| !text.is_empty())
}
