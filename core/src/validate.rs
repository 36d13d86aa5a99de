//! Tool set validation.
//!
//! The compiler never rejects a command tree, so structural problems that
//! matter to callers (duplicate names, names agents refuse) are surfaced
//! here as findings rather than errors.
//!
//! # Examples
//!
//! ```
//! use command_tools_core::*;
//!
//! let root = CommandNode::new("app").with_child(CommandNode::new("sync"));
//! let tools = ToolCompiler::new().compile(&root);
//! assert!(validate_tools(&tools).is_empty());
//!
//! // `app_a_b` twice: once from `a_b`, once from `a b`
//! let root = CommandNode::new("app")
//!     .with_child(CommandNode::new("a_b"))
//!     .with_child(CommandNode::new("a").not_runnable().with_child(CommandNode::new("b")));
//! let errors = validate_tools(&ToolCompiler::new().compile(&root));
//! assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateToolName(_))));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{SchemaType, Tool, ToolSet};

/// Longest tool name most agent runtimes accept.
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Tool set validation findings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Tool name is empty or whitespace-only.
    #[error("tool name cannot be empty")]
    EmptyToolName,
    /// Tool name exceeds [`MAX_TOOL_NAME_LEN`] characters.
    #[error("tool name longer than {MAX_TOOL_NAME_LEN} characters: {0}")]
    ToolNameTooLong(String),
    /// Tool name contains characters outside `[A-Za-z0-9_-]`.
    #[error("tool name contains invalid characters: {0}")]
    InvalidToolName(String),
    /// Two tools share a name; only the first is reachable.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),
    /// The `flags` input property is missing or not an object schema.
    #[error("flags schema is not an object: {0}")]
    FlagsNotObject(String),
}

/// Validates every tool in a compiled set.
pub fn validate_tools(tools: &ToolSet) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for compiled in tools.iter() {
        let tool = &compiled.tool;
        validate_tool(tool, &mut errors);
        if !tool.name.trim().is_empty() && !seen.insert(tool.name.as_str()) {
            errors.push(ValidationError::DuplicateToolName(tool.name.clone()));
        }
    }

    errors
}

/// Validates a single tool description.
///
/// # Examples
///
/// ```
/// use command_tools_core::*;
///
/// let tools = ToolCompiler::new().with_root_alias("my tool").compile(&CommandNode::new("app"));
/// let errors = validate_tool_description(&tools.tools()[0]);
/// assert_eq!(errors, vec![ValidationError::InvalidToolName("my tool".into())]);
/// ```
pub fn validate_tool_description(tool: &Tool) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_tool(tool, &mut errors);
    errors
}

fn validate_tool(tool: &Tool, errors: &mut Vec<ValidationError>) {
    let name = tool.name.as_str();
    if name.trim().is_empty() {
        errors.push(ValidationError::EmptyToolName);
    } else {
        if name.chars().count() > MAX_TOOL_NAME_LEN {
            errors.push(ValidationError::ToolNameTooLong(name.to_string()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            errors.push(ValidationError::InvalidToolName(name.to_string()));
        }
    }

    let flags_is_object = tool
        .input_schema
        .properties
        .as_ref()
        .and_then(|properties| properties.get("flags"))
        .is_some_and(|flags| flags.schema_type == Some(SchemaType::Object));
    if !flags_is_object {
        errors.push(ValidationError::FlagsNotObject(name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CommandNode, SchemaFragment, ToolCompiler};

    fn single_tool(root: CommandNode) -> Tool {
        ToolCompiler::new().compile(&root).tools().remove(0)
    }

    #[test]
    fn test_valid_tree_has_no_findings() {
        let root = CommandNode::new("app")
            .with_child(CommandNode::new("sync"))
            .with_child(CommandNode::new("push-all"));
        assert!(validate_tools(&ToolCompiler::new().compile(&root)).is_empty());
    }

    #[test]
    fn test_empty_name() {
        let mut tool = single_tool(CommandNode::new("app"));
        tool.name = "  ".into();
        assert_eq!(
            validate_tool_description(&tool),
            vec![ValidationError::EmptyToolName]
        );
    }

    #[test]
    fn test_name_too_long() {
        let long = "x".repeat(MAX_TOOL_NAME_LEN + 1);
        let tool = single_tool(CommandNode::new(long.clone()));
        assert_eq!(
            validate_tool_description(&tool),
            vec![ValidationError::ToolNameTooLong(long)]
        );

        let exact = single_tool(CommandNode::new("x".repeat(MAX_TOOL_NAME_LEN)));
        assert!(validate_tool_description(&exact).is_empty());
    }

    #[test]
    fn test_flags_must_be_object() {
        let mut tool = single_tool(CommandNode::new("app"));
        tool.input_schema
            .properties
            .as_mut()
            .unwrap()
            .insert("flags".into(), SchemaFragment::of(SchemaType::String));
        assert_eq!(
            validate_tool_description(&tool),
            vec![ValidationError::FlagsNotObject("app".into())]
        );

        tool.input_schema.properties = None;
        assert_eq!(
            validate_tool_description(&tool),
            vec![ValidationError::FlagsNotObject("app".into())]
        );
    }

    #[test]
    fn test_duplicates_reported_once_per_extra() {
        let root = CommandNode::new("app")
            .with_child(CommandNode::new("a_b"))
            .with_child(CommandNode::new("a_b"))
            .with_child(CommandNode::new("a_b"));
        let errors = validate_tools(&ToolCompiler::new().compile(&root));
        assert_eq!(
            errors,
            vec![
                ValidationError::DuplicateToolName("app_a_b".into()),
                ValidationError::DuplicateToolName("app_a_b".into()),
            ]
        );
    }
}
