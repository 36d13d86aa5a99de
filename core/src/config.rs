//! YAML configuration for tool selection.
//!
//! Describes an ordered list of selector rules so a command tree can be
//! exposed differently without rebuilding the binary.
//!
//! # Example YAML
//!
//! ```yaml
//! root_alias: app
//! reserved_commands:
//!   - admin
//! selectors:
//!   - commands: ["^app math"]
//!     exclude_local_flags: [precision]
//!     timeout_secs: 5
//!   - exclude_commands: ["^app fail"]
//!     exclude_inherited_flags: [verbose]
//! ```
//!
//! Command patterns are regexes matched against the space-joined command
//! path (`"app math sum"`). Empty lists match everything.

use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::{CommandNode, FlagDescriptor, Selector, ToolCompiler};

/// One selector rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Command path patterns; a command must match at least one.
    pub commands: Vec<String>,
    /// Command path patterns; a command must match none.
    pub exclude_commands: Vec<String>,
    /// Local flags to expose (empty = all).
    pub local_flags: Vec<String>,
    /// Local flags to hide.
    pub exclude_local_flags: Vec<String>,
    /// Inherited flags to expose (empty = all).
    pub inherited_flags: Vec<String>,
    /// Inherited flags to hide.
    pub exclude_inherited_flags: Vec<String>,
    /// Deadline applied to every call handled by this rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SelectorConfig {
    /// Builds the runtime selector for this rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] when a command pattern does not
    /// compile.
    pub fn to_selector(&self) -> Result<Selector> {
        let include = compile_patterns(&self.commands)?;
        let exclude = compile_patterns(&self.exclude_commands)?;

        let mut selector = Selector::new();
        if !include.is_empty() || !exclude.is_empty() {
            selector = selector.matching(move |node: &CommandNode| {
                let path = node.command_path();
                (include.is_empty() || include.iter().any(|pattern| pattern.is_match(&path)))
                    && !exclude.iter().any(|pattern| pattern.is_match(&path))
            });
        }
        if let Some(test) = name_filter(&self.local_flags, &self.exclude_local_flags) {
            selector = selector.with_local_flags(test);
        }
        if let Some(test) = name_filter(&self.inherited_flags, &self.exclude_inherited_flags) {
            selector = selector.with_inherited_flags(test);
        }
        if let Some(secs) = self.timeout_secs {
            let timeout = Duration::from_secs(secs);
            selector = selector.with_pre_invoke(move |ctx, request, _input| {
                debug!(tool = %request.name, timeout_secs = secs, "Applying call deadline");
                ctx.with_timeout(timeout)
            });
        }
        Ok(selector)
    }
}

/// Top-level selection configuration.
///
/// # Examples
///
/// ```
/// use command_tools_core::{CommandNode, ToolsConfig};
///
/// let config = ToolsConfig::from_yaml_str(
///     "root_alias: demo\nselectors:\n  - commands: ['^app sync']\n",
/// )
/// .unwrap();
///
/// let root = CommandNode::new("app")
///     .not_runnable()
///     .with_child(CommandNode::new("sync"))
///     .with_child(CommandNode::new("purge"));
/// let tools = config.compiler().unwrap().compile(&root);
/// assert_eq!(tools.names(), vec!["demo_sync"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Replacement for the root segment of tool names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_alias: Option<String>,
    /// Command names never exposed, in addition to the built-in ones.
    pub reserved_commands: Vec<String>,
    /// Selector rules, first match wins.
    pub selectors: Vec<SelectorConfig>,
}

impl ToolsConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Builds a compiler carrying this configuration.
    pub fn compiler(&self) -> Result<ToolCompiler> {
        let mut compiler = ToolCompiler::new();
        if let Some(alias) = &self.root_alias {
            compiler = compiler.with_root_alias(alias.clone());
        }
        for name in &self.reserved_commands {
            compiler = compiler.with_reserved(name.clone());
        }
        for rule in &self.selectors {
            compiler = compiler.with_selector(rule.to_selector()?);
        }
        Ok(compiler)
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

fn name_filter(
    allow: &[String],
    deny: &[String],
) -> Option<impl Fn(&FlagDescriptor) -> bool + Send + Sync + 'static> {
    if allow.is_empty() && deny.is_empty() {
        return None;
    }
    let allow = allow.to_vec();
    let deny = deny.to_vec();
    Some(move |flag: &FlagDescriptor| {
        (allow.is_empty() || allow.contains(&flag.name)) && !deny.contains(&flag.name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallRequest, FlagType, InvocationContext, ToolInput};
    use serde_json::json;

    fn tree() -> CommandNode {
        CommandNode::new("app")
            .not_runnable()
            .with_inherited_flag(FlagDescriptor::new("verbose", FlagType::Bool))
            .with_child(
                CommandNode::new("math")
                    .not_runnable()
                    .with_child(
                        CommandNode::new("sum")
                            .with_local_flag(FlagDescriptor::new("precision", FlagType::Int))
                            .with_local_flag(FlagDescriptor::new("label", FlagType::String))
                            .with_inherited_flag(FlagDescriptor::new("verbose", FlagType::Bool)),
                    ),
            )
            .with_child(CommandNode::new("fail"))
    }

    fn flag_names(tools: &crate::ToolSet, tool: &str) -> Vec<String> {
        let compiled = tools.get(tool).unwrap();
        compiled.tool.input_schema.properties.as_ref().unwrap()["flags"]
            .properties
            .as_ref()
            .unwrap()
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
root_alias: demo
reserved_commands: [fail]
selectors:
  - commands: ["^app math"]
    exclude_local_flags: [precision]
    timeout_secs: 5
  - exclude_inherited_flags: [verbose]
"#;
        let config = ToolsConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.root_alias.as_deref(), Some("demo"));
        assert_eq!(config.selectors.len(), 2);
        assert_eq!(config.selectors[0].timeout_secs, Some(5));
        assert!(config.selectors[1].commands.is_empty());

        let tools = config.compiler().unwrap().compile(&tree());
        assert_eq!(tools.names(), vec!["demo_math_sum"]);
        assert_eq!(flag_names(&tools, "demo_math_sum"), vec!["label", "verbose"]);
    }

    #[test]
    fn test_rules_are_ordered() {
        let config = ToolsConfig {
            selectors: vec![
                SelectorConfig {
                    commands: vec!["fail$".into()],
                    exclude_inherited_flags: vec!["verbose".into()],
                    ..Default::default()
                },
                SelectorConfig {
                    local_flags: vec!["precision".into()],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let tools = config.compiler().unwrap().compile(&tree());
        assert_eq!(flag_names(&tools, "app_math_sum"), vec!["precision", "verbose"]);
        assert!(flag_names(&tools, "app_fail").is_empty());
    }

    #[test]
    fn test_exclude_commands() {
        let config = ToolsConfig::from_yaml_str("selectors:\n  - exclude_commands: [' sum$']\n").unwrap();
        let tools = config.compiler().unwrap().compile(&tree());
        assert_eq!(tools.names(), vec!["app_fail"]);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let config = ToolsConfig::from_yaml_str("selectors:\n  - commands: ['(']\n").unwrap();
        let err = config.compiler().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref pattern, .. } if pattern == "("));
    }

    #[test]
    fn test_timeout_becomes_deadline_hook() {
        let selector = SelectorConfig {
            timeout_secs: Some(30),
            ..Default::default()
        }
        .to_selector()
        .unwrap();

        let mut request = CallRequest::new("app_fail", json!({}));
        let mut input = ToolInput::default();
        let ctx = selector.pre_invoke(InvocationContext::new(), &mut request, &mut input);
        assert!(ctx.deadline().is_some());
    }

    #[test]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tools.yml");
        let config = ToolsConfig {
            root_alias: Some("demo".into()),
            reserved_commands: vec!["admin".into()],
            selectors: vec![SelectorConfig {
                commands: vec!["^demo".into()],
                timeout_secs: Some(2),
                ..Default::default()
            }],
        };
        config.save(&path).unwrap();
        assert_eq!(ToolsConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ToolsConfig::load("/nonexistent/tools.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
