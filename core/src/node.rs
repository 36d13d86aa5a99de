//! Command tree view consumed by the tool compiler.
//!
//! A [`CommandNode`] is a read-only snapshot of one command in a CLI
//! definition: its full path, runnable/hidden/deprecated state, the flags it
//! declares itself ("local") and the flags it sees from its ancestors
//! ("inherited"). Trees are normally produced by an adapter such as
//! [`ClapTreeAdapter`](crate::ClapTreeAdapter), but can be built by hand.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared value type of a flag.
///
/// The tag strings (`"int64"`, `"stringSlice"`, ...) are the names used by
/// flag libraries to describe their value types. Parsing an unknown tag never
/// fails; it yields [`FlagType::Other`] carrying the original label.
///
/// # Examples
///
/// ```
/// use command_tools_core::FlagType;
///
/// assert_eq!(FlagType::from_tag("int64"), FlagType::Int64);
/// assert_eq!(FlagType::from_tag("stringSlice"), FlagType::StringSlice);
/// assert_eq!(FlagType::from_tag("semver"), FlagType::Other("semver".into()));
/// assert_eq!(FlagType::Float64.tag(), "float64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FlagType {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// Occurrence counter (`-vvv`).
    Count,
    Float32,
    Float64,
    String,
    StringSlice,
    StringArray,
    IntSlice,
    Int32Slice,
    Int64Slice,
    UintSlice,
    Float32Slice,
    Float64Slice,
    BoolSlice,
    DurationSlice,
    IpSlice,
    StringToString,
    StringToInt,
    StringToInt64,
    Duration,
    Ip,
    IpMask,
    IpNet,
    BytesHex,
    BytesBase64,
    /// Any type the compiler has no mapping for.
    Other(String),
}

const TAGS: &[(&str, FlagType)] = &[
    ("bool", FlagType::Bool),
    ("int", FlagType::Int),
    ("int8", FlagType::Int8),
    ("int16", FlagType::Int16),
    ("int32", FlagType::Int32),
    ("int64", FlagType::Int64),
    ("uint", FlagType::Uint),
    ("uint8", FlagType::Uint8),
    ("uint16", FlagType::Uint16),
    ("uint32", FlagType::Uint32),
    ("uint64", FlagType::Uint64),
    ("count", FlagType::Count),
    ("float32", FlagType::Float32),
    ("float64", FlagType::Float64),
    ("string", FlagType::String),
    ("stringSlice", FlagType::StringSlice),
    ("stringArray", FlagType::StringArray),
    ("intSlice", FlagType::IntSlice),
    ("int32Slice", FlagType::Int32Slice),
    ("int64Slice", FlagType::Int64Slice),
    ("uintSlice", FlagType::UintSlice),
    ("float32Slice", FlagType::Float32Slice),
    ("float64Slice", FlagType::Float64Slice),
    ("boolSlice", FlagType::BoolSlice),
    ("durationSlice", FlagType::DurationSlice),
    ("ipSlice", FlagType::IpSlice),
    ("stringToString", FlagType::StringToString),
    ("stringToInt", FlagType::StringToInt),
    ("stringToInt64", FlagType::StringToInt64),
    ("duration", FlagType::Duration),
    ("ip", FlagType::Ip),
    ("ipMask", FlagType::IpMask),
    ("ipNet", FlagType::IpNet),
    ("bytesHex", FlagType::BytesHex),
    ("bytesBase64", FlagType::BytesBase64),
];

impl FlagType {
    /// Parses a value type tag. Unknown tags become [`FlagType::Other`].
    pub fn from_tag(tag: &str) -> Self {
        TAGS.iter()
            .find(|(known, _)| *known == tag)
            .map(|(_, flag_type)| flag_type.clone())
            .unwrap_or_else(|| Self::Other(tag.to_string()))
    }

    /// Returns the tag string for this type.
    pub fn tag(&self) -> &str {
        if let Self::Other(label) = self {
            return label;
        }
        TAGS.iter()
            .find(|(_, flag_type)| flag_type == self)
            .map(|(tag, _)| *tag)
            .unwrap_or("string")
    }

    /// Returns the repeated-value variant of a scalar type.
    ///
    /// Scalars without a slice counterpart fall back to
    /// [`FlagType::StringArray`]; collection types are returned unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use command_tools_core::FlagType;
    ///
    /// assert_eq!(FlagType::Int64.slice(), FlagType::Int64Slice);
    /// assert_eq!(FlagType::Uint8.slice(), FlagType::UintSlice);
    /// assert_eq!(FlagType::StringSlice.slice(), FlagType::StringSlice);
    /// ```
    pub fn slice(&self) -> Self {
        match self {
            Self::Bool => Self::BoolSlice,
            Self::Int | Self::Int8 | Self::Int16 => Self::IntSlice,
            Self::Int32 => Self::Int32Slice,
            Self::Int64 => Self::Int64Slice,
            Self::Uint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 => {
                Self::UintSlice
            }
            Self::Float32 => Self::Float32Slice,
            Self::Float64 => Self::Float64Slice,
            Self::String => Self::StringArray,
            Self::Duration => Self::DurationSlice,
            Self::Ip => Self::IpSlice,
            other if other.is_collection() => other.clone(),
            _ => Self::StringArray,
        }
    }

    /// Returns `true` for slice, array, and map types.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::StringSlice
                | Self::StringArray
                | Self::IntSlice
                | Self::Int32Slice
                | Self::Int64Slice
                | Self::UintSlice
                | Self::Float32Slice
                | Self::Float64Slice
                | Self::BoolSlice
                | Self::DurationSlice
                | Self::IpSlice
                | Self::StringToString
                | Self::StringToInt
                | Self::StringToInt64
        )
    }
}

impl From<String> for FlagType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<FlagType> for String {
    fn from(flag_type: FlagType) -> Self {
        flag_type.tag().to_string()
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How a flag's value is written on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagSyntax {
    /// `--name value`; booleans are bare switches.
    #[default]
    Standard,
    /// A bare switch repeated once per count (`-v -v`).
    Counter,
    /// A boolean that takes its value explicitly (`--name=false`).
    ExplicitBool,
}

impl FlagSyntax {
    pub fn is_standard(&self) -> bool {
        *self == Self::Standard
    }
}

/// Everything needed to write a flag back onto a command line.
///
/// # Examples
///
/// ```
/// use command_tools_core::{FlagDescriptor, FlagSyntax, FlagType};
///
/// let jobs = FlagDescriptor::new("jobs", FlagType::Uint32).with_switch("-j");
/// assert_eq!(jobs.spelling().switch, "-j");
///
/// let name = FlagDescriptor::new("name", FlagType::String);
/// assert_eq!(name.spelling().switch, "--name");
/// assert_eq!(name.spelling().syntax, FlagSyntax::Standard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpelling {
    /// `--name` or `-n`.
    pub switch: String,
    pub syntax: FlagSyntax,
}

impl FlagSpelling {
    /// `--name` with the standard syntax.
    pub fn long(name: &str) -> Self {
        Self {
            switch: format!("--{name}"),
            syntax: FlagSyntax::Standard,
        }
    }
}

/// Normalized metadata for one command-line flag.
///
/// # Examples
///
/// ```
/// use command_tools_core::{FlagDescriptor, FlagType};
///
/// let flag = FlagDescriptor::new("output", FlagType::String)
///     .with_usage("Write results to this file")
///     .with_default("out.txt")
///     .required();
/// assert!(flag.required);
/// assert!(flag.is_surfaceable());
///
/// let hidden = FlagDescriptor::new("debug-internals", FlagType::Bool).hidden();
/// assert!(!hidden.is_surfaceable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDescriptor {
    /// Flag name without leading dashes; the long name when there is one.
    pub name: String,
    /// Declared value type.
    pub flag_type: FlagType,
    /// Help text.
    #[serde(default)]
    pub usage: String,
    /// Default value as the flag library renders it (unparsed).
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deprecated: bool,
    /// The flag carries a "required" annotation.
    #[serde(default)]
    pub required: bool,
    /// Allowed values, when the flag library restricts them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    /// Schema used verbatim instead of the derived one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_override: Option<serde_json::Value>,
    /// Command-line switch when it is not `--name` (a short-only `-j`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch: Option<String>,
    #[serde(default, skip_serializing_if = "FlagSyntax::is_standard")]
    pub syntax: FlagSyntax,
}

impl FlagDescriptor {
    /// Creates a visible, optional flag with no usage text or default.
    pub fn new(name: impl Into<String>, flag_type: FlagType) -> Self {
        Self {
            name: name.into(),
            flag_type,
            usage: String::new(),
            default_value: String::new(),
            hidden: false,
            deprecated: false,
            required: false,
            choices: Vec::new(),
            schema_override: None,
            switch: None,
            syntax: FlagSyntax::Standard,
        }
    }

    /// Sets the help text.
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Sets the raw default value.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }

    /// Restricts the flag to a set of values.
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches a precomputed schema.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema_override = Some(schema);
        self
    }

    /// Sets the command-line switch used instead of `--name`.
    pub fn with_switch(mut self, switch: impl Into<String>) -> Self {
        self.switch = Some(switch.into());
        self
    }

    pub fn with_syntax(mut self, syntax: FlagSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn spelling(&self) -> FlagSpelling {
        FlagSpelling {
            switch: self
                .switch
                .clone()
                .unwrap_or_else(|| format!("--{}", self.name)),
            syntax: self.syntax,
        }
    }

    /// Marks the flag as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the flag as hidden.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Marks the flag as deprecated.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Returns `false` for flags that must never reach a tool schema.
    pub fn is_surfaceable(&self) -> bool {
        !self.hidden && !self.deprecated
    }
}

/// One command in a CLI command tree.
///
/// Children built separately are re-rooted under their parent by
/// [`with_child`](CommandNode::with_child), so paths always run from the root.
///
/// # Examples
///
/// ```
/// use command_tools_core::{CommandNode, FlagDescriptor, FlagType};
///
/// let root = CommandNode::new("kubectl")
///     .not_runnable()
///     .with_child(
///         CommandNode::new("get")
///             .with_short("Display resources")
///             .with_local_flag(FlagDescriptor::new("output", FlagType::String)),
///     );
///
/// let get = &root.children[0];
/// assert_eq!(get.path, vec!["kubectl", "get"]);
/// assert_eq!(get.command_path(), "kubectl get");
/// assert_eq!(get.name(), "get");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandNode {
    /// Names from the root down to this command.
    pub path: Vec<String>,
    /// One-line description.
    pub short: Option<String>,
    /// Long-form description.
    pub long: Option<String>,
    /// Usage examples.
    pub examples: Option<String>,
    /// Usage line, e.g. `get [flags] <RESOURCE> [NAME]`.
    pub usage: String,
    /// Has an action of its own (not just a group of subcommands).
    pub runnable: bool,
    pub hidden: bool,
    pub deprecated: bool,
    /// Flags declared on this command.
    pub local_flags: Vec<FlagDescriptor>,
    /// Flags declared on an ancestor and visible here.
    pub inherited_flags: Vec<FlagDescriptor>,
    pub children: Vec<CommandNode>,
}

impl CommandNode {
    /// Creates a runnable root command named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            usage: name.clone(),
            path: vec![name],
            short: None,
            long: None,
            examples: None,
            runnable: true,
            hidden: false,
            deprecated: false,
            local_flags: Vec::new(),
            inherited_flags: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The last path segment.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// The path joined with spaces, as typed on a command line.
    pub fn command_path(&self) -> String {
        self.path.join(" ")
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    pub fn with_examples(mut self, examples: impl Into<String>) -> Self {
        self.examples = Some(examples.into());
        self
    }

    /// Sets the usage line. The first token is the command's own name.
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn with_local_flag(mut self, flag: FlagDescriptor) -> Self {
        self.local_flags.push(flag);
        self
    }

    pub fn with_inherited_flag(mut self, flag: FlagDescriptor) -> Self {
        self.inherited_flags.push(flag);
        self
    }

    /// Adds a child command, prefixing its subtree paths with this path.
    pub fn with_child(mut self, mut child: CommandNode) -> Self {
        child.reroot(&self.path);
        self.children.push(child);
        self
    }

    pub fn not_runnable(mut self) -> Self {
        self.runnable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Counts this node and all of its descendants.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CommandNode::node_count).sum::<usize>()
    }

    // Descendant paths already start with this node's old path, so the same
    // prefix applies to the whole subtree.
    fn reroot(&mut self, prefix: &[String]) {
        let mut path = prefix.to_vec();
        path.append(&mut self.path);
        self.path = path;
        for child in &mut self.children {
            child.reroot(prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_tag_round_trips() {
        for (tag, flag_type) in TAGS {
            assert_eq!(&FlagType::from_tag(tag), flag_type);
            assert_eq!(flag_type.tag(), *tag);
        }
    }

    #[test]
    fn test_unknown_tag_keeps_label() {
        let flag_type = FlagType::from_tag("net.HardwareAddr");
        assert_eq!(flag_type.tag(), "net.HardwareAddr");
        assert!(!flag_type.is_collection());
    }

    #[test]
    fn test_flag_type_serializes_as_tag() {
        let json = serde_json::to_string(&FlagType::StringToInt64).unwrap();
        assert_eq!(json, "\"stringToInt64\"");
        let parsed: FlagType = serde_json::from_str("\"ipNet\"").unwrap();
        assert_eq!(parsed, FlagType::IpNet);
    }

    #[test]
    fn test_nested_children_are_rerooted() {
        let tree = CommandNode::new("app").with_child(
            CommandNode::new("remote")
                .with_child(CommandNode::new("add").with_child(CommandNode::new("force"))),
        );

        let remote = &tree.children[0];
        let add = &remote.children[0];
        let force = &add.children[0];
        assert_eq!(remote.path, vec!["app", "remote"]);
        assert_eq!(add.path, vec!["app", "remote", "add"]);
        assert_eq!(force.path, vec!["app", "remote", "add", "force"]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_deprecated_flag_is_not_surfaceable() {
        let flag = FlagDescriptor::new("old", FlagType::String).deprecated();
        assert!(!flag.is_surfaceable());
    }
}
