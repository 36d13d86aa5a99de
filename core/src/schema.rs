//! Flag-to-schema synthesis.
//!
//! Maps [`FlagDescriptor`]s onto JSON-schema fragments, coerces raw default
//! strings into native JSON values, and assembles the two-property input
//! schema every tool exposes:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "flags": { "type": "object", "properties": { ... }, "required": [...], "additionalProperties": false },
//!     "args":  { "type": "string", "description": "Positional command line arguments..." }
//!   }
//! }
//! ```
//!
//! Synthesis never fails. Unknown types degrade to `string`, unparsable
//! defaults are dropped, and malformed map entries are skipped; each
//! degradation is logged.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::{CommandNode, FlagDescriptor, FlagType};

/// Prefix of every `args` property description.
pub const ARGS_DESCRIPTION: &str = "Positional command line arguments";

const DURATION_NOTE: &str = "format: duration string, e.g. \"300ms\", \"1.5h\" or \"2h45m\"";
const DURATION_PATTERN: &str = r"^-?([0-9]+(\.[0-9]*)?(ns|us|µs|ms|s|m|h))+$";
const IP_NOTE: &str = "format: IPv4 or IPv6 address";
const IP_MASK_NOTE: &str = "format: IPv4 mask, e.g. 255.255.255.0";
const IP_NET_NOTE: &str = "format: IP network in CIDR notation, e.g. 10.0.0.0/8";
const BYTES_HEX_NOTE: &str = "format: hex-encoded bytes";
const BYTES_HEX_PATTERN: &str = "^([0-9a-fA-F]{2})*$";
const BYTES_BASE64_NOTE: &str = "format: base64-encoded bytes";
const BYTES_BASE64_PATTERN: &str = "^[A-Za-z0-9+/]*={0,2}$";

/// JSON-schema primitive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// `additionalProperties` keyword: either a switch or a value schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaFragment>),
}

/// Structured type description for one flag or tool property.
///
/// Keywords the compiler never derives itself (`oneOf`, `minimum`, ...) are
/// kept in [`extra`](SchemaFragment::extra) so schema overrides survive
/// verbatim.
///
/// # Examples
///
/// ```
/// use command_tools_core::{SchemaFragment, SchemaType};
///
/// let tags = SchemaFragment::array_of(SchemaType::String).with_description("Labels");
/// let json = serde_json::to_value(&tags).unwrap();
/// assert_eq!(json["type"], "array");
/// assert_eq!(json["items"]["type"], "string");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFragment {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Element schema for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaFragment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaFragment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Value schema for maps, or `false` for closed objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SchemaFragment {
    /// A bare schema of the given type.
    pub fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Default::default()
        }
    }

    /// An array whose items have the given type.
    pub fn array_of(item_type: SchemaType) -> Self {
        Self {
            schema_type: Some(SchemaType::Array),
            items: Some(Box::new(Self::of(item_type))),
            ..Default::default()
        }
    }

    /// A string-keyed map whose values have the given type.
    pub fn map_of(value_type: SchemaType) -> Self {
        Self {
            schema_type: Some(SchemaType::Object),
            additional_properties: Some(AdditionalProperties::Schema(Box::new(Self::of(
                value_type,
            )))),
            ..Default::default()
        }
    }

    /// A closed object with the given properties and required list.
    pub fn closed_object(properties: BTreeMap<String, SchemaFragment>, required: Vec<String>) -> Self {
        Self {
            schema_type: Some(SchemaType::Object),
            properties: Some(properties),
            required: Some(required),
            additional_properties: Some(AdditionalProperties::Allowed(false)),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Item schema for arrays.
    pub fn item_schema(&self) -> Option<&SchemaFragment> {
        self.items.as_deref()
    }

    /// Value schema for maps.
    pub fn value_schema(&self) -> Option<&SchemaFragment> {
        match &self.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Appends a parenthesized note to the description.
    fn annotate(&mut self, note: &str) {
        self.description = Some(match self.description.take() {
            Some(text) if !text.is_empty() => format!("{text} ({note})"),
            _ => format!("({note})"),
        });
    }
}

/// Derives the schema fragment for a flag from its declared type.
///
/// A schema override on the descriptor is returned verbatim instead. The
/// fragment carries the flag's usage as description and its allowed values
/// as `enum`; defaults are added by [`flag_property`].
///
/// # Examples
///
/// ```
/// use command_tools_core::{fragment_for, FlagDescriptor, FlagType, SchemaType};
///
/// let port = fragment_for(&FlagDescriptor::new("port", FlagType::Int64));
/// assert_eq!(port.schema_type, Some(SchemaType::Integer));
///
/// let labels = fragment_for(&FlagDescriptor::new("label", FlagType::StringToString));
/// assert_eq!(labels.schema_type, Some(SchemaType::Object));
/// assert_eq!(labels.value_schema().unwrap().schema_type, Some(SchemaType::String));
///
/// let timeout = fragment_for(&FlagDescriptor::new("timeout", FlagType::Duration));
/// assert_eq!(timeout.schema_type, Some(SchemaType::String));
/// assert!(timeout.description.unwrap().contains("duration"));
/// ```
pub fn fragment_for(flag: &FlagDescriptor) -> SchemaFragment {
    if let Some(schema) = &flag.schema_override {
        if let Some(fragment) = override_fragment(&flag.name, schema) {
            return fragment;
        }
    }

    let mut fragment = derived_fragment(&flag.flag_type);
    let note = fragment.description.take();
    if !flag.usage.is_empty() {
        fragment.description = Some(flag.usage.clone());
    }
    if let Some(note) = note {
        fragment.annotate(&note);
    }

    if !flag.choices.is_empty() {
        let choices: Vec<Value> = flag.choices.iter().cloned().map(Value::String).collect();
        match fragment.items.as_deref_mut() {
            Some(items) => items.enum_values = choices,
            None => fragment.enum_values = choices,
        }
    }
    fragment
}

fn override_fragment(flag: &str, schema: &Value) -> Option<SchemaFragment> {
    let Value::Object(object) = schema else {
        warn!(flag, "Ignoring schema override that is not a JSON object");
        return None;
    };
    match serde_json::from_value::<SchemaFragment>(schema.clone()) {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            // Keywords this crate cannot type (e.g. a list-valued `type`) are
            // still passed through untouched.
            debug!(flag, error = %e, "Keeping schema override as opaque keywords");
            Some(SchemaFragment {
                extra: object.clone(),
                ..Default::default()
            })
        }
    }
}

/// Type mapping. Format notes travel in `description` until the caller
/// merges them with the flag's usage text.
fn derived_fragment(flag_type: &FlagType) -> SchemaFragment {
    use SchemaType as S;

    let with_note = |mut fragment: SchemaFragment, note: &str| {
        fragment.description = Some(note.to_string());
        fragment
    };
    let with_pattern = |fragment: SchemaFragment, pattern: &str| SchemaFragment {
        pattern: Some(pattern.to_string()),
        ..fragment
    };

    match flag_type {
        FlagType::Bool => SchemaFragment::of(S::Boolean),
        FlagType::Int
        | FlagType::Int8
        | FlagType::Int16
        | FlagType::Int32
        | FlagType::Int64
        | FlagType::Uint
        | FlagType::Uint8
        | FlagType::Uint16
        | FlagType::Uint32
        | FlagType::Uint64
        | FlagType::Count => SchemaFragment::of(S::Integer),
        FlagType::Float32 | FlagType::Float64 => SchemaFragment::of(S::Number),
        FlagType::String => SchemaFragment::of(S::String),
        FlagType::StringSlice | FlagType::StringArray => SchemaFragment::array_of(S::String),
        FlagType::IntSlice | FlagType::Int32Slice | FlagType::Int64Slice | FlagType::UintSlice => {
            SchemaFragment::array_of(S::Integer)
        }
        FlagType::Float32Slice | FlagType::Float64Slice => SchemaFragment::array_of(S::Number),
        FlagType::BoolSlice => SchemaFragment::array_of(S::Boolean),
        FlagType::DurationSlice => with_note(SchemaFragment::array_of(S::String), DURATION_NOTE),
        FlagType::IpSlice => with_note(SchemaFragment::array_of(S::String), IP_NOTE),
        FlagType::StringToString => SchemaFragment::map_of(S::String),
        FlagType::StringToInt | FlagType::StringToInt64 => SchemaFragment::map_of(S::Integer),
        FlagType::Duration => with_note(
            with_pattern(SchemaFragment::of(S::String), DURATION_PATTERN),
            DURATION_NOTE,
        ),
        FlagType::Ip => with_note(SchemaFragment::of(S::String), IP_NOTE),
        FlagType::IpMask => with_note(SchemaFragment::of(S::String), IP_MASK_NOTE),
        FlagType::IpNet => with_note(SchemaFragment::of(S::String), IP_NET_NOTE),
        FlagType::BytesHex => with_note(
            with_pattern(SchemaFragment::of(S::String), BYTES_HEX_PATTERN),
            BYTES_HEX_NOTE,
        ),
        FlagType::BytesBase64 => with_note(
            with_pattern(SchemaFragment::of(S::String), BYTES_BASE64_PATTERN),
            BYTES_BASE64_NOTE,
        ),
        FlagType::Other(label) => {
            debug!(flag_type = %label, "No schema mapping for flag type, using string");
            with_note(SchemaFragment::of(S::String), &format!("type: {label}"))
        }
    }
}

/// Parses a raw default string into the fragment's native JSON form.
///
/// Returns `None` when the raw value is empty, does not parse, or parses to
/// the type's zero value (`false`, `0`, `""`, `[]`, `{}`).
///
/// # Examples
///
/// ```
/// use command_tools_core::{default_for, SchemaFragment, SchemaType};
/// use serde_json::json;
///
/// let ints = SchemaFragment::array_of(SchemaType::Integer);
/// assert_eq!(default_for(&ints, "[1,2,3]"), Some(json!([1, 2, 3])));
/// assert_eq!(default_for(&ints, "[]"), None);
///
/// let counts = SchemaFragment::map_of(SchemaType::Integer);
/// assert_eq!(default_for(&counts, "a=1,b=2"), Some(json!({"a": 1, "b": 2})));
///
/// assert_eq!(default_for(&SchemaFragment::of(SchemaType::String), ""), None);
/// ```
pub fn default_for(fragment: &SchemaFragment, raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    let value = match fragment.schema_type? {
        SchemaType::Array => parse_array(fragment.item_schema(), raw),
        SchemaType::Object => parse_map(fragment.value_schema(), raw),
        SchemaType::String => Some(Value::String(raw.to_string())),
        scalar => parse_scalar(scalar, raw.trim()),
    }?;
    if is_zero(&value) { None } else { Some(value) }
}

/// Returns `true` when the flag must appear in the enclosing `required` list.
pub fn required_for(flag: &FlagDescriptor) -> bool {
    flag.required
}

/// Builds the complete property schema for a flag: fragment plus default.
///
/// Overrides are used as-is; no default is injected into them.
pub fn flag_property(flag: &FlagDescriptor) -> SchemaFragment {
    let mut fragment = fragment_for(flag);
    if flag.schema_override.is_none() {
        fragment.default = default_for(&fragment, &flag.default_value);
        if fragment.default.is_none() && !flag.default_value.trim().is_empty() {
            debug!(
                flag = %flag.name,
                raw_default = %flag.default_value,
                "Default value omitted from schema"
            );
        }
    }
    fragment
}

/// Assembles the `flags` object schema for a command.
///
/// Local flags are visited first, then inherited ones; an inherited flag whose
/// name is already present is skipped. Hidden and deprecated flags are dropped
/// before either predicate is consulted.
pub fn flags_schema(
    node: &CommandNode,
    local: &dyn Fn(&FlagDescriptor) -> bool,
    inherited: &dyn Fn(&FlagDescriptor) -> bool,
) -> SchemaFragment {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();

    let mut add = |flag: &FlagDescriptor| {
        properties.insert(flag.name.clone(), flag_property(flag));
        if required_for(flag) {
            required.push(flag.name.clone());
        }
    };

    let mut local_names = Vec::new();
    for flag in node.local_flags.iter().filter(|flag| flag.is_surfaceable()) {
        if local(flag) {
            local_names.push(flag.name.as_str());
            add(flag);
        }
    }
    for flag in node.inherited_flags.iter().filter(|flag| flag.is_surfaceable()) {
        if local_names.contains(&flag.name.as_str()) {
            continue;
        }
        if inherited(flag) {
            add(flag);
        }
    }

    SchemaFragment::closed_object(properties, required)
}

/// Describes the `args` property from a command's usage line.
///
/// # Examples
///
/// ```
/// use command_tools_core::args_description;
///
/// assert_eq!(
///     args_description("get [flags] <RESOURCE> [NAME]"),
///     "Positional command line arguments. Usage pattern: <RESOURCE> [NAME]"
/// );
/// assert_eq!(args_description("version"), "Positional command line arguments");
/// ```
pub fn args_description(usage: &str) -> String {
    let pattern = usage.replace("[flags]", " ").replace("[OPTIONS]", " ");
    let rest: Vec<&str> = pattern.split_whitespace().skip(1).collect();
    if rest.is_empty() {
        ARGS_DESCRIPTION.to_string()
    } else {
        format!("{ARGS_DESCRIPTION}. Usage pattern: {}", rest.join(" "))
    }
}

/// Schema shapes shared by every tool.
///
/// Built once per compiler and cloned into each tool, so no tool ever
/// mutates a shared schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaTemplates {
    input: SchemaFragment,
    output: SchemaFragment,
}

impl SchemaTemplates {
    pub fn new() -> Self {
        let mut input_properties = BTreeMap::new();
        input_properties.insert(
            "flags".to_string(),
            SchemaFragment::closed_object(BTreeMap::new(), Vec::new())
                .with_description("Flag values keyed by flag name"),
        );
        input_properties.insert(
            "args".to_string(),
            SchemaFragment::of(SchemaType::String).with_description(ARGS_DESCRIPTION),
        );
        let input = SchemaFragment {
            schema_type: Some(SchemaType::Object),
            properties: Some(input_properties),
            ..Default::default()
        };

        let mut output_properties = BTreeMap::new();
        output_properties.insert(
            "stdout".to_string(),
            SchemaFragment::of(SchemaType::String).with_description("Captured standard output"),
        );
        output_properties.insert(
            "stderr".to_string(),
            SchemaFragment::of(SchemaType::String).with_description("Captured standard error"),
        );
        output_properties.insert(
            "exitCode".to_string(),
            SchemaFragment::of(SchemaType::Integer).with_description("Process exit code"),
        );
        let output = SchemaFragment {
            schema_type: Some(SchemaType::Object),
            properties: Some(output_properties),
            required: Some(vec![
                "stdout".to_string(),
                "stderr".to_string(),
                "exitCode".to_string(),
            ]),
            ..Default::default()
        };

        Self { input, output }
    }

    /// Input schema with the given `flags` schema and `args` description.
    pub fn input_schema(&self, flags: SchemaFragment, args_description: String) -> SchemaFragment {
        let mut schema = self.input.clone();
        let properties = schema.properties.get_or_insert_with(BTreeMap::new);
        let flags_description = properties
            .get("flags")
            .and_then(|template| template.description.clone());
        properties.insert(
            "flags".to_string(),
            SchemaFragment {
                description: flags.description.clone().or(flags_description),
                ..flags
            },
        );
        if let Some(args) = properties.get_mut("args") {
            args.description = Some(args_description);
        }
        schema
    }

    /// The fixed `{stdout, stderr, exitCode}` output schema.
    pub fn output_schema(&self) -> SchemaFragment {
        self.output.clone()
    }
}

impl Default for SchemaTemplates {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_scalar(schema_type: SchemaType, raw: &str) -> Option<Value> {
    match schema_type {
        SchemaType::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        SchemaType::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .ok(),
        SchemaType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        SchemaType::String => Some(Value::String(raw.to_string())),
        SchemaType::Array | SchemaType::Object => None,
    }
}

fn parse_array(items: Option<&SchemaFragment>, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        debug!(raw_default = raw, "Array default is not in [a,b,c] form");
        return None;
    };
    if inner.trim().is_empty() {
        return None;
    }

    let item_type = items
        .and_then(|schema| schema.schema_type)
        .unwrap_or(SchemaType::String);
    let mut values = Vec::new();
    for element in inner.split(',') {
        let element = element.trim();
        match parse_scalar(item_type, element) {
            Some(value) => values.push(value),
            None => {
                debug!(raw_default = raw, element, "Array default element does not parse");
                return None;
            }
        }
    }
    Some(Value::Array(values))
}

fn parse_map(values: Option<&SchemaFragment>, raw: &str) -> Option<Value> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(raw);
    let value_type = values
        .and_then(|schema| schema.schema_type)
        .unwrap_or(SchemaType::String);

    let mut map = Map::new();
    for entry in inner.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            warn!(raw_default = raw, entry, "Skipping map default entry without '='");
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            warn!(raw_default = raw, entry, "Skipping map default entry with empty key");
            continue;
        }
        match parse_scalar(value_type, value.trim()) {
            // Later entries replace earlier ones with the same key.
            Some(parsed) => {
                map.insert(key.to_string(), parsed);
            }
            None => warn!(raw_default = raw, entry, "Skipping unparsable map default entry"),
        }
    }

    if map.is_empty() { None } else { Some(Value::Object(map)) }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(entries) => entries.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flag(name: &str, tag: &str) -> FlagDescriptor {
        FlagDescriptor::new(name, FlagType::from_tag(tag))
    }

    fn type_of(tag: &str) -> (Option<SchemaType>, Option<SchemaType>) {
        let fragment = fragment_for(&flag("f", tag));
        let nested = fragment
            .item_schema()
            .or_else(|| fragment.value_schema())
            .and_then(|schema| schema.schema_type);
        (fragment.schema_type, nested)
    }

    #[test]
    fn test_type_mapping_is_explicit() {
        use SchemaType::{Array, Boolean, Integer, Number, Object, String};

        let cases: &[(&str, SchemaType, Option<SchemaType>)] = &[
            ("bool", Boolean, None),
            ("int", Integer, None),
            ("int8", Integer, None),
            ("int16", Integer, None),
            ("int32", Integer, None),
            ("int64", Integer, None),
            ("uint", Integer, None),
            ("uint8", Integer, None),
            ("uint16", Integer, None),
            ("uint32", Integer, None),
            ("uint64", Integer, None),
            ("count", Integer, None),
            ("float32", Number, None),
            ("float64", Number, None),
            ("string", String, None),
            ("stringSlice", Array, Some(String)),
            ("stringArray", Array, Some(String)),
            ("intSlice", Array, Some(Integer)),
            ("int32Slice", Array, Some(Integer)),
            ("int64Slice", Array, Some(Integer)),
            ("uintSlice", Array, Some(Integer)),
            ("float32Slice", Array, Some(Number)),
            ("float64Slice", Array, Some(Number)),
            ("boolSlice", Array, Some(Boolean)),
            ("stringToString", Object, Some(String)),
            ("stringToInt", Object, Some(Integer)),
            ("stringToInt64", Object, Some(Integer)),
            ("duration", String, None),
            ("ip", String, None),
            ("ipMask", String, None),
            ("ipNet", String, None),
            ("bytesHex", String, None),
            ("bytesBase64", String, None),
        ];
        for (tag, expected, nested) in cases {
            assert_eq!(type_of(tag), (Some(*expected), *nested), "tag {tag}");
        }
    }

    #[test]
    fn test_unknown_type_falls_back_to_string_with_label() {
        let fragment = fragment_for(&flag("mac", "net.HardwareAddr").with_usage("Interface address"));
        assert_eq!(fragment.schema_type, Some(SchemaType::String));
        assert_eq!(
            fragment.description.as_deref(),
            Some("Interface address (type: net.HardwareAddr)")
        );
    }

    #[test]
    fn test_format_notes_are_appended_to_usage() {
        let fragment = fragment_for(&flag("bind", "ip").with_usage("Listen address"));
        assert_eq!(
            fragment.description.as_deref(),
            Some("Listen address (format: IPv4 or IPv6 address)")
        );

        let fragment = fragment_for(&flag("key", "bytesHex"));
        assert_eq!(fragment.description.as_deref(), Some("(format: hex-encoded bytes)"));
        assert_eq!(fragment.pattern.as_deref(), Some(BYTES_HEX_PATTERN));
    }

    #[test]
    fn test_schema_override_is_used_verbatim() {
        let schema = json!({
            "type": "object",
            "properties": {"replicas": {"type": "integer", "minimum": 1}},
            "required": ["replicas"]
        });
        let descriptor = flag("deployment", "string")
            .with_usage("ignored")
            .with_default("also ignored")
            .with_schema(schema.clone());

        let property = flag_property(&descriptor);
        assert_eq!(serde_json::to_value(&property).unwrap(), schema);
    }

    #[test]
    fn test_untyped_override_keywords_survive() {
        let schema = json!({"type": ["string", "null"], "maxLength": 8});
        let property = flag_property(&flag("nick", "string").with_schema(schema.clone()));
        assert_eq!(serde_json::to_value(&property).unwrap(), schema);
    }

    #[test]
    fn test_non_object_override_is_ignored() {
        let property = flag_property(&flag("n", "int").with_schema(json!(true)));
        assert_eq!(property.schema_type, Some(SchemaType::Integer));
    }

    #[test]
    fn test_choices_become_enum() {
        let fragment = fragment_for(&flag("format", "string").with_choices(["json", "yaml"]));
        assert_eq!(fragment.enum_values, vec![json!("json"), json!("yaml")]);

        let fragment = fragment_for(&flag("formats", "stringArray").with_choices(["a"]));
        assert!(fragment.enum_values.is_empty());
        assert_eq!(fragment.item_schema().unwrap().enum_values, vec![json!("a")]);
    }

    #[test]
    fn test_scalar_defaults() {
        assert_eq!(
            flag_property(&flag("v", "bool").with_default("true")).default,
            Some(json!(true))
        );
        assert_eq!(
            flag_property(&flag("n", "int64").with_default("42")).default,
            Some(json!(42))
        );
        assert_eq!(
            flag_property(&flag("n", "uint64").with_default("18446744073709551615")).default,
            Some(json!(18446744073709551615u64))
        );
        assert_eq!(
            flag_property(&flag("r", "float64").with_default("0.25")).default,
            Some(json!(0.25))
        );
        assert_eq!(
            flag_property(&flag("s", "string").with_default("hello world")).default,
            Some(json!("hello world"))
        );
    }

    #[test]
    fn test_zero_and_empty_defaults_are_absent() {
        for (tag, raw) in [
            ("string", ""),
            ("stringSlice", "[]"),
            ("intSlice", "[ ]"),
            ("stringToString", "[]"),
            ("stringToInt", ""),
            ("bool", "false"),
            ("int", "0"),
            ("float64", "0"),
        ] {
            assert_eq!(
                flag_property(&flag("f", tag).with_default(raw)).default,
                None,
                "{tag} with {raw:?}"
            );
        }
    }

    #[test]
    fn test_unparsable_scalar_default_is_absent() {
        assert_eq!(
            flag_property(&flag("n", "int").with_default("ten")).default,
            None
        );
    }

    #[test]
    fn test_array_defaults_require_brackets() {
        let strings = SchemaFragment::array_of(SchemaType::String);
        assert_eq!(default_for(&strings, "[ a , b,c ]"), Some(json!(["a", "b", "c"])));
        assert_eq!(default_for(&strings, "a,b"), None);
        assert_eq!(default_for(&strings, "[a,b"), None);

        let floats = SchemaFragment::array_of(SchemaType::Number);
        assert_eq!(default_for(&floats, "[1.5,2]"), Some(json!([1.5, 2.0])));

        let ints = SchemaFragment::array_of(SchemaType::Integer);
        assert_eq!(default_for(&ints, "[1,x,3]"), None);
    }

    #[test]
    fn test_map_defaults_skip_bad_entries() {
        let counts = SchemaFragment::map_of(SchemaType::Integer);
        assert_eq!(
            default_for(&counts, "[a=1, broken, b = 2, c=x]"),
            Some(json!({"a": 1, "b": 2}))
        );
        assert_eq!(default_for(&counts, "broken,c=x,=3"), None);

        let labels = SchemaFragment::map_of(SchemaType::String);
        assert_eq!(
            default_for(&labels, "env=prod,tier=web"),
            Some(json!({"env": "prod", "tier": "web"}))
        );
    }

    #[test]
    fn test_map_default_duplicate_keys_last_wins() {
        let labels = SchemaFragment::map_of(SchemaType::String);
        assert_eq!(default_for(&labels, "a=1,a=2"), Some(json!({"a": "2"})));
    }

    #[test]
    fn test_flags_schema_local_wins_and_filters_hidden() {
        let node = CommandNode::new("app")
            .with_local_flag(flag("output", "string").with_usage("local output").required())
            .with_local_flag(flag("secret", "string").hidden())
            .with_inherited_flag(flag("output", "int").with_usage("inherited output"))
            .with_inherited_flag(flag("verbose", "bool"))
            .with_inherited_flag(flag("legacy", "bool").deprecated());

        let accept = |_: &FlagDescriptor| true;
        let schema = flags_schema(&node, &accept, &accept);
        let properties = schema.properties.as_ref().unwrap();

        assert_eq!(
            properties.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["output", "verbose"]
        );
        assert_eq!(properties["output"].description.as_deref(), Some("local output"));
        assert_eq!(schema.required, Some(vec!["output".to_string()]));
        assert_eq!(
            schema.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
    }

    #[test]
    fn test_flags_schema_applies_predicates_per_collection() {
        let node = CommandNode::new("app")
            .with_local_flag(flag("a", "string"))
            .with_local_flag(flag("b", "string"))
            .with_inherited_flag(flag("c", "string"));

        let local = |flag: &FlagDescriptor| flag.name == "a";
        let inherited = |_: &FlagDescriptor| false;
        let schema = flags_schema(&node, &local, &inherited);
        let names: Vec<_> = schema.properties.unwrap().into_keys().collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_empty_flags_schema_keeps_required_array() {
        let accept = |_: &FlagDescriptor| true;
        let schema = flags_schema(&CommandNode::new("app"), &accept, &accept);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            json!({"type": "object", "properties": {}, "required": [], "additionalProperties": false})
        );
    }

    #[test]
    fn test_args_description_strips_options_marker() {
        assert_eq!(
            args_description("sum [OPTIONS] <NUMBERS>..."),
            "Positional command line arguments. Usage pattern: <NUMBERS>..."
        );
        assert_eq!(args_description(""), ARGS_DESCRIPTION);
    }

    #[test]
    fn test_templates_are_cloned_not_shared() {
        let templates = SchemaTemplates::new();
        let accept = |_: &FlagDescriptor| true;
        let node = CommandNode::new("app").with_local_flag(flag("x", "int"));
        let input = templates.input_schema(
            flags_schema(&node, &accept, &accept),
            args_description("app <FILE>"),
        );

        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["properties"]["flags"]["properties"]["x"]["type"], "integer");
        assert_eq!(
            json["properties"]["args"]["description"],
            "Positional command line arguments. Usage pattern: <FILE>"
        );

        let pristine = serde_json::to_value(&SchemaTemplates::new().input_schema(
            SchemaFragment::closed_object(BTreeMap::new(), Vec::new()),
            ARGS_DESCRIPTION.to_string(),
        ))
        .unwrap();
        assert!(pristine["properties"]["flags"]["properties"]
            .as_object()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_output_schema_shape() {
        let json = serde_json::to_value(SchemaTemplates::new().output_schema()).unwrap();
        assert_eq!(json["properties"]["stdout"]["type"], "string");
        assert_eq!(json["properties"]["stderr"]["type"], "string");
        assert_eq!(json["properties"]["exitCode"]["type"], "integer");
        assert_eq!(json["required"], json!(["stdout", "stderr", "exitCode"]));
    }
}
