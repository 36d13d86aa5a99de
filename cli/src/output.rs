//! Output formatting for tool manifests.

use command_tools_core::{SchemaFragment, Tool, ToolManifest};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
}

/// Formats a manifest in the requested output format.
pub fn format_manifest(manifest: &ToolManifest, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(manifest)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(manifest).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(manifest_to_markdown(manifest)),
    }
}

fn manifest_to_markdown(manifest: &ToolManifest) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {} tools\n\n", manifest.name));
    out.push_str(&format!("**Generated:** {}\n\n", manifest.generated_at));
    out.push_str(&format!("**Tool hash:** `{}`\n\n", manifest.tool_hash));

    for tool in &manifest.tools {
        tool_to_markdown(tool, &mut out);
    }

    out
}

fn tool_to_markdown(tool: &Tool, out: &mut String) {
    out.push_str(&format!("## {}\n\n", tool.name));
    out.push_str(&format!("{}\n\n", tool.description));

    let properties = tool.input_schema.properties.as_ref();
    let flags = properties.and_then(|properties| properties.get("flags"));
    let required = flags
        .and_then(|flags| flags.required.clone())
        .unwrap_or_default();

    if let Some(flag_properties) = flags
        .and_then(|flags| flags.properties.as_ref())
        .filter(|flag_properties| !flag_properties.is_empty())
    {
        out.push_str("| Flag | Type | Required | Default | Description |\n");
        out.push_str("|------|------|----------|---------|-------------|\n");
        for (name, schema) in flag_properties {
            let is_required = if required.contains(name) { "yes" } else { "no" };
            let default = schema
                .default
                .as_ref()
                .map(|value| format!("`{value}`"))
                .unwrap_or_default();
            let description = schema
                .description
                .as_deref()
                .unwrap_or("")
                .replace('\n', " ");
            out.push_str(&format!(
                "| `--{name}` | {} | {is_required} | {default} | {description} |\n",
                type_label(schema)
            ));
        }
        out.push('\n');
    }

    if let Some(args) = properties
        .and_then(|properties| properties.get("args"))
        .and_then(|args| args.description.as_deref())
    {
        out.push_str(&format!("**Arguments:** {args}\n\n"));
    }
}

fn type_label(schema: &SchemaFragment) -> String {
    let Some(schema_type) = schema.schema_type else {
        return "custom".to_string();
    };
    let mut label = match (schema.item_schema(), schema.value_schema()) {
        (Some(items), _) => format!("{schema_type}<{}>", type_label(items)),
        (None, Some(values)) => format!("map<string, {}>", type_label(values)),
        (None, None) => schema_type.to_string(),
    };
    if !schema.enum_values.is_empty() {
        let choices: Vec<String> = schema
            .enum_values
            .iter()
            .map(|value| value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
            .collect();
        label.push_str(&format!(" ({})", choices.join("\\|")));
    }
    label
}
