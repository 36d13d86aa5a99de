//! Serializable tool manifests.
//!
//! A manifest snapshots a compiled tool set together with a SHA-256 digest of
//! its tool descriptions, so a client holding an older manifest can tell
//! whether the tools it knows about are still current.
//!
//! # Examples
//!
//! ```
//! use command_tools_core::*;
//!
//! let root = CommandNode::new("app").with_child(CommandNode::new("sync"));
//! let tools = ToolCompiler::new().compile(&root);
//!
//! let manifest = ToolManifest::new("app", "2024-01-15T10:30:00Z", &tools).unwrap();
//! assert_eq!(manifest.tool_count(), 2);
//! assert_eq!(manifest.tool_hash.len(), 64);
//! assert!(manifest.matches(&tools).unwrap());
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::{Tool, ToolSet};

/// Manifest format version.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";

/// A versioned snapshot of a tool set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Manifest format version ([`MANIFEST_SCHEMA_VERSION`]).
    pub schema_version: String,
    /// Name of the application the tools were compiled from.
    pub name: String,
    /// RFC 3339 timestamp of generation.
    pub generated_at: String,
    /// Hex SHA-256 of the serialized `tools` array.
    pub tool_hash: String,
    pub tools: Vec<Tool>,
}

impl ToolManifest {
    /// Snapshots `tools` and computes their hash.
    ///
    /// # Errors
    ///
    /// Returns [`Json`](crate::ConfigError::Json) if the tools cannot be
    /// serialized for hashing.
    pub fn new(name: impl Into<String>, generated_at: impl Into<String>, tools: &ToolSet) -> Result<Self> {
        let tools = tools.tools();
        Ok(Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            name: name.into(),
            generated_at: generated_at.into(),
            tool_hash: tool_hash(&tools)?,
            tools,
        })
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when `tools` hash to this manifest's `tool_hash`.
    pub fn matches(&self, tools: &ToolSet) -> Result<bool> {
        Ok(tool_hash(&tools.tools())? == self.tool_hash)
    }

    /// Returns `true` when the stored hash still describes the stored tools.
    pub fn verify(&self) -> Result<bool> {
        Ok(tool_hash(&self.tools)? == self.tool_hash)
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ConfigError::Io) if the file cannot be read, or
    /// [`Json`](crate::ConfigError::Json) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Computes the hex SHA-256 digest of the serialized tool descriptions.
pub fn tool_hash(tools: &[Tool]) -> Result<String> {
    let bytes = serde_json::to_vec(tools)?;
    let hash = Sha256::digest(&bytes);
    Ok(format!("{:x}", hash))
}
