//! Module descriptor schema.
//!
//! Every module in the index is described by a small JSON document
//! (`module.txt` in a tree index, or one value of a flat index document).
//! Only `id` is required; the well-known fields are typed and everything
//! else is carried through untouched in [`ModuleDescriptor::metadata`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// A parsed module descriptor.
///
/// Descriptors are immutable value objects once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDescriptor {
    /// Unique module identifier.
    pub id: String,
    /// Module version as published in the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human-readable name.
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<LocalizedText>,
    /// Short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    /// Author string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Declared dependencies, in declaration order.
    pub dependencies: Vec<DependencySpec>,
    /// All remaining fields, passed through verbatim.
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Text that is either a plain string or a locale → string map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    /// The text to show, preferring English for localized values.
    pub fn text(&self) -> Option<&str> {
        match self {
            LocalizedText::Plain(s) => Some(s),
            LocalizedText::Localized(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .map(String::as_str),
        }
    }
}

/// A declared dependency: either a bare id or a detailed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Id(String),
    Detailed(DependencyInfo),
}

/// A detailed dependency entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl DependencySpec {
    /// The dependency's module id.
    pub fn id(&self) -> &str {
        match self {
            DependencySpec::Id(id) => id,
            DependencySpec::Detailed(info) => &info.id,
        }
    }
}

/// Wire shape; `id` is optional here so a missing id can be reported
/// separately from malformed JSON.
#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "displayName")]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    description: Option<LocalizedText>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    dependencies: Vec<DependencySpec>,
    #[serde(flatten)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl ModuleDescriptor {
    /// Parse a descriptor from UTF-8 JSON bytes.
    ///
    /// `source_name` identifies the origin entry in error messages.
    pub fn from_slice(bytes: &[u8], source_name: &str) -> Result<Self> {
        let raw: RawDescriptor =
            serde_json::from_slice(bytes).map_err(|e| IndexError::Parse {
                source_name: source_name.to_string(),
                detail: e.to_string(),
            })?;
        Self::from_raw(raw, source_name)
    }

    /// Parse a descriptor from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value, source_name: &str) -> Result<Self> {
        let raw: RawDescriptor =
            serde_json::from_value(value).map_err(|e| IndexError::Parse {
                source_name: source_name.to_string(),
                detail: e.to_string(),
            })?;
        Self::from_raw(raw, source_name)
    }

    fn from_raw(raw: RawDescriptor, source_name: &str) -> Result<Self> {
        let id = raw.id.ok_or_else(|| IndexError::MissingId {
            source_name: source_name.to_string(),
        })?;
        Ok(ModuleDescriptor {
            id,
            version: raw.version,
            display_name: raw.display_name,
            description: raw.description,
            author: raw.author,
            dependencies: raw.dependencies,
            metadata: raw.metadata,
        })
    }

    /// Identifiers of the declared dependencies, in declaration order.
    pub fn dependency_ids(&self) -> Vec<&str> {
        self.dependencies.iter().map(DependencySpec::id).collect()
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.display_name
            .as_ref()
            .and_then(LocalizedText::text)
            .unwrap_or(&self.id)
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{} v{}", self.id, v),
            None => write!(f, "{}", self.id),
        }
    }
}
