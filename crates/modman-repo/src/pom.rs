//! Artifact descriptors read from `.pom` files.
//!
//! Only what is needed to list direct dependencies is modelled: the
//! project coordinates (with parent inheritance), `<properties>`, and
//! `<dependencies>`. No parent POMs or BOMs are fetched.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Default, Deserialize)]
struct RawPom {
    #[serde(rename = "groupId", default)]
    group_id: Option<String>,
    #[serde(rename = "artifactId", default)]
    artifact_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    parent: Option<RawParent>,
    #[serde(default)]
    properties: Option<HashMap<String, String>>,
    #[serde(default)]
    dependencies: Option<RawDependencies>,
}

#[derive(Debug, Default, Deserialize)]
struct RawParent {
    #[serde(rename = "groupId", default)]
    group_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDependencies {
    #[serde(default)]
    dependency: Vec<RawDependency>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDependency {
    #[serde(rename = "groupId", default)]
    group_id: Option<String>,
    #[serde(rename = "artifactId")]
    artifact_id: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    optional: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// One declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    /// `compile` when not declared.
    pub scope: String,
    pub optional: bool,
    /// Packaging type, `jar` when not declared.
    pub kind: String,
}

/// The parts of a POM the resolver uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pom {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub dependencies: Vec<PomDependency>,
}

impl Pom {
    /// Parse a POM and interpolate `${...}` references.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        let raw: RawPom = quick_xml::de::from_str(text)?;

        let parent = raw.parent.unwrap_or_default();
        let group_id = raw.group_id.or(parent.group_id).unwrap_or_default();
        let version = raw.version.or(parent.version).unwrap_or_default();
        let artifact_id = raw.artifact_id.unwrap_or_default();

        let mut props = raw.properties.unwrap_or_default();
        for prefix in ["project", "pom"] {
            props.insert(format!("{prefix}.groupId"), group_id.clone());
            props.insert(format!("{prefix}.artifactId"), artifact_id.clone());
            props.insert(format!("{prefix}.version"), version.clone());
        }
        props.insert("version".to_string(), version.clone());

        let dependencies = raw
            .dependencies
            .map(|d| d.dependency)
            .unwrap_or_default()
            .into_iter()
            .map(|d| PomDependency {
                group_id: interpolate(d.group_id.as_deref().unwrap_or(""), &props),
                artifact_id: interpolate(d.artifact_id.trim(), &props),
                version: d.version.as_deref().map(|v| interpolate(v.trim(), &props)),
                scope: d
                    .scope
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| "compile".to_string()),
                optional: d
                    .optional
                    .map(|o| o.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                kind: d
                    .kind
                    .map(|k| k.trim().to_string())
                    .unwrap_or_else(|| "jar".to_string()),
            })
            .collect();

        Ok(Pom {
            group_id,
            artifact_id,
            version,
            dependencies,
        })
    }
}

/// Replace `${name}` references found in `props`; unknown ones stay as-is.
fn interpolate(value: &str, props: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value.trim();
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match props.get(name) {
                    Some(v) => out.push_str(v.trim()),
                    None => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
