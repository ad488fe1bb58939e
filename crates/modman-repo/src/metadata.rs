//! `maven-metadata.xml` documents.
//!
//! Artifact-level metadata lists the published versions; version-level
//! metadata of a snapshot names the timestamped files of the latest build.

use serde::Deserialize;

use crate::error::Result;

/// File name of repository metadata documents.
pub const METADATA_FILE: &str = "maven-metadata.xml";

/// A parsed metadata document. Unknown elements are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(rename = "groupId", default)]
    pub group_id: Option<String>,
    #[serde(rename = "artifactId", default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Option<Versions>,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(rename = "snapshotVersions", default)]
    pub snapshot_versions: Option<SnapshotVersions>,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Versions {
    #[serde(rename = "version", default)]
    pub version: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "buildNumber", default)]
    pub build_number: Option<u32>,
    #[serde(rename = "localCopy", default)]
    pub local_copy: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotVersions {
    #[serde(rename = "snapshotVersion", default)]
    pub snapshot_version: Vec<SnapshotVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    pub value: String,
    #[serde(default)]
    pub updated: Option<String>,
}

impl Metadata {
    /// Parse a metadata document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    /// Versions listed under `versioning/versions`, in document order.
    pub fn versions(&self) -> Vec<String> {
        self.versioning
            .as_ref()
            .and_then(|v| v.versions.as_ref())
            .map(|v| v.version.iter().map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    /// The published file version of `base_version` for `extension`.
    ///
    /// Returns `None` when the metadata names no timestamped build, in which
    /// case the plain `-SNAPSHOT` file name applies.
    pub fn snapshot_file_version(&self, base_version: &str, extension: &str) -> Option<String> {
        let versioning = self.versioning.as_ref()?;

        let listed = versioning.snapshot_versions.as_ref().and_then(|sv| {
            sv.snapshot_version
                .iter()
                .find(|s| {
                    s.classifier.as_deref().unwrap_or("").is_empty()
                        && s.extension.as_deref() == Some(extension)
                })
                .map(|s| s.value.trim().to_string())
        });
        if listed.is_some() {
            return listed;
        }

        let snapshot = versioning.snapshot.as_ref()?;
        if snapshot.local_copy == Some(true) {
            return None;
        }
        let timestamp = snapshot.timestamp.as_deref()?.trim();
        let build = snapshot.build_number?;
        let prefix = base_version.strip_suffix("SNAPSHOT")?;
        Some(format!("{prefix}{timestamp}-{build}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT_LEVEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>org.terasology.modules</groupId>
  <artifactId>Sample</artifactId>
  <versioning>
    <latest>0.1.0-SNAPSHOT</latest>
    <versions>
      <version>0.1.0-SNAPSHOT</version>
    </versions>
    <lastUpdated>20140601101010</lastUpdated>
  </versioning>
</metadata>"#;

    const VERSION_LEVEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata modelVersion="1.1.0">
  <groupId>org.terasology.modules</groupId>
  <artifactId>Sample</artifactId>
  <version>0.1.0-SNAPSHOT</version>
  <versioning>
    <snapshot>
      <timestamp>20140601.101010</timestamp>
      <buildNumber>2</buildNumber>
    </snapshot>
    <lastUpdated>20140601101010</lastUpdated>
    <snapshotVersions>
      <snapshotVersion>
        <extension>jar</extension>
        <value>0.1.0-20140601.101010-2</value>
        <updated>20140601101010</updated>
      </snapshotVersion>
      <snapshotVersion>
        <classifier>sources</classifier>
        <extension>jar</extension>
        <value>0.1.0-20140601.101010-2</value>
      </snapshotVersion>
      <snapshotVersion>
        <extension>pom</extension>
        <value>0.1.0-20140601.101010-1</value>
      </snapshotVersion>
    </snapshotVersions>
  </versioning>
</metadata>"#;

    #[test]
    fn lists_versions() {
        let md = Metadata::parse(ARTIFACT_LEVEL.as_bytes()).unwrap();
        assert_eq!(md.artifact_id.as_deref(), Some("Sample"));
        assert_eq!(md.versions(), vec!["0.1.0-SNAPSHOT"]);
    }

    #[test]
    fn snapshot_versions_pick_by_extension() {
        let md = Metadata::parse(VERSION_LEVEL.as_bytes()).unwrap();
        assert_eq!(
            md.snapshot_file_version("0.1.0-SNAPSHOT", "jar").as_deref(),
            Some("0.1.0-20140601.101010-2")
        );
        assert_eq!(
            md.snapshot_file_version("0.1.0-SNAPSHOT", "pom").as_deref(),
            Some("0.1.0-20140601.101010-1")
        );
    }

    #[test]
    fn legacy_snapshot_element_is_used() {
        let xml = r#"<metadata><versioning><snapshot>
            <timestamp>20140101.000000</timestamp><buildNumber>7</buildNumber>
        </snapshot></versioning></metadata>"#;
        let md = Metadata::parse(xml.as_bytes()).unwrap();
        assert_eq!(
            md.snapshot_file_version("1.0-SNAPSHOT", "jar").as_deref(),
            Some("1.0-20140101.000000-7")
        );
    }

    #[test]
    fn no_snapshot_info_means_plain_name() {
        let md = Metadata::parse(ARTIFACT_LEVEL.as_bytes()).unwrap();
        assert!(md.snapshot_file_version("0.1.0-SNAPSHOT", "jar").is_none());

        let local = r#"<metadata><versioning>
            <snapshot><localCopy>true</localCopy></snapshot>
        </versioning></metadata>"#;
        let md = Metadata::parse(local.as_bytes()).unwrap();
        assert!(md.snapshot_file_version("0.1.0-SNAPSHOT", "jar").is_none());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(Metadata::parse(b"<metadata><versioning>").is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = Metadata::parse(b"<metadata><version>1.0\xff</version></metadata>").unwrap_err();
        assert!(matches!(err, crate::error::RepoError::Utf8(_)));
    }
}
