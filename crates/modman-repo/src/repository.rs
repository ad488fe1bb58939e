//! Remote repository definitions.

use std::fmt;

use reqwest::Url;

use crate::error::{RepoError, Result};

/// Repository layout understood by the resolver.
pub const DEFAULT_LAYOUT: &str = "default";

/// A configured remote artifact repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    id: String,
    url: Url,
    layout: String,
}

impl RemoteRepository {
    /// Create a repository with the default layout.
    ///
    /// Only checks that `url` is well-formed and absolute.
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self> {
        let invalid = |detail: String| RepoError::InvalidUrl {
            url: url.to_string(),
            detail,
        };
        let mut parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot be used as a base".to_string()));
        }
        // Base URLs are directories; without the slash `join` would drop
        // the last path segment.
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        Ok(RemoteRepository {
            id: id.into(),
            url: parsed,
            layout: DEFAULT_LAYOUT.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Absolute URL of a repository-relative resource path.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.url.join(path).map_err(|e| RepoError::InvalidUrl {
            url: format!("{}{}", self.url, path),
            detail: e.to_string(),
        })
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.url, self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let base = "http://artifactory.terasology.org/artifactory/repo";
        let repo = RemoteRepository::new("terasology", base).unwrap();
        assert_eq!(
            repo.url().as_str(),
            "http://artifactory.terasology.org/artifactory/repo/"
        );
        let url = repo.resolve("org/terasology/modules/Sample/maven-metadata.xml").unwrap();
        assert_eq!(
            url.as_str(),
            format!("{base}/org/terasology/modules/Sample/maven-metadata.xml")
        );
        assert_eq!(repo.layout(), DEFAULT_LAYOUT);
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for bad in ["not a url", "relative/path", "mailto:someone@example.com"] {
            assert!(
                matches!(RemoteRepository::new("bad", bad), Err(RepoError::InvalidUrl { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn file_urls_are_accepted() {
        let repo = RemoteRepository::new("local", "file:///tmp/repo").unwrap();
        assert_eq!(repo.resolve("a/b.xml").unwrap().as_str(), "file:///tmp/repo/a/b.xml");
    }
}
