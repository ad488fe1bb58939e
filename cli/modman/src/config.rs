//! `modman.toml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use modman_repo::{UpdatePolicy, DEFAULT_GROUP};
use serde::{Deserialize, Serialize};

/// Configuration file name.
pub const CONFIG_FILE: &str = "modman.toml";

/// The top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModmanConfig {
    /// Coordinate group for module artifacts.
    #[serde(default = "default_group")]
    pub group: String,
    /// Module index source. Required by the catalog commands only.
    #[serde(default)]
    pub index: Option<IndexConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    /// Remote repositories, tried in order.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

/// How the module index is published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// A git repository of `modules/<id>/module.txt` files.
    #[default]
    Tree,
    /// One JSON document keyed by module id.
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub kind: IndexKind,
    pub url: String,
    /// Local mirror location.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Branch to follow (tree indexes).
    #[serde(default)]
    pub branch: Option<String>,
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".modman/index")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// `always`, `never`, `daily` or `interval:<minutes>`.
    #[serde(default = "default_update_policy")]
    pub update_policy: String,
    #[serde(default)]
    pub offline: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            path: default_cache_path(),
            update_policy: default_update_policy(),
            offline: false,
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".modman/repository")
}

fn default_update_policy() -> String {
    UpdatePolicy::default().to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Request timeout; none when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    pub url: String,
}

impl ModmanConfig {
    /// Search upward from `start_dir` for a `modman.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Parse a specific configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing modman.toml")
    }

    pub fn update_policy(&self) -> Result<UpdatePolicy> {
        self.cache
            .update_policy
            .parse()
            .context("reading [cache] update-policy")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.network.timeout_secs.map(Duration::from_secs)
    }

    /// Generate the default template for `modman init`.
    pub fn template() -> String {
        format!(
            r#"group = "{DEFAULT_GROUP}"

[index]
kind = "tree"
url = "https://github.com/Terasology/Index.git"
path = ".modman/index"
branch = "master"

[cache]
path = ".modman/repository"
update-policy = "daily"
offline = false

[network]
# timeout-secs = 30

[[repositories]]
id = "terasology"
url = "http://artifactory.terasology.org/artifactory/repo"
"#
        )
    }
}

/// Resolve `path` against the configuration directory unless absolute.
pub fn resolve_path(config_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}
