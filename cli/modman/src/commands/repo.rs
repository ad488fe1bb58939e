//! Repository commands: versions, fetch, deps.

use std::path::Path;

use anyhow::{Context, Result};
use modman_repo::{DefaultTransport, RepositoryConnector, RepositorySystem, ResolutionSession};

use crate::config::{resolve_path, ModmanConfig};

/// Build a connector over the configured repositories.
pub(crate) fn connector(config: &ModmanConfig, config_dir: &Path) -> Result<RepositoryConnector> {
    let session = ResolutionSession::new(resolve_path(config_dir, &config.cache.path))
        .with_update_policy(config.update_policy()?)
        .with_offline(config.cache.offline);
    let system = RepositorySystem::new(DefaultTransport::new(config.timeout())?);

    let mut connector = RepositoryConnector::from_parts(system, session).with_group(&config.group);
    for repo in &config.repositories {
        connector
            .add_repository(&repo.id, &repo.url)
            .with_context(|| format!("configuring repository '{}'", repo.id))?;
    }
    if connector.repositories().is_empty() {
        tracing::warn!("No repositories configured in modman.toml");
    }
    Ok(connector)
}

/// Run `modman versions <module>`.
pub fn versions(config: &ModmanConfig, config_dir: &Path, module: &str) -> Result<()> {
    let versions = connector(config, config_dir)?.find_available_versions(module);
    if versions.is_empty() {
        println!("No versions of '{module}' found.");
    }
    for version in versions {
        println!("{version}");
    }
    Ok(())
}

/// Run `modman fetch <module> <version>`.
pub fn fetch(config: &ModmanConfig, config_dir: &Path, module: &str, version: &str) -> Result<()> {
    let path = connector(config, config_dir)?
        .download_artifact(module, version)
        .with_context(|| format!("fetching {module} {version}"))?;
    println!("{}", path.display());
    Ok(())
}

/// Run `modman deps <module> <version>`.
pub fn deps(config: &ModmanConfig, config_dir: &Path, module: &str, version: &str) -> Result<()> {
    let deps = connector(config, config_dir)?
        .get_dependencies(module, version)
        .with_context(|| format!("reading dependencies of {module} {version}"))?;
    if deps.is_empty() {
        println!("{module} {version} has no dependencies.");
    }
    for dep in deps {
        println!("{dep}");
    }
    Ok(())
}
