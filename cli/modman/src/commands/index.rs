//! Catalog commands: sync, list, show.

use std::path::Path;

use anyhow::{Context, Result};
use modman_index::{
    DependencySpec, DocumentOrigin, HttpDocumentFetcher, IndexSynchronizer, ModuleDescriptor,
    TreeOrigin,
};

use crate::config::{resolve_path, IndexKind, ModmanConfig};

/// Open the configured index, loading whatever is already mirrored locally.
pub(crate) fn open(config: &ModmanConfig, config_dir: &Path) -> Result<IndexSynchronizer> {
    let index = config
        .index
        .as_ref()
        .context("no [index] section in modman.toml")?;
    let local = resolve_path(config_dir, &index.path);

    let synchronizer = match index.kind {
        IndexKind::Tree => {
            let mut origin = TreeOrigin::new(&local, &index.url)?;
            if let Some(branch) = &index.branch {
                origin = origin.with_branch(branch);
            }
            IndexSynchronizer::open(origin)
        }
        IndexKind::Document => {
            let fetcher = HttpDocumentFetcher::with_timeout(config.timeout())?;
            IndexSynchronizer::open(DocumentOrigin::with_fetcher(&local, &index.url, fetcher))
        }
    };
    synchronizer.with_context(|| format!("opening module index at {}", local.display()))
}

/// Run `modman sync`.
pub fn sync(config: &ModmanConfig, config_dir: &Path) -> Result<()> {
    let synchronizer = open(config, config_dir)?;
    let sync = synchronizer.refresh().context("refreshing module index")?;

    if sync.changed {
        println!("Updated index from {}", sync.origin);
    } else {
        println!("Index at {} is up to date", sync.origin);
    }
    println!(
        "  {} modules parsed, {} skipped, {} replaced",
        sync.report.parsed,
        sync.report.skipped.len(),
        sync.report.replaced.len()
    );
    for skipped in &sync.report.skipped {
        println!("  skipped {}: {}", skipped.entry, skipped.reason);
    }
    Ok(())
}

/// Run `modman list [query]`.
pub fn list(config: &ModmanConfig, config_dir: &Path, query: Option<&str>) -> Result<()> {
    let synchronizer = open(config, config_dir)?;
    let modules = match query {
        Some(query) => synchronizer.catalog().search(query),
        None => synchronizer.get_all().sorted(),
    };

    if modules.is_empty() {
        if synchronizer.catalog().is_empty() {
            println!("The module catalog is empty (run `modman sync` first).");
        } else {
            println!("No modules match.");
        }
        return Ok(());
    }

    for module in &modules {
        println!(
            "{:<32} {:<12} {}",
            module.id,
            module.version.as_deref().unwrap_or("-"),
            module.name()
        );
    }
    Ok(())
}

/// Run `modman show <id>`.
pub fn show(config: &ModmanConfig, config_dir: &Path, id: &str) -> Result<()> {
    let synchronizer = open(config, config_dir)?;
    let module = synchronizer
        .get_by_id(id)
        .with_context(|| format!("module '{id}' is not in the catalog"))?;
    print!("{}", describe(&module));
    Ok(())
}

fn describe(module: &ModuleDescriptor) -> String {
    let mut out = format!("{} ({})\n", module.name(), module.id);
    if let Some(version) = &module.version {
        out.push_str(&format!("  version:     {version}\n"));
    }
    if let Some(author) = &module.author {
        out.push_str(&format!("  author:      {author}\n"));
    }
    if let Some(text) = module.description.as_ref().and_then(|d| d.text()) {
        out.push_str(&format!("  description: {text}\n"));
    }
    if !module.dependencies.is_empty() {
        out.push_str("  dependencies:\n");
        for dep in &module.dependencies {
            match dep {
                DependencySpec::Id(id) => out.push_str(&format!("    {id}\n")),
                DependencySpec::Detailed(info) => {
                    let min = info.min_version.as_deref().unwrap_or("*");
                    let max = info.max_version.as_deref().unwrap_or("*");
                    let optional = if info.optional { " (optional)" } else { "" };
                    out.push_str(&format!("    {} [{min}, {max}){optional}\n", info.id));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_lists_dependencies() {
        let module = ModuleDescriptor::from_slice(
            br#"{
                "id": "CopperAndBronze",
                "version": "0.1.0",
                "displayName": {"en": "Copper and Bronze"},
                "author": "Terasology",
                "dependencies": ["engine", {"id": "Core", "minVersion": "1.0.0", "optional": true}]
            }"#,
            "module.txt",
        )
        .unwrap();

        let text = describe(&module);
        assert!(text.starts_with("Copper and Bronze (CopperAndBronze)"));
        assert!(text.contains("    engine\n"));
        assert!(text.contains("    Core [1.0.0, *) (optional)\n"));
    }
}
