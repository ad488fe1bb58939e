//! `modman init`: write a template configuration.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::{ModmanConfig, CONFIG_FILE};

/// Create `modman.toml` in `dir`.
pub fn run(dir: &Path) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    fs::write(&path, ModmanConfig::template())
        .with_context(|| format!("writing {}", path.display()))?;

    println!("Created {}", path.display());
    Ok(())
}
