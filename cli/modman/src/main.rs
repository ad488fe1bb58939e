//! modman: browse the module index and fetch module artifacts.

mod commands;
mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};

use config::{ModmanConfig, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "modman", version, about = "Terasology module manager")]
struct Cli {
    /// Configuration file (default: nearest modman.toml upward)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a template modman.toml in the current directory
    Init,
    /// Update the module index and rebuild the catalog
    Sync,
    /// List catalog entries
    List {
        /// Only modules whose id or name contains this text
        query: Option<String>,
    },
    /// Show one module descriptor
    Show {
        /// Module id
        id: String,
    },
    /// List versions available in the configured repositories
    Versions {
        /// Module id
        module: String,
    },
    /// Download a module artifact into the local cache
    Fetch {
        /// Module id
        module: String,
        /// Exact version
        version: String,
    },
    /// Show the direct dependencies of a module version
    Deps {
        /// Module id
        module: String,
        /// Exact version
        version: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: {e:#}");
    }

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let load = || load_config(&cwd, cli.config.as_deref());

    match cli.command {
        Commands::Init => commands::init::run(&cwd),
        Commands::Sync => {
            let (config, dir) = load()?;
            commands::index::sync(&config, &dir)
        }
        Commands::List { query } => {
            let (config, dir) = load()?;
            commands::index::list(&config, &dir, query.as_deref())
        }
        Commands::Show { id } => {
            let (config, dir) = load()?;
            commands::index::show(&config, &dir, &id)
        }
        Commands::Versions { module } => {
            let (config, dir) = load()?;
            commands::repo::versions(&config, &dir, &module)
        }
        Commands::Fetch { module, version } => {
            let (config, dir) = load()?;
            commands::repo::fetch(&config, &dir, &module, &version)
        }
        Commands::Deps { module, version } => {
            let (config, dir) = load()?;
            commands::repo::deps(&config, &dir, &module, &version)
        }
    }
}

/// Load the configuration named on the command line, or the nearest one
/// found from `cwd` upward.
fn load_config(cwd: &Path, explicit: Option<&Path>) -> anyhow::Result<(ModmanConfig, PathBuf)> {
    if let Some(path) = explicit {
        let path = config::resolve_path(cwd, path);
        let config = ModmanConfig::load(&path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("{} has no parent directory", path.display()))?;
        return Ok((config, dir));
    }
    match ModmanConfig::find_and_load(cwd)? {
        Some(found) => Ok(found),
        None => anyhow::bail!("no {CONFIG_FILE} found (run `modman init` first)"),
    }
}
