//! Command-line interface for the lupe file inspection engine.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use lupe::{Engine, EngineConfig, Inspection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lupe", version, about = "Inspect files with pluggable metadata extractors")]
struct Cli {
    /// Path to a lupe.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect a file and print its metadata as JSON
    Inspect {
        path: PathBuf,

        /// Re-extract even when a cached result exists
        #[arg(long)]
        force_refresh: bool,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List registered inspectors and failed discovery candidates
    Inspectors,
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print cache location and total size
    Stats,
    /// Delete cache entries
    Clear {
        /// Only delete entries older than this many days
        #[arg(long)]
        older_than_days: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "resolved engine configuration");
    let engine = Engine::new(config).context("failed to initialise inspection engine")?;

    let outcome = run(&engine, cli.command);
    engine.shutdown(true);
    outcome
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    match explicit {
        Some(path) => {
            EngineConfig::from_toml_file(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(EngineConfig::discover()?.unwrap_or_default()),
    }
}

fn run(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Inspect {
            path,
            force_refresh,
            pretty,
        } => inspect(engine, &path, force_refresh, pretty),
        Command::Inspectors => list_inspectors(engine),
        Command::Cache { command } => cache_command(engine, command),
    }
}

fn inspect(engine: &Engine, path: &Path, force_refresh: bool, pretty: bool) -> Result<()> {
    let outcome = engine.inspect(path, force_refresh)?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{rendered}");

    if matches!(outcome, Inspection::NotFound) {
        anyhow::bail!("no such file: {}", path.display());
    }
    Ok(())
}

fn list_inspectors(engine: &Engine) -> Result<()> {
    let registry = engine.registry();
    println!("{}", serde_json::to_string_pretty(&registry.inspector_info())?);

    for (candidate, error) in registry.failed() {
        eprintln!("failed to load '{candidate}': {error}");
    }
    Ok(())
}

fn cache_command(engine: &Engine, command: CacheCommand) -> Result<()> {
    let Some(cache) = engine.cache() else {
        println!("caching is disabled");
        return Ok(());
    };

    match command {
        CacheCommand::Stats => {
            let size = cache.size();
            println!("root:  {}", cache.root().display());
            println!("size:  {size} bytes ({:.1} MB)", size as f64 / (1024.0 * 1024.0));
        }
        CacheCommand::Clear { older_than_days } => {
            let removed = cache.clear(older_than_days.map(|days| Duration::from_secs(days * 24 * 3600)));
            println!("removed {removed} cache entries");
        }
    }
    Ok(())
}
