// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use productid::{Config, DnfBackend, HookDirectory, ProductDatabase, ProductDirectory, ProductManager};
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    cli.apply(&mut config);

    let backend = DnfBackend::new(&config.backend);
    let hooks = HookDirectory::new(&config.hooks_dir).with_timeout(config.hook_timeout());
    let mut manager = ProductManager::new(
        ProductDirectory::new(&config.product_dir),
        ProductDatabase::new(&config.database_path),
        hooks,
    );

    let report = manager
        .update(&backend)
        .context("Product certificate reconciliation failed")?;

    for repo in &report.metadata_errors {
        warn!("Product metadata for repository {} could not be loaded", repo);
    }
    if !report.persistence_failures.is_empty() {
        warn!(
            "{} product database operation(s) failed; mapping may be stale",
            report.persistence_failures.len()
        );
    }
    info!(
        "Installed {} and removed {} product certificate(s) (removal: {:?})",
        report.installed.len(),
        report.removed.len(),
        report.removal
    );

    Ok(())
}
