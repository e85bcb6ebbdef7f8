// src/cli.rs
//! Command line definitions

use clap::Parser;
use std::path::PathBuf;

/// Kept in line with the man page text in build.rs
const LONG_ABOUT: &str = "\
Reconcile installed product certificates with active package repositories.

The default dnf backend reads productid metadata from the dnf cache only. \
dnf downloads that metadata only when a plugin requests it, so without the \
product-id dnf plugin every product repository is reported as having \
unavailable metadata: no certificate is installed and none is removed for \
those repositories.";

#[derive(Parser, Debug)]
#[command(name = "productid")]
#[command(author, version)]
#[command(about = "Reconcile installed product certificates with active package repositories")]
#[command(long_about = LONG_ABOUT)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = productid::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory holding installed product certificates
    #[arg(long, value_name = "DIR")]
    pub product_dir: Option<PathBuf>,

    /// Product to repository database file
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory holding plugin hook handlers
    #[arg(long, value_name = "DIR")]
    pub hooks_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut productid::Config) {
        if let Some(dir) = &self.product_dir {
            config.product_dir = dir.clone();
        }
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Some(dir) = &self.hooks_dir {
            config.hooks_dir = dir.clone();
        }
    }
}
