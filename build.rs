// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
Reconcile installed product certificates with active package repositories.

The default dnf backend reads productid metadata from the dnf cache only. \
dnf downloads that metadata only when a plugin requests it, so without the \
product-id dnf plugin every product repository is reported as having \
unavailable metadata: no certificate is installed and none is removed for \
those repositories.";

fn build_cli() -> Command {
    Command::new("productid")
        .version(env!("CARGO_PKG_VERSION"))
        .author("productid Contributors")
        .about("Reconcile installed product certificates with active package repositories")
        .long_about(LONG_ABOUT)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("/etc/productid/productid.toml")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("product_dir")
                .long("product-dir")
                .value_name("DIR")
                .help("Directory holding installed product certificates"),
        )
        .arg(
            Arg::new("database")
                .long("database")
                .value_name("PATH")
                .help("Product to repository database file"),
        )
        .arg(
            Arg::new("hooks_dir")
                .long("hooks-dir")
                .value_name("DIR")
                .help("Directory holding plugin hook handlers"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("productid.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
