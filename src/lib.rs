// src/lib.rs

//! productid - product certificate reconciliation
//!
//! Keeps the product identity certificates installed on a host in line with
//! the package repositories that actually provide installed packages. Run
//! after every package transaction:
//!
//! - Enabled repositories publishing `productid` metadata get their product
//!   certificate installed once a package from them is installed
//! - Certificates whose repository no longer supplies any installed package
//!   are removed
//! - The product to repository mapping survives restarts in a small JSON
//!   database
//!
//! # Architecture
//!
//! - [`certificate`]: certificate decoding and the certificate directory
//! - [`database`]: product to repository database
//! - [`backend`]: package backend interface and the default dnf backend
//! - [`inspector`]: enabled and active repository discovery
//! - [`manager`]: the reconciliation engine
//! - [`hooks`]: plugin hook dispatch

pub mod backend;
pub mod certificate;
pub mod compression;
pub mod config;
pub mod database;
mod error;
pub mod hooks;
pub mod inspector;
pub mod manager;

pub use backend::{DnfBackend, PackageBackend, PackageRecord};
pub use certificate::{Product, ProductCertificate, ProductDirectory, ProductStore, ProductVariant};
pub use config::{BackendConfig, Config};
pub use database::ProductDatabase;
pub use error::{Error, Result};
pub use hooks::{HookDirectory, HookEvent, HookResults, NoopHooks, PluginHooks};
pub use inspector::{EnabledRepo, EnabledRepos, MetadataErrors, RepoInspector};
pub use manager::{ProductManager, RemovalDecision, UpdateReport};
