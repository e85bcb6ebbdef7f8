// src/inspector.rs

//! Repository inspection
//!
//! Answers two questions per run: which enabled repositories declare a
//! product (and with which certificate), and which repositories supplied at
//! least one installed package.

use crate::backend::PackageBackend;
use crate::certificate::ProductCertificate;
use crate::compression;
use crate::error::Result;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Name of the repository metadata artifact carrying the product certificate
pub const PRODUCTID_METADATA: &str = "productid";

/// Repositories whose product metadata could not be trusted this run
pub type MetadataErrors = BTreeSet<String>;

/// An enabled repository paired with the product certificate it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledRepo {
    pub cert: ProductCertificate,
    pub repo_id: String,
}

/// Result of scanning the enabled repositories
#[derive(Debug, Default)]
pub struct EnabledRepos {
    pub repos: Vec<EnabledRepo>,
    pub metadata_errors: MetadataErrors,
}

/// Queries the package backend for repository state
pub struct RepoInspector<'a, B: PackageBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: PackageBackend + ?Sized> RepoInspector<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Enabled repositories that publish a product certificate
    ///
    /// A repository whose metadata cannot be retrieved or decoded is left
    /// out and recorded in `metadata_errors`; it never fails the scan.
    pub fn enabled(&self) -> Result<EnabledRepos> {
        let mut result = EnabledRepos::default();

        for repo_id in self.backend.enabled_repos()? {
            match self.product_cert(&repo_id) {
                Ok(Some(cert)) => {
                    debug!("Repository {} declares product {}", repo_id, cert.product_id());
                    result.repos.push(EnabledRepo { cert, repo_id });
                }
                Ok(None) => debug!("Repository {} has no productid metadata", repo_id),
                Err(e) => {
                    warn!("Error loading productid metadata for {}: {}", repo_id, e);
                    result.metadata_errors.insert(repo_id);
                }
            }
        }

        Ok(result)
    }

    fn product_cert(&self, repo_id: &str) -> Result<Option<ProductCertificate>> {
        let Some(path) = self.backend.retrieve_metadata(repo_id, PRODUCTID_METADATA)? else {
            return Ok(None);
        };
        let pem = compression::read_to_string(&path)?;
        ProductCertificate::from_pem(&pem).map(Some)
    }

    /// Repositories that supplied at least one installed package
    ///
    /// A package offered by several repositories marks all of them active.
    pub fn active(&self) -> Result<HashSet<String>> {
        let installed: HashSet<(String, String)> = self
            .backend
            .installed_packages()?
            .into_iter()
            .map(|p| (p.name, p.arch))
            .collect();

        let mut active = HashSet::new();
        for package in self.backend.available_packages()? {
            if !installed.contains(&(package.name.clone(), package.arch.clone())) {
                continue;
            }
            if let Some(repo) = package.source_repo() {
                active.insert(repo.to_string());
            }
        }

        debug!("{} active repositories", active.len());
        Ok(active)
    }
}
