// src/manager.rs

//! Product certificate reconciliation
//!
//! [`ProductManager::update`] converges the installed product certificates
//! with the repositories that actually supply installed packages:
//!
//! 1. Certificates of active repositories that are not installed yet are
//!    written and recorded in the [`ProductDatabase`].
//! 2. Certificates whose recorded repository is no longer active are
//!    deleted, unless the repository's metadata was unreadable this run,
//!    the backend cannot attribute packages to repositories, or either
//!    repository set came back empty.
//!
//! Database persistence failures are logged and reported, never fatal.
//! Certificate directory failures abort the run.

use crate::backend::PackageBackend;
use crate::certificate::directory::cert_file_name;
use crate::certificate::{ProductCertificate, ProductStore, ProductVariant};
use crate::database::ProductDatabase;
use crate::error::Result;
use crate::hooks::{HookEvent, PluginHooks};
use crate::inspector::{EnabledRepo, EnabledRepos, MetadataErrors, RepoInspector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Whether the removal phase ran, and why not if it did not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalDecision {
    /// Stale certificates were looked for
    #[default]
    Ran,
    /// The backend does not record which repository a package came from
    SkippedNoProvenance,
    /// No enabled product repositories or no active repositories
    SkippedEmptyRepoSets,
}

/// What a reconciliation run did
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Newly installed certificates
    pub installed: Vec<ProductCertificate>,
    /// Deleted certificates, including superseded Desktop certificates
    pub removed: Vec<ProductCertificate>,
    /// Repositories whose product metadata could not be loaded
    pub metadata_errors: MetadataErrors,
    pub removal: RemovalDecision,
    /// Database reads and writes that failed
    pub persistence_failures: Vec<String>,
}

/// Reconciles installed product certificates with repository activity
pub struct ProductManager<S: ProductStore, H: PluginHooks> {
    store: S,
    db: ProductDatabase,
    hooks: H,
    persistence_failures: Vec<String>,
}

impl<S: ProductStore, H: PluginHooks> ProductManager<S, H> {
    /// Create a manager, creating and loading the database
    pub fn new(store: S, db: ProductDatabase, hooks: H) -> Self {
        let mut manager = Self {
            store,
            db,
            hooks,
            persistence_failures: Vec::new(),
        };

        if let Err(e) = manager.db.create() {
            manager.persistence_failure("create", e);
        }
        if let Err(e) = manager.db.read() {
            manager.persistence_failure("read", e);
        }
        manager
    }

    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn database(&self) -> &ProductDatabase {
        &self.db
    }

    /// Run one full reconciliation against the package backend
    pub fn update<B: PackageBackend + ?Sized>(&mut self, backend: &B) -> Result<UpdateReport> {
        let inspector = RepoInspector::new(backend);
        let EnabledRepos {
            repos: enabled,
            metadata_errors,
        } = inspector.enabled()?;
        let active = inspector.active()?;

        let mut report = UpdateReport::default();

        if !backend.tracks_repo_provenance() {
            info!("Package backend does not track package repositories, not removing product certificates");
            report.removal = RemovalDecision::SkippedNoProvenance;
        } else if enabled.is_empty() || active.is_empty() {
            // An empty active set next to enabled product repos is far more
            // likely a failed backend query than a system with no packages.
            info!(
                "Skipping product certificate removal ({} enabled, {} active repositories)",
                enabled.len(),
                active.len()
            );
            report.removal = RemovalDecision::SkippedEmptyRepoSets;
        } else {
            report.removed = self.update_removed(&active, &metadata_errors)?;
        }

        let (installed, superseded) = self.install_certificates(&enabled, &active)?;
        report.installed = installed;
        report.removed.extend(superseded);
        report.metadata_errors = metadata_errors;
        report.persistence_failures = std::mem::take(&mut self.persistence_failures);
        Ok(report)
    }

    /// Install certificates for active repositories
    ///
    /// Returns the newly installed certificates. The
    /// `post_product_id_install` hook is notified with the list, even when
    /// it is empty.
    pub fn update_installed(
        &mut self,
        enabled: &[EnabledRepo],
        active: &HashSet<String>,
    ) -> Result<Vec<ProductCertificate>> {
        self.install_certificates(enabled, active)
            .map(|(installed, _)| installed)
    }

    fn install_certificates(
        &mut self,
        enabled: &[EnabledRepo],
        active: &HashSet<String>,
    ) -> Result<(Vec<ProductCertificate>, Vec<ProductCertificate>)> {
        debug!("Updating installed certificates");
        let mut installed = Vec::new();
        let mut superseded = Vec::new();

        for EnabledRepo { cert, repo_id } in enabled {
            let product = cert.product();
            debug!("product cert: {} repo: {}", product.id, repo_id);

            if !active.contains(repo_id) {
                continue;
            }

            match product.variant() {
                ProductVariant::Workstation => {
                    superseded.extend(self.remove_desktop_certs()?);
                }
                ProductVariant::Desktop if self.workstation_installed()? => {
                    info!("Skipping obsolete Desktop cert for product {}", product.id);
                    continue;
                }
                _ => {}
            }

            if self.store.find_by_product(&product.id)?.is_some() {
                continue;
            }

            let path = self.store.abspath(&cert_file_name(&product.id));
            self.store.write(cert, &path)?;
            self.store.refresh();
            info!("Installed product cert: {} {}", product.name, path.display());

            self.db.add(&product.id, repo_id);
            self.save_database();
            installed.push(cert.clone().with_path(path));
        }

        let event = HookEvent::PostProductIdInstall {
            product_list: &installed,
        };
        debug!("Running {} hook", event.name());
        match self.hooks.notify(&event) {
            Ok(results) if !results.all_succeeded() => {
                warn!("{} of the {} handlers failed", results.failed, event.name());
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to run {} hook: {}", event.name(), e),
        }

        Ok((installed, superseded))
    }

    /// Delete every installed Desktop certificate; Workstation supersedes it
    fn remove_desktop_certs(&mut self) -> Result<Vec<ProductCertificate>> {
        let mut removed = Vec::new();
        for cert in self.store.list()? {
            if cert.product().variant() != ProductVariant::Desktop {
                continue;
            }
            info!(
                "Removing obsolete Desktop cert: {}",
                cert.path().map(|p| p.display().to_string()).unwrap_or_default()
            );
            self.store.delete(&cert)?;
            self.store.refresh();
            self.db.delete(cert.product_id());
            self.save_database();
            removed.push(cert);
        }
        Ok(removed)
    }

    fn workstation_installed(&mut self) -> Result<bool> {
        Ok(self
            .store
            .list()?
            .iter()
            .any(|cert| cert.product().variant() == ProductVariant::Workstation))
    }

    /// Delete certificates whose source repository is no longer active
    ///
    /// Certificates without a recorded repository are never touched, nor
    /// are those whose repository had metadata errors this run.
    pub fn update_removed(
        &mut self,
        active: &HashSet<String>,
        metadata_errors: &MetadataErrors,
    ) -> Result<Vec<ProductCertificate>> {
        let mut removed = Vec::new();

        for cert in self.store.list()? {
            let product = cert.product();
            // TODO: distinguish certificates that were never tracked from ones
            // deliberately left untracked once the database records both.
            let Some(repo) = self.db.find_repo(&product.id) else {
                continue;
            };

            if metadata_errors.contains(repo) {
                info!(
                    "{} has meta-data errors. Not deleting product cert {}.",
                    repo, product.id
                );
                continue;
            }
            if active.contains(repo) {
                continue;
            }

            info!(
                "product cert {} for {} is being deleted",
                product.id, product.name
            );
            self.store.delete(&cert)?;
            self.store.refresh();
            self.db.delete(&product.id);
            self.save_database();
            removed.push(cert);
        }

        Ok(removed)
    }

    fn save_database(&mut self) {
        if let Err(e) = self.db.write() {
            self.persistence_failure("write", e);
        }
    }

    fn persistence_failure(&mut self, action: &str, e: crate::error::Error) {
        warn!(
            "Could not {} product database {}: {}",
            action,
            self.db.path().display(),
            e
        );
        self.persistence_failures.push(format!("{}: {}", action, e));
    }
}
