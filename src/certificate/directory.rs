// src/certificate/directory.rs

//! Access to the directory of installed product certificates
//!
//! Listings are cached until [`ProductStore::refresh`] is called. Writing or
//! deleting a certificate does not invalidate the cache on its own; callers
//! must refresh before making any further listing based decision.

use super::ProductCertificate;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of installed product certificates
pub const DEFAULT_PRODUCT_DIR: &str = "/etc/pki/product";

/// Certificate file extension
const CERT_EXTENSION: &str = "pem";

/// Storage of installed product certificates
pub trait ProductStore {
    /// All certificates currently installed
    fn list(&mut self) -> Result<Vec<ProductCertificate>>;

    /// Installed certificate for a product, if any
    fn find_by_product(&mut self, product_id: &str) -> Result<Option<ProductCertificate>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|cert| cert.product_id() == product_id))
    }

    /// Absolute path of a file inside the store
    fn abspath(&self, file_name: &str) -> PathBuf;

    /// Persist a certificate's encoded form, overwriting any existing file
    fn write(&mut self, cert: &ProductCertificate, path: &Path) -> Result<()>;

    /// Remove a certificate's backing file
    fn delete(&mut self, cert: &ProductCertificate) -> Result<()>;

    /// Drop any cached listing
    fn refresh(&mut self);
}

/// File name a product certificate is installed under
pub fn cert_file_name(product_id: &str) -> String {
    format!("{}.{}", product_id, CERT_EXTENSION)
}

/// Product certificates stored as `<id>.pem` files in a directory
#[derive(Debug)]
pub struct ProductDirectory {
    path: PathBuf,
    listing: Option<Vec<ProductCertificate>>,
}

impl ProductDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            listing: None,
        }
    }

    /// Directory backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan(&self) -> Result<Vec<ProductCertificate>> {
        if !self.path.exists() {
            debug!("Product directory {} does not exist", self.path.display());
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| p.extension().is_some_and(|ext| ext == CERT_EXTENSION))
            .collect();
        paths.sort();

        let mut certs = Vec::with_capacity(paths.len());
        for path in paths {
            match ProductCertificate::read(&path) {
                Ok(cert) => certs.push(cert),
                Err(e) => warn!("Skipping unreadable product certificate: {}", e),
            }
        }

        debug!(
            "Found {} product certificate(s) in {}",
            certs.len(),
            self.path.display()
        );
        Ok(certs)
    }
}

impl ProductStore for ProductDirectory {
    fn list(&mut self) -> Result<Vec<ProductCertificate>> {
        if let Some(listing) = &self.listing {
            return Ok(listing.clone());
        }
        let listing = self.scan()?;
        self.listing = Some(listing.clone());
        Ok(listing)
    }

    fn abspath(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    fn write(&mut self, cert: &ProductCertificate, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, cert.pem())?;
        Ok(())
    }

    fn delete(&mut self, cert: &ProductCertificate) -> Result<()> {
        let path = cert
            .path()
            .ok_or_else(|| Error::NotPersisted(cert.product_id().to_string()))?;
        fs::remove_file(path)?;
        Ok(())
    }

    fn refresh(&mut self) {
        self.listing = None;
    }
}
