// tests/common/mod.rs

//! Shared test utilities: certificate fixtures, an in-memory package backend
//! and a recording hook receiver.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use productid::certificate::{DESKTOP_NAME, DESKTOP_TAG, WORKSTATION_NAME, WORKSTATION_TAG};
use productid::{
    Error, HookEvent, HookResults, PackageBackend, PackageRecord, PluginHooks, ProductDatabase,
    ProductDirectory, ProductManager, Result,
};
use semver::Version;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[path = "../../src/certificate/fixtures.rs"]
mod fixtures;

pub use fixtures::product_pem;

pub fn server_pem(id: u64) -> String {
    product_pem(id, "Red Hat Enterprise Linux Server", "6.4", &["rhel-6", "rhel-6-server"])
}

pub fn workstation_pem(id: u64) -> String {
    product_pem(id, WORKSTATION_NAME, "5.8", &[WORKSTATION_TAG])
}

pub fn desktop_pem(id: u64) -> String {
    product_pem(id, DESKTOP_NAME, "5.8", &[DESKTOP_TAG])
}

enum Metadata {
    File(PathBuf),
    Broken,
}

/// In-memory package backend
pub struct FakeBackend {
    dir: TempDir,
    pub version: Version,
    enabled: Vec<String>,
    metadata: HashMap<String, Metadata>,
    available: Vec<PackageRecord>,
    installed: Vec<PackageRecord>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            version: Version::new(4, 14, 0),
            enabled: Vec::new(),
            metadata: HashMap::new(),
            available: Vec::new(),
            installed: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Enabled repository publishing a plain productid artifact
    pub fn with_product_repo(mut self, repo_id: &str, pem: &str) -> Self {
        let path = self.dir.path().join(format!("{}-productid", repo_id));
        fs::write(&path, pem).unwrap();
        self.enabled.push(repo_id.to_string());
        self.metadata.insert(repo_id.to_string(), Metadata::File(path));
        self
    }

    /// Enabled repository publishing a gzip compressed productid artifact
    pub fn with_gzip_product_repo(mut self, repo_id: &str, pem: &str) -> Self {
        let path = self.dir.path().join(format!("{}-productid.gz", repo_id));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(pem.as_bytes()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        self.enabled.push(repo_id.to_string());
        self.metadata.insert(repo_id.to_string(), Metadata::File(path));
        self
    }

    /// Enabled repository without productid metadata
    pub fn with_plain_repo(mut self, repo_id: &str) -> Self {
        self.enabled.push(repo_id.to_string());
        self
    }

    /// Enabled repository whose metadata cannot be retrieved
    pub fn with_broken_repo(mut self, repo_id: &str) -> Self {
        self.enabled.push(repo_id.to_string());
        self.metadata.insert(repo_id.to_string(), Metadata::Broken);
        self
    }

    /// Package offered by `repo_id` and installed
    pub fn with_installed(mut self, name: &str, repo_id: &str) -> Self {
        self.available
            .push(PackageRecord::new(name, "x86_64", Some(repo_id)));
        self.installed.push(PackageRecord::new(name, "x86_64", None));
        self
    }

    /// Package offered by `repo_id` but not installed
    pub fn with_available(mut self, name: &str, repo_id: &str) -> Self {
        self.available
            .push(PackageRecord::new(name, "x86_64", Some(repo_id)));
        self
    }
}

impl PackageBackend for FakeBackend {
    fn version(&self) -> Result<Version> {
        Ok(self.version.clone())
    }

    fn enabled_repos(&self) -> Result<Vec<String>> {
        Ok(self.enabled.clone())
    }

    fn retrieve_metadata(&self, repo_id: &str, _name: &str) -> Result<Option<PathBuf>> {
        match self.metadata.get(repo_id) {
            None => Ok(None),
            Some(Metadata::File(path)) => Ok(Some(path.clone())),
            Some(Metadata::Broken) => Err(Error::MetadataError(format!(
                "Cannot retrieve productid for {}",
                repo_id
            ))),
        }
    }

    fn available_packages(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.available.clone())
    }

    fn installed_packages(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.installed.clone())
    }
}

/// Hook receiver remembering every notification as (hook, product ids)
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub calls: Rc<RefCell<Vec<(String, Vec<String>)>>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.borrow().clone()
    }
}

impl PluginHooks for RecordingHooks {
    fn notify(&self, event: &HookEvent<'_>) -> Result<HookResults> {
        let HookEvent::PostProductIdInstall { product_list } = event;
        let ids = product_list
            .iter()
            .map(|c| c.product_id().to_string())
            .collect();
        self.calls.borrow_mut().push((event.name().to_string(), ids));
        Ok(HookResults::default())
    }
}

/// Product directory and database in a temporary location
pub struct Fixture {
    pub temp: TempDir,
    pub product_dir: PathBuf,
    pub db_path: PathBuf,
    pub hooks: RecordingHooks,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let product_dir = temp.path().join("etc/pki/product");
        let db_path = temp.path().join("var/lib/rhsm/productid.js");
        Self {
            temp,
            product_dir,
            db_path,
            hooks: RecordingHooks::default(),
        }
    }

    pub fn manager(&self) -> ProductManager<ProductDirectory, RecordingHooks> {
        ProductManager::new(
            ProductDirectory::new(&self.product_dir),
            ProductDatabase::new(&self.db_path),
            self.hooks.clone(),
        )
    }

    pub fn cert_path(&self, id: u64) -> PathBuf {
        self.product_dir.join(format!("{}.pem", id))
    }

    /// Place a certificate on disk, optionally recording its repository
    pub fn preinstall(&self, id: u64, pem: &str, repo_id: Option<&str>) -> PathBuf {
        fs::create_dir_all(&self.product_dir).unwrap();
        let path = self.cert_path(id);
        fs::write(&path, pem).unwrap();

        if let Some(repo_id) = repo_id {
            let mut db = self.database();
            db.add(&id.to_string(), repo_id);
            db.write().unwrap();
        }
        path
    }

    /// Fresh view of the database file
    pub fn database(&self) -> ProductDatabase {
        let mut db = ProductDatabase::new(&self.db_path);
        let _ = db.read();
        db
    }

    pub fn repo_of(&self, id: u64) -> Option<String> {
        self.database().find_repo(&id.to_string()).map(str::to_string)
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
