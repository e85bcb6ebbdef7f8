// src/database.rs

//! Product to repository database
//!
//! A flat JSON object mapping each installed product id to the repository
//! its certificate was installed from, e.g.
//!
//! ```json
//! {
//!   "69": "rhel-6-server-rpms"
//! }
//! ```
//!
//! Reads and writes never abort a run: callers get an error back, log it and
//! carry on. A failed write leaves the previous file untouched.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Default location of the database file
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/rhsm/productid.js";

/// Mode of a newly created database file
const DATABASE_MODE: u32 = 0o644;

/// Persisted mapping of product id to source repository id
#[derive(Debug)]
pub struct ProductDatabase {
    path: PathBuf,
    content: BTreeMap<String, String>,
}

impl ProductDatabase {
    /// Open a database backed by `path` with an empty in-memory mapping
    ///
    /// Nothing is read yet; see [`ProductDatabase::read`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: BTreeMap::new(),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write an empty mapping if the backing file does not exist yet
    pub fn create(&self) -> Result<()> {
        if !self.path.exists() {
            debug!("Creating product database at {}", self.path.display());
            self.write()?;
        }
        Ok(())
    }

    /// Load the mapping from the backing file
    ///
    /// On failure the in-memory mapping is left as it was.
    pub fn read(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::DatabaseError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let content: BTreeMap<String, String> = serde_json::from_str(&text).map_err(|e| {
            Error::DatabaseError(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        debug!(
            "Loaded {} product/repository entries from {}",
            content.len(),
            self.path.display()
        );
        self.content = content;
        Ok(())
    }

    /// Serialize the full mapping to the backing file
    ///
    /// The new content is written to a temporary file beside the database
    /// and renamed over it.
    pub fn write(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.content)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        // Temporary files are private; keep the database readable
        let mode = fs::metadata(&self.path)
            .map(|m| m.permissions().mode() & 0o7777)
            .unwrap_or(DATABASE_MODE);
        tmp.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| {
            Error::DatabaseError(format!("Failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }

    /// Record (or replace) the repository a product came from
    pub fn add(&mut self, product_id: &str, repo_id: &str) {
        self.content
            .insert(product_id.to_string(), repo_id.to_string());
    }

    /// Forget a product; absent products are ignored
    pub fn delete(&mut self, product_id: &str) {
        self.content.remove(product_id);
    }

    /// Repository a product was installed from
    pub fn find_repo(&self, product_id: &str) -> Option<&str> {
        self.content.get(product_id).map(String::as_str)
    }

    /// All (product id, repository id) entries
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.content.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
