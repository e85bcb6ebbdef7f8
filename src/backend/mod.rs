// src/backend/mod.rs

//! Package backend interface
//!
//! The package backend knows which repositories are enabled, which packages
//! they offer and which packages are installed. productid never installs or
//! removes packages itself; it only asks these questions.

pub mod dnf;

pub use dnf::DnfBackend;

use crate::error::Result;
use semver::Version;
use std::path::PathBuf;
use tracing::warn;

/// First backend version that records which repository a package came from
pub const MIN_PROVENANCE_VERSION: Version = Version::new(3, 2, 28);

/// Repository markers that mean "no real repository"
pub const NO_REPO_MARKERS: &[&str] = &["installed", "@System"];

/// A package as seen by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRecord {
    pub name: String,
    pub arch: String,
    /// Repository offering the package, `None` when unknown
    pub repo_id: Option<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, arch: impl Into<String>, repo_id: Option<&str>) -> Self {
        Self {
            name: name.into(),
            arch: arch.into(),
            repo_id: repo_id.map(str::to_string),
        }
    }

    /// Repository this package really came from, ignoring synthetic markers
    pub fn source_repo(&self) -> Option<&str> {
        self.repo_id
            .as_deref()
            .filter(|repo| !NO_REPO_MARKERS.contains(repo))
    }
}

/// Queries productid needs answered by the package manager
pub trait PackageBackend {
    /// Backend version
    fn version(&self) -> Result<Version>;

    /// Identifiers of all enabled repositories
    fn enabled_repos(&self) -> Result<Vec<String>>;

    /// Local path of a named metadata artifact of a repository
    ///
    /// `Ok(None)` means the repository does not publish the artifact.
    fn retrieve_metadata(&self, repo_id: &str, name: &str) -> Result<Option<PathBuf>>;

    /// Packages offered by the enabled repositories
    fn available_packages(&self) -> Result<Vec<PackageRecord>>;

    /// Packages currently installed
    fn installed_packages(&self) -> Result<Vec<PackageRecord>>;

    /// Whether the backend tracks package to repository provenance
    fn tracks_repo_provenance(&self) -> bool {
        match self.version() {
            Ok(version) => version >= MIN_PROVENANCE_VERSION,
            Err(e) => {
                warn!("Unable to determine package backend version: {}", e);
                false
            }
        }
    }
}

/// Parse the first version looking token of a `--version` banner
///
/// Missing components are zero, extra components are dropped, so "4.14"
/// becomes 4.14.0 and "5.2.6.0" becomes 5.2.6.
pub fn parse_backend_version(output: &str) -> Option<Version> {
    output.split_whitespace().find_map(|token| {
        if !token.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let mut parts = token.split('.').map(|p| p.parse::<u64>());
        let major = parts.next()?.ok()?;
        let minor = parts.next().unwrap_or(Ok(0)).ok()?;
        let patch = parts.next().unwrap_or(Ok(0)).ok()?;
        Some(Version::new(major, minor, patch))
    })
}
