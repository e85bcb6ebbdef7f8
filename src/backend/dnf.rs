// src/backend/dnf.rs

//! Package backend backed by the `dnf` and `rpm` command line tools
//!
//! Repository metadata is read from the dnf cache: every repository has a
//! `<cache_dir>/<repo id>-<hash>/repodata/repomd.xml` index whose `<data>`
//! entries name the cached artifacts.
//!
//! Nothing here downloads metadata. dnf only fetches a repository's
//! `productid` artifact when a plugin asks for it, so on a host without the
//! product-id dnf plugin every product repository reports its metadata as
//! not cached and lands in the metadata error set. Removal is then
//! suppressed for those repositories and nothing new is installed.

use super::{PackageBackend, PackageRecord, parse_backend_version};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use semver::Version;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Length of the hash suffix dnf appends to repository cache directories
const CACHE_HASH_LEN: usize = 16;

/// [`PackageBackend`] that shells out to dnf and rpm
#[derive(Debug, Clone)]
pub struct DnfBackend {
    command: String,
    rpm_command: String,
    cache_dir: PathBuf,
}

impl DnfBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            command: config.command.clone(),
            rpm_command: config.rpm_command.clone(),
            cache_dir: config.cache_dir.clone(),
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output().map_err(|e| {
            Error::BackendError(format!("Failed to run {}: {}. Is it installed?", program, e))
        })?;

        if !output.status.success() {
            return Err(Error::BackendError(format!(
                "{} {} failed: {}",
                program,
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Cache directory holding a repository's metadata
    fn repo_cache_dir(&self, repo_id: &str) -> Result<PathBuf> {
        let prefix = format!("{}-", repo_id);
        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            Error::BackendError(format!(
                "Failed to read metadata cache {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(&prefix))
                    .is_some_and(is_cache_hash)
            })
            .map(|entry| entry.path())
            .filter(|path| repomd_path(path).is_file())
            .collect();
        candidates.sort();

        candidates.pop().ok_or_else(|| {
            Error::BackendError(format!("No cached metadata for repository {}", repo_id))
        })
    }
}

impl Default for DnfBackend {
    fn default() -> Self {
        Self::new(&BackendConfig::default())
    }
}

impl PackageBackend for DnfBackend {
    fn version(&self) -> Result<Version> {
        let output = self.run(&self.command, &["--version"])?;
        parse_backend_version(&output).ok_or_else(|| {
            Error::BackendError(format!("Unrecognised {} version output", self.command))
        })
    }

    fn enabled_repos(&self) -> Result<Vec<String>> {
        let output = self.run(&self.command, &["repolist", "--enabled", "--quiet"])?;
        let repos = parse_repolist(&output);
        debug!("Found {} enabled repositories", repos.len());
        Ok(repos)
    }

    fn retrieve_metadata(&self, repo_id: &str, name: &str) -> Result<Option<PathBuf>> {
        let repo_dir = self.repo_cache_dir(repo_id)?;
        let repomd = repomd_path(&repo_dir);
        let xml = fs::read_to_string(&repomd).map_err(|e| {
            Error::MetadataError(format!("Failed to read {}: {}", repomd.display(), e))
        })?;

        let Some(href) = find_metadata_location(&xml, name)? else {
            return Ok(None);
        };

        let path = repo_dir.join(href);
        if !path.is_file() {
            return Err(Error::MetadataError(format!(
                "{} metadata for {} is not cached at {} \
                 (dnf only downloads it when a plugin requests it)",
                name,
                repo_id,
                path.display()
            )));
        }
        Ok(Some(path))
    }

    fn available_packages(&self) -> Result<Vec<PackageRecord>> {
        let output = self.run(
            &self.command,
            &[
                "repoquery",
                "--quiet",
                "--cacheonly",
                "--available",
                "--queryformat",
                "%{name} %{arch} %{repoid}\n",
            ],
        )?;
        Ok(parse_package_lines(&output))
    }

    fn installed_packages(&self) -> Result<Vec<PackageRecord>> {
        let output = self.run(
            &self.rpm_command,
            &["-qa", "--queryformat", "%{NAME} %{ARCH}\n"],
        )?;
        let packages = parse_package_lines(&output);
        debug!("Found {} installed packages", packages.len());
        Ok(packages)
    }
}

fn repomd_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join("repodata").join("repomd.xml")
}

fn is_cache_hash(suffix: &str) -> bool {
    suffix.len() == CACHE_HASH_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit())
}

/// Repository ids from `dnf repolist` output
pub fn parse_repolist(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("repo id"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// `name arch [repo]` lines into package records
pub fn parse_package_lines(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let arch = fields.next()?;
            Some(PackageRecord::new(name, arch, fields.next()))
        })
        .collect()
}

/// `href` of the `<data type="...">` entry in a repomd.xml document
pub fn find_metadata_location(xml: &str, data_type: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut in_target = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"data" => {
                in_target = attribute(&e, b"type")?.as_deref() == Some(data_type);
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_target && e.local_name().as_ref() == b"location" =>
            {
                return attribute(&e, b"href");
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"data" => in_target = false,
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::MetadataError(format!(
                    "Invalid repomd.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr
            .map_err(|e| Error::MetadataError(format!("Invalid repomd.xml attribute: {}", e)))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::MetadataError(format!("Invalid repomd.xml value: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1700000000</revision>
  <data type="primary">
    <checksum type="sha256">aaaa</checksum>
    <location href="repodata/aaaa-primary.xml.gz"/>
  </data>
  <data type="productid">
    <checksum type="sha256">bbbb</checksum>
    <location href="repodata/bbbb-productid.gz"/>
    <size>1234</size>
  </data>
</repomd>
"#;

    fn backend_with_cache(cache_dir: &Path) -> DnfBackend {
        DnfBackend::new(&BackendConfig {
            cache_dir: cache_dir.to_path_buf(),
            ..BackendConfig::default()
        })
    }

    fn write_repo_cache(cache_dir: &Path, dir_name: &str, repomd: &str) -> PathBuf {
        let repo_dir = cache_dir.join(dir_name);
        fs::create_dir_all(repo_dir.join("repodata")).unwrap();
        fs::write(repomd_path(&repo_dir), repomd).unwrap();
        repo_dir
    }

    #[test]
    fn test_find_metadata_location() {
        assert_eq!(
            find_metadata_location(REPOMD, "productid").unwrap().as_deref(),
            Some("repodata/bbbb-productid.gz")
        );
        assert_eq!(
            find_metadata_location(REPOMD, "primary").unwrap().as_deref(),
            Some("repodata/aaaa-primary.xml.gz")
        );
        assert_eq!(find_metadata_location(REPOMD, "updateinfo").unwrap(), None);
    }

    #[test]
    fn test_find_metadata_location_rejects_broken_xml() {
        assert!(find_metadata_location("<repomd><data type=\"productid\"></repomd>", "productid").is_err());
    }

    #[test]
    fn test_parse_repolist() {
        let output = "repo id                     repo name\n\
                      fedora                      Fedora 39 - x86_64\n\
                      updates                     Fedora 39 - x86_64 - Updates\n\n";
        assert_eq!(parse_repolist(output), vec!["fedora", "updates"]);
    }

    #[test]
    fn test_parse_package_lines() {
        let packages = parse_package_lines("bash x86_64 fedora\nzlib i686\n\ngarbage\n");
        assert_eq!(
            packages,
            vec![
                PackageRecord::new("bash", "x86_64", Some("fedora")),
                PackageRecord::new("zlib", "i686", None),
            ]
        );
    }

    #[test]
    fn test_retrieve_metadata_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let repo_dir = write_repo_cache(temp_dir.path(), "rhel-0123456789abcdef", REPOMD);
        fs::write(repo_dir.join("repodata/bbbb-productid.gz"), b"x").unwrap();
        // A repository whose id merely starts with the same prefix
        write_repo_cache(temp_dir.path(), "rhel-extras-0123456789abcdef", REPOMD);

        let backend = backend_with_cache(temp_dir.path());
        let path = backend.retrieve_metadata("rhel", "productid").unwrap().unwrap();
        assert_eq!(path, repo_dir.join("repodata/bbbb-productid.gz"));
    }

    #[test]
    fn test_retrieve_metadata_absent_entry() {
        let temp_dir = TempDir::new().unwrap();
        write_repo_cache(
            temp_dir.path(),
            "fedora-0123456789abcdef",
            "<repomd><data type=\"primary\"><location href=\"p.xml\"/></data></repomd>",
        );

        let backend = backend_with_cache(temp_dir.path());
        assert_eq!(backend.retrieve_metadata("fedora", "productid").unwrap(), None);
    }

    #[test]
    fn test_retrieve_metadata_errors() {
        let temp_dir = TempDir::new().unwrap();
        // Listed in repomd.xml but never downloaded
        write_repo_cache(temp_dir.path(), "rhel-0123456789abcdef", REPOMD);

        let backend = backend_with_cache(temp_dir.path());
        match backend.retrieve_metadata("rhel", "productid") {
            Err(Error::MetadataError(msg)) => {
                assert!(msg.contains("not cached"));
                assert!(msg.contains("plugin requests it"));
            }
            other => panic!("expected a metadata error, got {:?}", other),
        }
        assert!(matches!(
            backend.retrieve_metadata("unknown", "productid"),
            Err(Error::BackendError(_))
        ));
    }

    #[test]
    fn test_missing_command_is_backend_error() {
        let backend = DnfBackend::new(&BackendConfig {
            command: "/nonexistent/dnf".to_string(),
            ..BackendConfig::default()
        });
        assert!(matches!(backend.enabled_repos(), Err(Error::BackendError(_))));
        assert!(!backend.tracks_repo_provenance());
    }
}
