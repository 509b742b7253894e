//! The installed manifest: what is installed in one environment.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::PkgError;
use crate::runtime::{Runtime, write_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub package_name: String,
    pub version: Version,
    pub source_name: String,
    pub install_path: PathBuf,
    pub installed_at: DateTime<Utc>,
    /// SHA-256 of the installed script, lowercase hex.
    pub checksum: String,
}

/// Installed records keyed by package name.
///
/// Only ever persisted through [`InstalledManifest::save`], which replaces the
/// file atomically, and only while the environment lock is held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstalledManifest {
    #[serde(default)]
    packages: BTreeMap<String, InstalledRecord>,
}

impl InstalledManifest {
    /// Load the manifest at `path`; a missing file is an empty manifest.
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            PkgError::Config(format!("{} is malformed: {}", path.display(), e))
        })?;
        Ok(manifest)
    }

    pub fn save<R: Runtime + ?Sized>(&self, runtime: &R, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(runtime, path, content.as_bytes())
            .with_context(|| format!("Failed to save installed manifest {:?}", path))
    }

    pub fn get(&self, name: &str) -> Option<&InstalledRecord> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Insert or replace the record for `record.package_name`.
    pub fn upsert(&mut self, record: InstalledRecord) -> Option<InstalledRecord> {
        self.packages.insert(record.package_name.clone(), record)
    }

    pub fn remove(&mut self, name: &str) -> Option<InstalledRecord> {
        self.packages.remove(name)
    }

    /// Records in name order.
    pub fn records(&self) -> impl Iterator<Item = &InstalledRecord> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn record(name: &str, version: &str, source: &str) -> InstalledRecord {
    InstalledRecord {
        package_name: name.to_string(),
        version: super::parse_version(version).unwrap(),
        source_name: source.to_string(),
        install_path: PathBuf::from(format!("/env/scripts/{}", super::install_file_name(name))),
        installed_at: Utc::now(),
        checksum: "0".repeat(64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_is_empty() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let manifest = InstalledManifest::load(&runtime, &dir.path().join("installed.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed.json");

        let mut manifest = InstalledManifest::default();
        manifest.upsert(record("zeta", "1.0.0", "main"));
        manifest.upsert(record("alpha", "2.1.0", "main"));
        manifest.save(&runtime, &path).unwrap();

        let loaded = InstalledManifest::load(&runtime, &path).unwrap();
        assert_eq!(loaded, manifest);
        let names: Vec<_> = loaded.records().map(|r| r.package_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_upsert_replaces() {
        let mut manifest = InstalledManifest::default();
        assert!(manifest.upsert(record("whois", "1.0.0", "main")).is_none());
        let previous = manifest.upsert(record("whois", "1.1.0", "main")).unwrap();
        assert_eq!(previous.version, Version::new(1, 0, 0));
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("whois").unwrap().version, Version::new(1, 1, 0));
    }

    #[test]
    fn test_malformed_is_config_error() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("installed.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = InstalledManifest::load(&runtime, &path).unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::Config);
    }
}
