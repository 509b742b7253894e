use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::PkgError;
use crate::runtime::Runtime;

use super::install_file_name;

/// A target environment directory.
///
/// Layout:
/// - `{root}/scripts/` installed scripts (created on demand)
/// - `{root}/installed.json` the installed manifest
/// - `{root}/.lock` guards both of the above
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    root: PathBuf,
}

impl Environment {
    /// Open an existing environment. Creating environments is not our job.
    pub fn open<R: Runtime + ?Sized>(runtime: &R, root: &Path) -> Result<Self> {
        if !runtime.is_dir(root) {
            return Err(PkgError::Config(format!(
                "environment {} does not exist",
                root.display()
            ))
            .into());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("installed.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn script_path(&self, package_name: &str) -> PathBuf {
        self.scripts_dir().join(install_file_name(package_name))
    }

    pub fn ensure_scripts_dir<R: Runtime + ?Sized>(&self, runtime: &R) -> Result<()> {
        let dir = self.scripts_dir();
        if !runtime.is_dir(&dir) {
            runtime.create_dir_all(&dir)?;
        }
        Ok(())
    }
}
