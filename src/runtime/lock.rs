//! Advisory exclusive file locks.
//!
//! A lock file sits next to the state it guards (`<env>/.lock`,
//! `<cache>/<source>.lock`). Holders never await while holding one.

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::RealRuntime;

/// Guard for an exclusive lock; unlocks on drop.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// A guard that holds no OS lock. Used by runtimes that have no real
    /// file system behind them.
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            file: None,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                debug!("Failed to release lock {:?}: {}", self.path, e);
            }
        }
    }
}

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn lock_exclusive_impl(&self, path: &Path) -> Result<FileLock> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {:?}", path))?;

        FileExt::lock_exclusive(&file).with_context(|| format!("Failed to lock {:?}", path))?;
        debug!("Acquired lock {:?}", path);

        Ok(FileLock {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }
}
