//! Persistent list of configured sources (`{home}/sources.json`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PkgError;
use crate::runtime::{Runtime, write_atomic};

use super::{DEFAULT_PRIORITY, Source, SourceLocation};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<Source>,
}

/// File-backed source list. Every mutation is load, modify, then atomic save
/// under `{home}/sources.lock`.
pub struct SourceStore<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
    cache_dir: PathBuf,
}

impl<'a, R: Runtime> SourceStore<'a, R> {
    pub fn new(runtime: &'a R, home: &Path) -> Self {
        Self {
            runtime,
            path: home.join("sources.json"),
            cache_dir: home.join("cache").join("registry"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Registry cache file for a source.
    pub fn cache_path(&self, source: &Source) -> PathBuf {
        crate::registry::cache_path(&self.cache_dir, source)
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_file_name("sources.lock")
    }

    fn load(&self) -> Result<Vec<Source>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Vec::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        let file: SourcesFile = serde_json::from_str(&content).map_err(|e| {
            PkgError::Config(format!("{} is malformed: {}", self.path.display(), e))
        })?;
        Ok(file.sources)
    }

    fn save(&self, sources: Vec<Source>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !self.runtime.exists(parent)
        {
            self.runtime.create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&SourcesFile { sources })?;
        write_atomic(self.runtime, &self.path, content.as_bytes())
            .with_context(|| format!("Failed to save sources to {:?}", self.path))
    }

    fn update<T>(&self, f: impl FnOnce(&mut Vec<Source>) -> Result<T>) -> Result<T> {
        let _lock = self.runtime.lock_exclusive(&self.lock_path())?;
        let mut sources = self.load()?;
        let result = f(&mut sources)?;
        self.save(sources)?;
        Ok(result)
    }

    /// Register a new source. The name defaults to `owner/repo` for GitHub
    /// URLs and to host+path otherwise.
    pub fn add(
        &self,
        url: &str,
        name: Option<&str>,
        branch: Option<&str>,
        priority: Option<u32>,
    ) -> Result<Source> {
        let location = SourceLocation::parse(url)?;
        let name = match name.map(str::trim) {
            Some("") => return Err(PkgError::Config("source name is empty".into()).into()),
            Some(n) => n.to_string(),
            None => location.default_name(),
        };

        let mut source = Source::new(name, url.trim())
            .with_priority(priority.unwrap_or(DEFAULT_PRIORITY));
        if let Some(branch) = branch {
            source = source.with_branch(branch);
        }

        self.update(|sources| {
            if sources.iter().any(|s| s.name == source.name) {
                return Err(PkgError::DuplicateSource(source.name.clone()).into());
            }
            sources.push(source.clone());
            Ok(())
        })?;

        info!("Added source {} ({})", source.name, source.url);
        Ok(source)
    }

    /// Remove a source together with its registry cache.
    pub fn remove(&self, name: &str) -> Result<Source> {
        let removed = self.update(|sources| {
            let pos = sources
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| PkgError::not_found("source", name))?;
            Ok(sources.remove(pos))
        })?;

        let cache = self.cache_path(&removed);
        if self.runtime.exists(&cache) {
            debug!("Removing registry cache {:?}", cache);
            self.runtime.remove_file(&cache)?;
        }

        info!("Removed source {}", name);
        Ok(removed)
    }

    /// All sources ordered by (priority, name).
    pub fn list(&self) -> Result<Vec<Source>> {
        let mut sources = self.load()?;
        sources.sort_by(|a, b| (a.priority, &a.name).cmp(&(b.priority, &b.name)));
        Ok(sources)
    }

    pub fn get(&self, name: &str) -> Result<Source> {
        self.load()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| PkgError::not_found("source", name).into())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<Source> {
        self.update(|sources| {
            let source = sources
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| PkgError::not_found("source", name))?;
            source.enabled = enabled;
            Ok(source.clone())
        })
    }

    /// Remember when a source was last fetched and what it served.
    pub fn record_fetch(&self, name: &str, at: DateTime<Utc>, hash: &str) -> Result<()> {
        self.update(|sources| {
            let source = sources
                .iter_mut()
                .find(|s| s.name == name)
                .ok_or_else(|| PkgError::not_found("source", name))?;
            source.last_fetch_time = Some(at);
            source.cached_manifest_hash = Some(hash.to_string());
            Ok(())
        })
    }
}
