//! On-disk registry cache: the last manifest that passed validation, per source.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::runtime::{Runtime, write_atomic};
use crate::source::Source;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRegistry {
    pub source_name: String,
    pub fetched_at: DateTime<Utc>,
    pub manifest_hash: String,
    /// Raw manifest text, re-validated on every load.
    pub manifest: String,
}

/// `{cache_dir}/{stem}.json`
pub fn cache_path(cache_dir: &Path, source: &Source) -> PathBuf {
    cache_dir.join(format!("{}.json", source.file_stem()))
}

/// `{cache_dir}/{stem}.lock`
pub fn cache_lock_path(cache_dir: &Path, source: &Source) -> PathBuf {
    cache_dir.join(format!("{}.lock", source.file_stem()))
}

/// SHA-256 of the manifest text, lowercase hex.
pub fn manifest_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Read the cache file of `source_name`. Anything unreadable, or a cache
/// stamped for another source, counts as no cache.
pub fn read_cache<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
    source_name: &str,
) -> Option<CachedRegistry> {
    if !runtime.exists(path) {
        return None;
    }
    let content = match runtime.read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Ignoring unreadable registry cache {:?}: {:#}", path, e);
            return None;
        }
    };
    match serde_json::from_str::<CachedRegistry>(&content) {
        Ok(cached) if cached.source_name != source_name => {
            warn!(
                "Ignoring registry cache {:?}: written for '{}', not '{}'",
                path, cached.source_name, source_name
            );
            None
        }
        Ok(cached) if manifest_hash(&cached.manifest) == cached.manifest_hash => Some(cached),
        Ok(_) => {
            warn!("Ignoring registry cache {:?}: hash mismatch", path);
            None
        }
        Err(e) => {
            warn!("Ignoring malformed registry cache {:?}: {}", path, e);
            None
        }
    }
}

/// Replace the cache file under its lock.
pub fn write_cache<R: Runtime + ?Sized>(
    runtime: &R,
    cache_dir: &Path,
    source: &Source,
    cached: &CachedRegistry,
) -> Result<()> {
    if !runtime.is_dir(cache_dir) {
        runtime.create_dir_all(cache_dir)?;
    }
    let _lock = runtime.lock_exclusive(&cache_lock_path(cache_dir, source))?;
    let path = cache_path(cache_dir, source);
    let content = serde_json::to_string_pretty(cached)?;
    write_atomic(runtime, &path, content.as_bytes())
        .with_context(|| format!("Failed to write registry cache for {}", source.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    fn cached(source_name: &str, manifest: &str) -> CachedRegistry {
        CachedRegistry {
            source_name: source_name.into(),
            fetched_at: Utc::now(),
            manifest_hash: manifest_hash(manifest),
            manifest: manifest.into(),
        }
    }

    #[test]
    fn test_manifest_hash_is_sha256_hex() {
        assert_eq!(
            manifest_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_write_then_read() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache/registry");
        let source = Source::new("acme/scripts", "https://github.com/acme/scripts");

        let entry = cached("acme/scripts", r#"{"packages": {}}"#);
        write_cache(&runtime, &cache_dir, &source, &entry).unwrap();

        let path = cache_path(&cache_dir, &source);
        assert_eq!(path.parent().unwrap(), cache_dir);
        assert_eq!(read_cache(&runtime, &path, "acme/scripts"), Some(entry));
    }

    #[test]
    fn test_tampered_cache_is_ignored() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.json");

        let mut entry = cached("main", r#"{"packages": {}}"#);
        entry.manifest = "{}".into();
        std::fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();
        assert!(read_cache(&runtime, &path, "main").is_none());

        std::fs::write(&path, "garbage").unwrap();
        assert!(read_cache(&runtime, &path, "main").is_none());
    }

    #[test]
    fn test_cache_of_another_source_is_ignored() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.json");

        let entry = cached("acme/scripts", r#"{"packages": {}}"#);
        std::fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();

        assert!(read_cache(&runtime, &path, "acme_scripts").is_none());
        assert_eq!(read_cache(&runtime, &path, "acme/scripts"), Some(entry));
    }
}
