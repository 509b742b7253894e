use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::PkgError;
use crate::package::PackageDescriptor;
use crate::provider::Provider;
use crate::runtime::Runtime;
use crate::source::Source;

use super::cache::{CachedRegistry, cache_path, manifest_hash, read_cache, write_cache};
use super::manifest::parse_manifest;

/// Descriptors obtained for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub source_name: String,
    pub descriptors: Vec<PackageDescriptor>,
    /// Served from cache because the network fetch failed.
    pub degraded: bool,
    pub fetched_at: DateTime<Utc>,
    pub manifest_hash: String,
}

/// Fetches source manifests, keeping the last valid one on disk.
pub struct RegistryFetcher<'a, R: Runtime> {
    runtime: &'a R,
    provider: &'a dyn Provider,
    cache_dir: PathBuf,
}

impl<'a, R: Runtime> RegistryFetcher<'a, R> {
    pub fn new(runtime: &'a R, provider: &'a dyn Provider, cache_dir: &Path) -> Self {
        Self {
            runtime,
            provider,
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn provider(&self) -> &'a dyn Provider {
        self.provider
    }

    /// Fetch and validate a source's manifest.
    ///
    /// - success: cache replaced, `degraded = false`
    /// - network failure: last valid cache with `degraded = true`, else
    ///   [`PkgError::SourceUnreachable`]
    /// - schema failure: [`PkgError::ManifestCorrupt`], cache untouched
    pub async fn fetch(&self, source: &Source) -> Result<FetchResult> {
        let text = match self.provider.fetch_manifest(source).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to fetch manifest for {}: {:#}", source.name, e);
                return match self.load_cached(source) {
                    Some(mut cached) => {
                        info!(
                            "Using cached manifest for {} from {}",
                            source.name, cached.fetched_at
                        );
                        cached.degraded = true;
                        Ok(cached)
                    }
                    None => Err(PkgError::SourceUnreachable {
                        source_name: source.name.clone(),
                        reason: format!("{:#}", e),
                    }
                    .into()),
                };
            }
        };

        let descriptors = parse_manifest(&source.name, &text)?;
        let entry = CachedRegistry {
            source_name: source.name.clone(),
            fetched_at: Utc::now(),
            manifest_hash: manifest_hash(&text),
            manifest: text,
        };
        write_cache(self.runtime, &self.cache_dir, source, &entry)?;
        debug!(
            "Fetched {} packages from {} ({})",
            descriptors.len(),
            source.name,
            entry.manifest_hash
        );

        Ok(FetchResult {
            source_name: source.name.clone(),
            descriptors,
            degraded: false,
            fetched_at: entry.fetched_at,
            manifest_hash: entry.manifest_hash,
        })
    }

    /// The last valid cached manifest, without touching the network.
    pub fn load_cached(&self, source: &Source) -> Option<FetchResult> {
        let cached = read_cache(
            self.runtime,
            &cache_path(&self.cache_dir, source),
            &source.name,
        )?;
        match parse_manifest(&source.name, &cached.manifest) {
            Ok(descriptors) => Some(FetchResult {
                source_name: source.name.clone(),
                descriptors,
                degraded: false,
                fetched_at: cached.fetched_at,
                manifest_hash: cached.manifest_hash,
            }),
            Err(e) => {
                warn!("Ignoring cached manifest for {}: {}", source.name, e);
                None
            }
        }
    }
}
