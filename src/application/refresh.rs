//! Refresh action - builds a fresh package index from the configured sources.

use anyhow::Result;
use log::{info, warn};

use crate::package::{PackageIndex, RefreshReport};
use crate::registry::RegistryFetcher;
use crate::runtime::Runtime;
use crate::source::{Source, SourceStore};

/// Everything a command needs after a refresh.
#[derive(Debug)]
pub struct LoadedIndex {
    pub sources: Vec<Source>,
    pub index: PackageIndex,
    pub report: RefreshReport,
}

pub struct RefreshAction<'a, R: Runtime> {
    store: &'a SourceStore<'a, R>,
    fetcher: &'a RegistryFetcher<'a, R>,
}

impl<'a, R: Runtime> RefreshAction<'a, R> {
    pub fn new(store: &'a SourceStore<'a, R>, fetcher: &'a RegistryFetcher<'a, R>) -> Self {
        Self { store, fetcher }
    }

    /// Fetch every enabled source and stamp the fresh ones in the source list.
    pub async fn refresh(&self, jobs: usize) -> Result<LoadedIndex> {
        let sources = self.store.list()?;
        let (index, report) = PackageIndex::refresh(&sources, self.fetcher, jobs).await;

        for source in &report.sources {
            if let Some((at, hash)) = &source.fetch
                && let Err(e) = self.store.record_fetch(&source.source_name, *at, hash)
            {
                warn!("Failed to record fetch of {}: {:#}", source.source_name, e);
            }
        }
        info!("Index holds {} package(s)", index.len());

        // Reload so callers see the new fetch stamps.
        let sources = self.store.list()?;
        Ok(LoadedIndex {
            sources,
            index,
            report,
        })
    }

    /// Build the index from the registry caches without touching the network.
    pub fn offline(&self) -> Result<LoadedIndex> {
        let sources = self.store.list()?;
        let (index, report) = PackageIndex::from_cache(&sources, self.fetcher);
        Ok(LoadedIndex {
            sources,
            index,
            report,
        })
    }
}
