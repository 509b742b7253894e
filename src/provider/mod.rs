//! Provider abstraction: how source files are fetched over the network.
//!
//! The engine only ever needs two things from a source: its manifest and the
//! files of one package. Both are plain text.

mod raw;

use anyhow::Result;
use async_trait::async_trait;

use crate::source::Source;

pub use raw::{DEFAULT_RAW_HOST, MANIFEST_FILE, RawProvider};

/// Trait for fetching source content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch the raw `registry.json` text of a source.
    async fn fetch_manifest(&self, source: &Source) -> Result<String>;

    /// Fetch a file relative to the source root. A missing file is `Ok(None)`.
    async fn fetch_file(&self, source: &Source, relative: &str) -> Result<Option<String>>;
}
