//! Remote registries: manifest schema, fetching, and the on-disk cache.

mod cache;
mod fetcher;
mod manifest;

pub use cache::{CachedRegistry, cache_lock_path, cache_path, manifest_hash};
pub use fetcher::{FetchResult, RegistryFetcher};
pub use manifest::{is_valid_package_name, parse_manifest};
