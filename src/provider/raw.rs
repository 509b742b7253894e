//! Raw-content provider: plain GET requests against the source's base URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use crate::http::HttpClient;
use crate::source::{Source, SourceLocation};

use super::Provider;

pub const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";
pub const MANIFEST_FILE: &str = "registry.json";

/// Fetches files from `{raw_host}/{owner}/{repo}/{branch}/...` for GitHub
/// sources and from `{url}/{branch}/...` for plain HTTP sources.
///
/// Only GitHub sources go through `github_client`, which may carry the
/// user's token. Plain HTTP sources always use the anonymous client.
pub struct RawProvider {
    http_client: HttpClient,
    github_client: HttpClient,
    raw_host: String,
}

impl RawProvider {
    pub fn new(http_client: HttpClient, raw_host: &str) -> Self {
        Self {
            github_client: http_client.clone(),
            http_client,
            raw_host: raw_host.trim_end_matches('/').to_string(),
        }
    }

    /// Use `client` (typically with an `Authorization` header) for GitHub sources.
    pub fn with_github_client(mut self, client: HttpClient) -> Self {
        self.github_client = client;
        self
    }

    pub fn raw_host(&self) -> &str {
        &self.raw_host
    }

    fn client_for(&self, source: &Source) -> Result<&HttpClient> {
        Ok(match source.location()? {
            SourceLocation::GitHub(_) => &self.github_client,
            SourceLocation::Http(_) => &self.http_client,
        })
    }
}

#[async_trait]
impl Provider for RawProvider {
    async fn fetch_manifest(&self, source: &Source) -> Result<String> {
        let url = source.file_url(&self.raw_host, MANIFEST_FILE)?;
        debug!("Fetching manifest for {} from {}", source.name, url);
        self.client_for(source)?
            .get_text(&url)
            .await
            .with_context(|| format!("Failed to fetch {}", url))
    }

    async fn fetch_file(&self, source: &Source, relative: &str) -> Result<Option<String>> {
        let url = source.file_url(&self.raw_host, relative)?;
        debug!("Fetching {} from {}", relative, url);
        self.client_for(source)?
            .get_text_optional(&url)
            .await
            .with_context(|| format!("Failed to fetch {}", url))
    }
}
