//! Package sources: remote registries the user has configured.
//!
//! A source is either a GitHub repository (served through the raw content
//! host) or any other HTTP(S) base URL that serves `registry.json` and the
//! package trees under `{url}/{branch}/`.

mod store;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::PkgError;

pub use store::SourceStore;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_PRIORITY: u32 = 10;

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            anyhow::bail!("Invalid repository format. Expected 'owner/repo'.")
        } else {
            Ok(RepoId {
                owner: parts[0].to_string(),
                repo: parts[1].to_string(),
            })
        }
    }
}

/// Where a source's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// `github.com/{owner}/{repo}`, read through the raw content host.
    GitHub(RepoId),
    /// Any other `http(s)://` base URL, without trailing slash.
    Http(String),
}

impl SourceLocation {
    /// Parse a user-supplied source URL.
    ///
    /// Accepts `https://github.com/owner/repo(.git)`, `github.com/owner/repo`
    /// and plain `http(s)://host/path` URLs.
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"));

        let rest = without_scheme.unwrap_or(trimmed);
        if let Some(path) = rest.strip_prefix("github.com/") {
            let path = path.trim_end_matches('/');
            let path = path.strip_suffix(".git").unwrap_or(path);
            let repo: RepoId = path.parse().map_err(|_| {
                PkgError::Config(format!(
                    "invalid GitHub URL '{}': expected github.com/owner/repo",
                    url
                ))
            })?;
            return Ok(SourceLocation::GitHub(repo));
        }

        match without_scheme {
            Some(rest) if !rest.is_empty() && !rest.starts_with('/') => {
                Ok(SourceLocation::Http(trimmed.trim_end_matches('/').to_string()))
            }
            _ => Err(PkgError::Config(format!(
                "invalid source URL '{}': expected a GitHub repository or an http(s) URL",
                url
            ))
            .into()),
        }
    }

    /// Name used when the user does not pick one.
    pub fn default_name(&self) -> String {
        match self {
            SourceLocation::GitHub(repo) => repo.to_string(),
            SourceLocation::Http(base) => base
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .to_string(),
        }
    }

    /// Base URL that package-relative paths are joined onto.
    pub fn raw_base(&self, raw_host: &str, branch: &str) -> String {
        match self {
            SourceLocation::GitHub(repo) => format!(
                "{}/{}/{}/{}",
                raw_host.trim_end_matches('/'),
                repo.owner,
                repo.repo,
                branch
            ),
            SourceLocation::Http(base) => format!("{}/{}", base, branch),
        }
    }
}

/// A configured remote registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Lower wins when two sources publish the same package name.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetch_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_manifest_hash: Option<String>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            branch: default_branch(),
            priority: DEFAULT_PRIORITY,
            enabled: true,
            last_fetch_time: None,
            cached_manifest_hash: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn location(&self) -> Result<SourceLocation> {
        SourceLocation::parse(&self.url)
    }

    /// `{base}/{relative}` for a file published by this source.
    pub fn file_url(&self, raw_host: &str, relative: &str) -> Result<String> {
        let base = self.location()?.raw_base(raw_host, &self.branch);
        Ok(format!("{}/{}", base, relative.trim_start_matches('/')))
    }

    /// File stem for per-source state on disk. Names may contain `/`, so the
    /// readable part is sanitized and a short hash of the full name keeps
    /// `acme/scripts` and `acme_scripts` apart.
    pub fn file_stem(&self) -> String {
        let readable: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let digest = hex::encode(Sha256::digest(self.name.as_bytes()));
        format!("{}-{}", readable, &digest[..8])
    }
}
