use anyhow::{Context, Result};
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use std::path::PathBuf;
use std::time::Duration;

use crate::{
    error::PkgError,
    http::HttpClient,
    provider::{DEFAULT_RAW_HOST, RawProvider},
    runtime::Runtime,
};

use super::paths::default_home;

pub const DEFAULT_JOBS: usize = 4;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Values collected from the command line (and their environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub home: Option<PathBuf>,
    pub env: Option<PathBuf>,
    pub raw_url: Option<String>,
    pub jobs: Option<usize>,
    pub offline: bool,
}

pub struct Config<R: Runtime> {
    pub runtime: R,
    /// `sources.json` and `cache/registry/` live here.
    pub home: PathBuf,
    /// Target environment root.
    pub env_root: PathBuf,
    pub jobs: usize,
    pub offline: bool,
    pub provider: RawProvider,
}

/// `ghp_abcd*********wxyz`; short tokens are masked completely.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 16 {
        return "*********".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

fn http_timeout<R: Runtime>(runtime: &R) -> Result<Duration> {
    match runtime.env_var("SIERRA_HTTP_TIMEOUT") {
        Ok(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                PkgError::Config(format!("SIERRA_HTTP_TIMEOUT must be whole seconds, got '{}'", raw))
            })?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
    }
}

fn build_client(headers: HeaderMap, timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("sierra-pkg/", env!("SIERRA_PKG_VERSION")))
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, options: ConfigOptions) -> Result<Self> {
        let timeout = http_timeout(&runtime)?;
        let anonymous = HttpClient::new(build_client(HeaderMap::new(), timeout)?);

        // The token goes to GitHub sources only; third-party hosts never see it.
        let github = match runtime.env_var("GITHUB_TOKEN") {
            Ok(token) => {
                let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("GITHUB_TOKEN is not a valid header value")?;
                auth_value.set_sensitive(true);
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, auth_value);
                debug!("Using GITHUB_TOKEN for authentication: {}", mask_token(&token));
                HttpClient::new(build_client(headers, timeout)?)
            }
            Err(_) => anonymous.clone(),
        };

        let home = match options.home {
            Some(path) => path,
            None => default_home(&runtime)?,
        };
        let env_root = options.env.unwrap_or_else(|| home.join("env"));
        let raw_url = options.raw_url.as_deref().unwrap_or(DEFAULT_RAW_HOST);
        let jobs = options.jobs.unwrap_or(DEFAULT_JOBS).max(1);
        debug!("home={:?} env={:?} raw_url={} jobs={}", home, env_root, raw_url, jobs);

        Ok(Self {
            provider: RawProvider::new(anonymous, raw_url).with_github_client(github),
            runtime,
            home,
            env_root,
            jobs,
            offline: options.offline,
        })
    }
}
