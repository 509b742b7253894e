use anyhow::Result;
use log::debug;

use crate::application::{RefreshAction, Summary};
use crate::package::SourceOutcome;
use crate::registry::RegistryFetcher;
use crate::runtime::Runtime;
use crate::source::SourceStore;

use super::config::Config;

#[tracing::instrument(skip(config))]
pub fn source_add<R: Runtime>(
    config: &Config<R>,
    url: &str,
    name: Option<&str>,
    branch: Option<&str>,
    priority: Option<u32>,
) -> Result<Summary> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let source = store.add(url, name, branch, priority)?;
    println!(
        "Added source '{}' ({}, branch {}, priority {})",
        source.name, source.url, source.branch, source.priority
    );
    Ok(Summary::Success)
}

#[tracing::instrument(skip(config))]
pub fn source_list<R: Runtime>(config: &Config<R>) -> Result<Summary> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let sources = store.list()?;
    if sources.is_empty() {
        println!("No sources configured.");
        return Ok(Summary::Success);
    }

    for source in sources {
        let fetched = source
            .last_fetch_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let state = if source.enabled { "" } else { " (disabled)" };
        println!(
            "{}{}\n  url: {} (branch {})\n  priority: {}\n  last fetch: {}",
            source.name, state, source.url, source.branch, source.priority, fetched
        );
    }
    Ok(Summary::Success)
}

#[tracing::instrument(skip(config))]
pub fn source_remove<R: Runtime>(config: &Config<R>, name: &str) -> Result<Summary> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let removed = store.remove(name)?;
    println!("Removed source '{}'", removed.name);
    Ok(Summary::Success)
}

#[tracing::instrument(skip(config))]
pub fn source_enable<R: Runtime>(config: &Config<R>, name: &str, enabled: bool) -> Result<Summary> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let source = store.set_enabled(name, enabled)?;
    let verb = if source.enabled { "Enabled" } else { "Disabled" };
    println!("{} source '{}'", verb, source.name);
    Ok(Summary::Success)
}

/// Fetch every enabled source and report each one.
#[tracing::instrument(skip(config))]
pub async fn source_update<R: Runtime>(config: &Config<R>) -> Result<Summary> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let fetcher = RegistryFetcher::new(&config.runtime, &config.provider, store.cache_dir());
    let loaded = RefreshAction::new(&store, &fetcher)
        .refresh(config.jobs)
        .await?;
    debug!("Refreshed {} source(s)", loaded.report.sources.len());

    if loaded.report.sources.is_empty() {
        println!("No enabled sources.");
    }
    for report in &loaded.report.sources {
        match &report.outcome {
            SourceOutcome::Fresh { packages } => {
                println!("{}: {} package(s)", report.source_name, packages)
            }
            SourceOutcome::Degraded { packages } => println!(
                "{}: unreachable, using cache ({} package(s))",
                report.source_name, packages
            ),
            SourceOutcome::NoCache => println!("{}: no cache", report.source_name),
            SourceOutcome::Failed { kind, message } => {
                eprintln!("{}: {} [{}]", report.source_name, message, kind)
            }
        }
    }
    println!("{} package(s) available", loaded.index.len());
    Ok(loaded.report.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::ConfigOptions;
    use crate::error::{ErrorKind, PkgError};
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    fn config(home: &std::path::Path, raw_url: &str) -> Config<RealRuntime> {
        let options = ConfigOptions {
            home: Some(home.to_path_buf()),
            raw_url: Some(raw_url.to_string()),
            ..Default::default()
        };
        Config::new(RealRuntime, options).unwrap()
    }

    #[test]
    fn test_add_list_disable_remove() {
        let dir = tempdir().unwrap();
        let config = config(dir.path(), "http://127.0.0.1:1");

        source_add(&config, "https://github.com/acme/scripts", None, None, Some(5)).unwrap();
        let err = source_add(&config, "github.com/acme/scripts", None, None, None).unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::DuplicateSource);

        assert_eq!(source_list(&config).unwrap(), Summary::Success);
        source_enable(&config, "acme/scripts", false).unwrap();
        let store = SourceStore::new(&config.runtime, &config.home);
        assert!(!store.get("acme/scripts").unwrap().enabled);

        source_remove(&config, "acme/scripts").unwrap();
        let err = source_remove(&config, "acme/scripts").unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_reports_corrupt_source() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/acme/good/main/registry.json")
            .with_body(r#"{"packages": {"demo": {"version": "1.0.0", "description": "Demo", "path": "demo"}}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/acme/bad/main/registry.json")
            .with_body(r#"{"packages": {"demo": {"version": "one"}}}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let config = config(dir.path(), &server.url());
        source_add(&config, "https://github.com/acme/good", None, None, None).unwrap();
        source_add(&config, "https://github.com/acme/bad", None, None, None).unwrap();

        assert_eq!(source_update(&config).await.unwrap(), Summary::Partial);
    }
}
