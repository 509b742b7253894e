//! Command layer: turns parsed CLI arguments into application actions and
//! renders their results. This is the only place that prints.

use anyhow::Result;

use crate::application::{BatchOutcome, LoadedIndex, RefreshAction, Summary};
use crate::error::PkgError;
use crate::package::{Environment, SourceOutcome};
use crate::registry::RegistryFetcher;
use crate::runtime::Runtime;
use crate::source::SourceStore;

pub mod config;
mod install;
mod list;
mod paths;
mod remove;
mod search;
mod source;
mod update;
mod validate;

pub use config::{Config, ConfigOptions};
pub use install::install;
pub use list::list;
pub use remove::remove;
pub use search::{info, search};
pub use source::{source_add, source_enable, source_list, source_remove, source_update};
pub use update::{update, upgradable};
pub use validate::validate;

/// Refresh (or, offline, read from cache) the package index and warn about
/// every source that did not come back fresh.
pub(crate) async fn load_index<R: Runtime>(config: &Config<R>) -> Result<LoadedIndex> {
    let store = SourceStore::new(&config.runtime, &config.home);
    let fetcher = RegistryFetcher::new(&config.runtime, &config.provider, store.cache_dir());
    let action = RefreshAction::new(&store, &fetcher);
    let loaded = if config.offline {
        action.offline()?
    } else {
        action.refresh(config.jobs).await?
    };

    if loaded.sources.is_empty() {
        eprintln!("No sources configured. Add one with `sierra-pkg source add <url>`.");
    }
    for source in &loaded.report.sources {
        match &source.outcome {
            SourceOutcome::Degraded { .. } => eprintln!(
                "warning: source '{}' is unreachable, using its cached registry",
                source.source_name
            ),
            SourceOutcome::NoCache => eprintln!(
                "warning: source '{}' has no cached registry",
                source.source_name
            ),
            SourceOutcome::Failed { kind, message } => eprintln!(
                "warning: source '{}' skipped ({}): {}",
                source.source_name, kind, message
            ),
            SourceOutcome::Fresh { .. } => {}
        }
    }
    Ok(loaded)
}

pub(crate) fn open_env<R: Runtime>(config: &Config<R>) -> Result<Environment> {
    Environment::open(&config.runtime, &config.env_root)
}

pub(crate) fn print_error(name: &str, err: &anyhow::Error) {
    eprintln!("{}: {:#} [{}]", name, err, PkgError::kind_of(err));
    if let Some(PkgError::ValidationFailed { report, .. }) = PkgError::find(err) {
        for diagnostic in &report.errors {
            eprintln!("  error {}", diagnostic);
        }
    }
}

/// Print one line per item and, for a partial result, the tally.
pub(crate) fn print_batch<T>(outcome: &BatchOutcome<T>, render: impl Fn(&T) -> String) -> Summary {
    for item in &outcome.items {
        match &item.result {
            Ok(value) => println!("{}: {}", item.name, render(value)),
            Err(e) => print_error(&item.name, e),
        }
    }
    let summary = outcome.summary();
    if summary == Summary::Partial {
        println!(
            "{} succeeded, {} failed",
            outcome.succeeded().count(),
            outcome.failed().count()
        );
    }
    summary
}
