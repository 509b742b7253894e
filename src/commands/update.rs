use anyhow::Result;

use crate::application::{Summary, UpdateOutcome, UpdateTarget, Updater};
use crate::runtime::Runtime;

use super::config::Config;
use super::{load_index, open_env, print_batch};

/// Show installed packages with a newer version in the index.
#[tracing::instrument(skip(config))]
pub async fn upgradable<R: Runtime>(config: &Config<R>) -> Result<Summary> {
    let env = open_env(config)?;
    let loaded = load_index(config).await?;
    let updater = Updater::new(&config.runtime, &config.provider, &loaded.index, &loaded.sources);
    let report = updater.upgradable(&env)?;

    if report.upgradable.is_empty() {
        println!("All packages are up to date.");
    }
    for c in &report.upgradable {
        println!("{} {} -> {} [{}]", c.name, c.installed, c.available, c.source_name);
    }
    for record in &report.orphaned {
        println!(
            "{} {} is no longer published by any enabled source",
            record.package_name, record.version
        );
    }
    Ok(Summary::Success)
}

/// Update the named packages, or everything when `names` is empty.
#[tracing::instrument(skip(config))]
pub async fn update<R: Runtime>(config: &Config<R>, names: &[String]) -> Result<Summary> {
    let env = open_env(config)?;
    let loaded = load_index(config).await?;
    let updater = Updater::new(&config.runtime, &config.provider, &loaded.index, &loaded.sources);

    let target = if names.is_empty() {
        UpdateTarget::All
    } else {
        UpdateTarget::Named(names.to_vec())
    };
    let outcome = updater.update(target, &env, config.jobs).await?;
    if outcome.items.is_empty() {
        println!("Nothing installed.");
    }

    Ok(print_batch(&outcome, |o| match o {
        UpdateOutcome::Updated { from, to } => format!("updated {} -> {}", from, to),
        UpdateOutcome::Skipped { version } => format!("{} is up to date", version),
        UpdateOutcome::Orphaned { version } => {
            format!("{} is no longer published by any enabled source", version)
        }
    }))
}
