use anyhow::Result;
use log::debug;

use crate::application::{ListAction, Summary};
use crate::runtime::Runtime;

use super::config::Config;
use super::open_env;

/// List installed packages
#[tracing::instrument(skip(config))]
pub fn list<R: Runtime>(config: &Config<R>) -> Result<Summary> {
    let env = open_env(config)?;
    debug!("Listing packages in {:?}", env.root());

    let records = ListAction::new(&config.runtime).list(&env)?;
    if records.is_empty() {
        println!("No packages installed.");
    }
    for record in records {
        println!(
            "{} {} [{}] installed {}",
            record.package_name,
            record.version,
            record.source_name,
            record.installed_at.format("%Y-%m-%d")
        );
    }
    Ok(Summary::Success)
}
