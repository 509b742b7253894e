use anyhow::Result;
use log::debug;

use crate::application::{BatchOutcome, ItemResult, RemoveAction, Summary};
use crate::runtime::Runtime;

use super::config::Config;
use super::{open_env, print_batch};

/// Remove installed packages one at a time; each name gets its own result.
#[tracing::instrument(skip(config))]
pub fn remove<R: Runtime>(config: &Config<R>, names: &[String]) -> Result<Summary> {
    let env = open_env(config)?;
    debug!("Removing {:?} from {:?}", names, env.root());

    let action = RemoveAction::new(&config.runtime);
    let items = names
        .iter()
        .map(|name| ItemResult {
            name: name.clone(),
            result: action.remove(&env, name),
        })
        .collect();

    Ok(print_batch(&BatchOutcome::new(items), |record| {
        format!("removed {}", record.version)
    }))
}
