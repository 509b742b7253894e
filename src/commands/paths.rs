use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// `~/.sierra`
#[tracing::instrument(skip(runtime))]
pub fn default_home<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".sierra"))
}
