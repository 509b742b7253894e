//! Update action - compares installed records with the index and
//! reinstalls whatever has a newer version available.

use anyhow::Result;
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use semver::Version;

use crate::error::PkgError;
use crate::package::{Environment, InstalledManifest, InstalledRecord, PackageIndex, is_newer};
use crate::provider::Provider;
use crate::runtime::Runtime;
use crate::source::Source;

use super::batch::{BatchOutcome, ItemResult};
use super::install::{InstallOptions, Installer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    pub name: String,
    pub installed: Version,
    pub available: Version,
    pub source_name: String,
}

/// Installed records split by how they compare with the index.
#[derive(Debug, Clone, Default)]
pub struct UpgradeReport {
    pub upgradable: Vec<UpgradeCandidate>,
    pub up_to_date: Vec<InstalledRecord>,
    /// Installed, but no enabled source publishes them any more.
    pub orphaned: Vec<InstalledRecord>,
}

#[derive(Debug, Clone)]
pub enum UpdateTarget {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { from: Version, to: Version },
    Skipped { version: Version },
    /// Installed, but no enabled source publishes it; left as is.
    Orphaned { version: Version },
}

pub struct Updater<'a, R: Runtime> {
    runtime: &'a R,
    index: &'a PackageIndex,
    installer: Installer<'a, R>,
}

impl<'a, R: Runtime> Updater<'a, R> {
    pub fn new(
        runtime: &'a R,
        provider: &'a dyn Provider,
        index: &'a PackageIndex,
        sources: &'a [Source],
    ) -> Self {
        Self {
            runtime,
            index,
            installer: Installer::new(runtime, provider, index, sources),
        }
    }

    pub fn upgradable(&self, env: &Environment) -> Result<UpgradeReport> {
        let manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        Ok(self.classify(&manifest))
    }

    fn classify(&self, manifest: &InstalledManifest) -> UpgradeReport {
        let mut report = UpgradeReport::default();
        for record in manifest.records() {
            match self.index.info(&record.package_name) {
                Err(_) => report.orphaned.push(record.clone()),
                Ok(d) if is_newer(&d.version, &record.version) => {
                    report.upgradable.push(UpgradeCandidate {
                        name: record.package_name.clone(),
                        installed: record.version.clone(),
                        available: d.version.clone(),
                        source_name: d.source_name.clone(),
                    })
                }
                Ok(_) => report.up_to_date.push(record.clone()),
            }
        }
        report
    }

    /// Reinstall every upgradable target. Each target gets its own result:
    /// names that are not installed fail with `NotFound`, up-to-date ones
    /// are skipped.
    pub async fn update(
        &self,
        target: UpdateTarget,
        env: &Environment,
        jobs: usize,
    ) -> Result<BatchOutcome<UpdateOutcome>> {
        let manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        let names: Vec<String> = match target {
            UpdateTarget::All => manifest.records().map(|r| r.package_name.clone()).collect(),
            UpdateTarget::Named(names) => names,
        };
        debug!("Updating {} package(s)", names.len());

        let manifest = &manifest;
        let items = stream::iter(names)
            .map(|name| async move {
                let result = self.update_one(&name, manifest, env).await;
                if let Err(e) = &result {
                    warn!("Update of {} failed: {:#}", name, e);
                }
                ItemResult { name, result }
            })
            .buffered(jobs.max(1))
            .collect()
            .await;
        Ok(BatchOutcome::new(items))
    }

    async fn update_one(
        &self,
        name: &str,
        manifest: &InstalledManifest,
        env: &Environment,
    ) -> Result<UpdateOutcome> {
        let record = manifest
            .get(name)
            .ok_or_else(|| PkgError::not_found("installed package", name))?;
        let Ok(available) = self.index.version_of(name) else {
            debug!("{} is orphaned, leaving {} in place", name, record.version);
            return Ok(UpdateOutcome::Orphaned {
                version: record.version.clone(),
            });
        };

        if !is_newer(available, &record.version) {
            return Ok(UpdateOutcome::Skipped {
                version: record.version.clone(),
            });
        }

        let options = InstallOptions {
            force: true,
            skip_validation: false,
        };
        let report = self.installer.install(name, env, options).await?;
        info!("Updated {} {} -> {}", name, record.version, report.outcome.version());
        Ok(UpdateOutcome::Updated {
            from: record.version.clone(),
            to: report.outcome.version().clone(),
        })
    }
}
