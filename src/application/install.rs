//! Install use case - resolves, fetches, validates and commits one package.
//!
//! Network work happens first and without any lock. The commit step takes
//! the environment lock, writes the script atomically, then rewrites the
//! installed manifest; if the manifest write fails the script is put back
//! the way it was.

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use semver::Version;
use std::path::Path;

use crate::error::PkgError;
use crate::package::{Environment, InstalledManifest, InstalledRecord, PackageDescriptor, PackageIndex};
use crate::provider::Provider;
use crate::registry::manifest_hash;
use crate::runtime::{Runtime, is_path_under, write_atomic};
use crate::source::Source;
use crate::validator::{Diagnostic, InterfaceValidator, ScriptMetadata};

use super::batch::{BatchOutcome, ItemResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Reinstall even when the same version is already installed.
    pub force: bool,
    pub skip_validation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { version: Version },
    Upgraded { from: Version, to: Version },
    AlreadyInstalled { version: Version },
}

impl InstallOutcome {
    pub fn version(&self) -> &Version {
        match self {
            InstallOutcome::Installed { version } | InstallOutcome::AlreadyInstalled { version } => {
                version
            }
            InstallOutcome::Upgraded { to, .. } => to,
        }
    }
}

/// What one install did, plus the requirements the caller still has to
/// provide. Those are reported, never installed.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub package: String,
    pub source_name: String,
    pub outcome: InstallOutcome,
    pub dependencies: Vec<String>,
    pub warnings: Vec<Diagnostic>,
}

pub struct Installer<'a, R: Runtime> {
    runtime: &'a R,
    provider: &'a dyn Provider,
    index: &'a PackageIndex,
    sources: &'a [Source],
}

impl<'a, R: Runtime> Installer<'a, R> {
    pub fn new(
        runtime: &'a R,
        provider: &'a dyn Provider,
        index: &'a PackageIndex,
        sources: &'a [Source],
    ) -> Self {
        Self {
            runtime,
            provider,
            index,
            sources,
        }
    }

    /// Install the winning descriptor for `name`.
    pub async fn install(
        &self,
        name: &str,
        env: &Environment,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let descriptor = self.index.info(name)?;
        self.install_descriptor(descriptor, env, options).await
    }

    /// Install `name` as published by one specific source.
    pub async fn install_from(
        &self,
        name: &str,
        source_name: &str,
        env: &Environment,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let descriptor = self.index.info_in(name, source_name)?;
        self.install_descriptor(descriptor, env, options).await
    }

    /// Install several packages concurrently. Each name gets its own result;
    /// one failure never undoes or blocks the others.
    pub async fn install_many(
        &self,
        names: &[String],
        env: &Environment,
        options: InstallOptions,
        jobs: usize,
    ) -> BatchOutcome<InstallReport> {
        let items = stream::iter(names)
            .map(|name| async move {
                let result = self.install(name, env, options).await;
                if let Err(e) = &result {
                    warn!("Install of {} failed: {:#}", name, e);
                }
                ItemResult {
                    name: name.clone(),
                    result,
                }
            })
            .buffered(jobs.max(1))
            .collect()
            .await;
        BatchOutcome::new(items)
    }

    async fn install_descriptor(
        &self,
        descriptor: &PackageDescriptor,
        env: &Environment,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        let manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        if !options.force
            && let Some(existing) = manifest.get(&descriptor.name)
            && existing.version == descriptor.version
        {
            info!(
                "{} {} is already installed",
                descriptor.name, descriptor.version
            );
            return Ok(InstallReport {
                package: descriptor.name.clone(),
                source_name: existing.source_name.clone(),
                outcome: InstallOutcome::AlreadyInstalled {
                    version: existing.version.clone(),
                },
                dependencies: descriptor.dependencies.clone(),
                warnings: Vec::new(),
            });
        }

        let source = self
            .sources
            .iter()
            .find(|s| s.name == descriptor.source_name)
            .ok_or_else(|| PkgError::not_found("source", &descriptor.source_name))?;

        debug!("Fetching {} from {}", descriptor.name, source.name);
        let script = self
            .provider
            .fetch_file(source, &descriptor.script_path())
            .await?
            .ok_or_else(|| PkgError::not_found("script", descriptor.script_path()))?;
        let metadata_text = self
            .provider
            .fetch_file(source, &descriptor.metadata_path())
            .await?;

        let report = InterfaceValidator::validate_package(&script, metadata_text.as_deref());
        if !report.is_valid {
            if !options.skip_validation {
                return Err(PkgError::ValidationFailed {
                    package: descriptor.name.clone(),
                    report,
                }
                .into());
            }
            warn!(
                "Installing {} despite {} validation error(s)",
                descriptor.name,
                report.errors.len()
            );
        }

        let previous = self.commit(env, descriptor, &script)?;
        let outcome = match previous {
            Some(from) if from != descriptor.version => InstallOutcome::Upgraded {
                from,
                to: descriptor.version.clone(),
            },
            _ => InstallOutcome::Installed {
                version: descriptor.version.clone(),
            },
        };
        info!("Installed {} {}", descriptor.name, descriptor.version);

        let metadata = metadata_text
            .as_deref()
            .and_then(|text| ScriptMetadata::parse(text).ok());
        Ok(InstallReport {
            package: descriptor.name.clone(),
            source_name: descriptor.source_name.clone(),
            outcome,
            dependencies: merge_dependencies(descriptor, metadata.as_ref()),
            warnings: report.warnings,
        })
    }

    /// Write the script and its manifest record under the environment lock.
    /// Returns the version that was installed before, if any.
    fn commit(
        &self,
        env: &Environment,
        descriptor: &PackageDescriptor,
        script: &str,
    ) -> Result<Option<Version>> {
        let target = env.script_path(&descriptor.name);
        if !is_path_under(&target, &env.scripts_dir()) {
            return Err(PkgError::Config(format!(
                "refusing to write {} outside {}",
                target.display(),
                env.scripts_dir().display()
            ))
            .into());
        }
        env.ensure_scripts_dir(self.runtime)?;

        let _lock = self.runtime.lock_exclusive(&env.lock_path())?;
        let mut manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        if let Some(owner) = manifest
            .records()
            .find(|r| r.install_path == target && r.package_name != descriptor.name)
        {
            return Err(PkgError::Config(format!(
                "{} would overwrite {}, which belongs to installed package '{}'",
                descriptor.name,
                target.display(),
                owner.package_name
            ))
            .into());
        }

        let previous_script = if self.runtime.exists(&target) {
            Some(self.runtime.read_to_string(&target)?)
        } else {
            None
        };

        write_atomic(self.runtime, &target, script.as_bytes())
            .map_err(|e| PkgError::Io(format!("{:#}", e)))
            .with_context(|| format!("Failed to install {}", descriptor.name))?;

        let previous = manifest.upsert(InstalledRecord {
            package_name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            source_name: descriptor.source_name.clone(),
            install_path: target.clone(),
            installed_at: Utc::now(),
            checksum: manifest_hash(script),
        });

        if let Err(e) = manifest.save(self.runtime, &env.manifest_path()) {
            self.restore(&target, previous_script.as_deref());
            return Err(PkgError::Io(format!("{:#}", e)))
                .with_context(|| format!("Failed to record {}", descriptor.name));
        }

        Ok(previous.map(|r| r.version))
    }

    fn restore(&self, target: &Path, previous: Option<&str>) {
        let result = match previous {
            Some(text) => write_atomic(self.runtime, target, text.as_bytes()),
            None => self.runtime.remove_file(target),
        };
        if let Err(e) = result {
            warn!("Failed to roll back {:?}: {:#}", target, e);
        }
    }
}

fn merge_dependencies(
    descriptor: &PackageDescriptor,
    metadata: Option<&ScriptMetadata>,
) -> Vec<String> {
    let mut deps = descriptor.dependencies.clone();
    for dep in metadata.iter().flat_map(|m| &m.requirements) {
        if !deps.contains(dep) {
            deps.push(dep.clone());
        }
    }
    deps
}

#[cfg(test)]
pub(crate) const TEST_SCRIPT: &str = r#"import sierra

invoker = sierra.InvokerScript(name="demo", description="Demo tool")


@invoker.entry_point
def run(
    target: sierra.Param[str | None, sierra.SierraOption(description="Target")]
) -> None:
    sierra.respond(target)


def load(client: sierra.SierraDevelopmentClient) -> None:
    client.load_invoker(invoker)
"#;
