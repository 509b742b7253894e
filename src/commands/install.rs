use anyhow::Result;

use crate::application::{
    BatchOutcome, InstallOptions, InstallOutcome, InstallReport, Installer, ItemResult, Summary,
};
use crate::runtime::Runtime;

use super::config::Config;
use super::{load_index, open_env, print_batch};

fn render(report: &InstallReport) -> String {
    let mut line = match &report.outcome {
        InstallOutcome::Installed { version } => {
            format!("installed {} from {}", version, report.source_name)
        }
        InstallOutcome::Upgraded { from, to } => {
            format!("upgraded {} -> {} from {}", from, to, report.source_name)
        }
        InstallOutcome::AlreadyInstalled { version } => {
            format!("{} is already installed", version)
        }
    };
    for warning in &report.warnings {
        line.push_str(&format!("\n  warning {}", warning));
    }
    if !report.dependencies.is_empty() {
        line.push_str(&format!(
            "\n  requires: {} (not installed by sierra-pkg)",
            report.dependencies.join(", ")
        ));
    }
    line
}

/// Install `names`, optionally pinned to one source.
#[tracing::instrument(skip(config))]
pub async fn install<R: Runtime>(
    config: &Config<R>,
    names: &[String],
    source: Option<&str>,
    options: InstallOptions,
) -> Result<Summary> {
    let env = open_env(config)?;
    let loaded = load_index(config).await?;
    let installer = Installer::new(&config.runtime, &config.provider, &loaded.index, &loaded.sources);

    let outcome = match source {
        None => {
            installer
                .install_many(names, &env, options, config.jobs)
                .await
        }
        Some(source) => {
            let mut items = Vec::with_capacity(names.len());
            for name in names {
                let result = installer.install_from(name, source, &env, options).await;
                items.push(ItemResult {
                    name: name.clone(),
                    result,
                });
            }
            BatchOutcome::new(items)
        }
    };

    Ok(print_batch(&outcome, render))
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    #[test]
    fn test_render_lists_requirements() {
        let report = InstallReport {
            package: "whois".to_string(),
            source_name: "main".to_string(),
            outcome: InstallOutcome::Upgraded {
                from: Version::new(1, 0, 0),
                to: Version::new(1, 1, 0),
            },
            dependencies: vec!["python-whois".to_string()],
            warnings: Vec::new(),
        };
        assert_eq!(
            render(&report),
            "upgraded 1.0.0 -> 1.1.0 from main\n  requires: python-whois (not installed by sierra-pkg)"
        );
    }
}
