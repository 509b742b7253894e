use anyhow::{Context, Result};
use std::path::Path;

use crate::application::Summary;
use crate::runtime::Runtime;
use crate::validator::InterfaceValidator;

/// Statically check a script file, optionally with its `metadata.json`.
#[tracing::instrument(skip(runtime))]
pub fn validate<R: Runtime>(
    runtime: &R,
    script: &Path,
    metadata: Option<&Path>,
    json: bool,
) -> Result<Summary> {
    let text = runtime
        .read_to_string(script)
        .with_context(|| format!("Failed to read {}", script.display()))?;
    let metadata_text = metadata
        .map(|path| {
            runtime
                .read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .transpose()?;

    let report = InterfaceValidator::validate_package(&text, metadata_text.as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for d in &report.errors {
            println!("{}:{}: error: {}", script.display(), d.location, d.message);
        }
        for d in &report.warnings {
            println!("{}:{}: warning: {}", script.display(), d.location, d.message);
        }
        println!(
            "{}: {} ({} error(s), {} warning(s))",
            script.display(),
            if report.is_valid { "valid" } else { "invalid" },
            report.errors.len(),
            report.warnings.len()
        );
    }

    Ok(if report.is_valid {
        Summary::Success
    } else {
        Summary::Failure
    })
}
