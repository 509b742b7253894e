//! `registry.json` schema and its validation.
//!
//! ```json
//! { "packages": { "whois": { "name": "whois", "version": "1.0.0",
//!   "description": "...", "path": "whois", "tags": ["osint"] } } }
//! ```
//!
//! A manifest is accepted or rejected as a whole: one bad entry makes the
//! entire document corrupt.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::PkgError;
use crate::package::{PackageDescriptor, parse_version};
use crate::runtime::is_safe_relative;

#[derive(Debug, Deserialize)]
struct RawManifest {
    packages: Option<BTreeMap<String, RawPackage>>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    category: Option<String>,
    path: Option<String>,
    #[serde(default, alias = "requirements")]
    dependencies: Vec<String>,
}

/// Package names end up in file names, so keep them boring.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parse and schema-check a manifest published by `source_name`.
/// Descriptors come back in name order.
pub fn parse_manifest(source_name: &str, text: &str) -> Result<Vec<PackageDescriptor>, PkgError> {
    let corrupt = |reason: String| PkgError::ManifestCorrupt {
        source_name: source_name.to_string(),
        reason,
    };

    let raw: RawManifest =
        serde_json::from_str(text).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?;
    let packages = raw
        .packages
        .ok_or_else(|| corrupt("missing 'packages' object".to_string()))?;

    let mut descriptors = Vec::with_capacity(packages.len());
    for (key, pkg) in packages {
        let name = pkg.name.unwrap_or_else(|| key.clone());
        if name != key {
            return Err(corrupt(format!(
                "entry '{}' declares mismatching name '{}'",
                key, name
            )));
        }
        if !is_valid_package_name(&name) {
            return Err(corrupt(format!("invalid package name '{}'", name)));
        }

        let raw_version = pkg
            .version
            .ok_or_else(|| corrupt(format!("package '{}' has no version", name)))?;
        let version = parse_version(&raw_version).map_err(|e| {
            corrupt(format!(
                "package '{}' has malformed version '{}': {}",
                name, raw_version, e
            ))
        })?;

        let description = pkg
            .description
            .ok_or_else(|| corrupt(format!("package '{}' has no description", name)))?;

        let path = pkg
            .path
            .ok_or_else(|| corrupt(format!("package '{}' has no path", name)))?;
        if !is_safe_relative(&path) {
            return Err(corrupt(format!(
                "package '{}' has unsafe path '{}'",
                name, path
            )));
        }

        descriptors.push(PackageDescriptor {
            name,
            version,
            description,
            author: pkg.author.filter(|a| !a.trim().is_empty()),
            tags: pkg
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            category: pkg.category.filter(|c| !c.trim().is_empty()),
            source_name: source_name.to_string(),
            path: path.trim_matches('/').to_string(),
            dependencies: pkg.dependencies,
        });
    }

    Ok(descriptors)
}
