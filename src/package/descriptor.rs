use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// File every package directory must contain.
pub const SCRIPT_FILE: &str = "invoker.py";
/// Optional sidecar describing the entry routine and its options.
pub const METADATA_FILE: &str = "metadata.json";

/// One package as published by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: Version,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source_name: String,
    /// Directory of the package, relative to the source root.
    pub path: String,
    /// Third-party requirement names, informational only.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PackageDescriptor {
    pub fn script_path(&self) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), SCRIPT_FILE)
    }

    pub fn metadata_path(&self) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), METADATA_FILE)
    }

    /// How often `query` (already lowercased) occurs in name and description.
    pub fn relevance(&self, query: &str) -> usize {
        if query.is_empty() {
            return 0;
        }
        self.name.to_lowercase().matches(query).count()
            + self.description.to_lowercase().matches(query).count()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
    }
}

/// Installed file name for a package: `-` becomes `_`, plus `.py`.
pub fn install_file_name(package_name: &str) -> String {
    format!("{}.py", package_name.replace('-', "_"))
}

#[cfg(test)]
pub(crate) fn descriptor(name: &str, version: &str, source: &str) -> PackageDescriptor {
    PackageDescriptor {
        name: name.to_string(),
        version: super::parse_version(version).unwrap(),
        description: format!("{} package", name),
        author: None,
        tags: BTreeSet::new(),
        category: None,
        source_name: source.to_string(),
        path: name.to_string(),
        dependencies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let mut d = descriptor("whois-lookup", "1.0.0", "main");
        d.path = "osint/whois/".into();
        assert_eq!(d.script_path(), "osint/whois/invoker.py");
        assert_eq!(d.metadata_path(), "osint/whois/metadata.json");
        assert_eq!(install_file_name(&d.name), "whois_lookup.py");
    }

    #[test]
    fn test_relevance_counts_occurrences() {
        let mut d = descriptor("dns-scan", "1.0.0", "main");
        d.description = "DNS records and dns zone walking".into();
        assert_eq!(d.relevance("dns"), 3);
        assert_eq!(d.relevance("zone"), 1);
        assert_eq!(d.relevance("whois"), 0);
    }

    #[test]
    fn test_tag_and_category_case_insensitive() {
        let mut d = descriptor("whois", "1.0.0", "main");
        d.tags.insert("OSINT".into());
        d.category = Some("Recon".into());
        assert!(d.has_tag("osint"));
        assert!(d.in_category("recon"));
        assert!(!d.in_category("web"));
    }
}
