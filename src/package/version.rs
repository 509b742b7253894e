//! Version parsing and comparison for packages.
//!
//! Manifests are written by hand, so versions are accepted leniently: a
//! leading `v` is dropped and missing minor/patch components count as zero.
//! Ordering is semver ordering.

use semver::Version;

/// Parse a manifest version string (`"1.2.3"`, `"v1.2"`, `"2"`).
pub fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    // Split off pre-release / build metadata before padding the core.
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let padded = match core.split('.').count() {
        1 if !core.is_empty() => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded)
}

/// True only when `candidate` is strictly newer than `installed`.
pub fn is_newer(candidate: &Version, installed: &Version) -> bool {
    candidate > installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_parse_with_v_prefix() {
        assert_eq!(parse_version("v1.0.0").unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_pads_missing_components() {
        assert_eq!(parse_version("2").unwrap(), Version::new(2, 0, 0));
        assert_eq!(parse_version("1.4").unwrap(), Version::new(1, 4, 0));
        assert_eq!(parse_version("1.4-beta.1").unwrap().to_string(), "1.4.0-beta.1");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_version("").is_err());
        assert!(parse_version("latest").is_err());
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("1.2.3.4").is_err());
    }

    #[test]
    fn test_ordering_is_semver_not_lexical() {
        assert!(parse_version("1.10.0").unwrap() > parse_version("1.9.0").unwrap());
        assert_eq!(parse_version("v2.0").unwrap(), parse_version("2.0.0").unwrap());
        assert!(parse_version("1.0.0-rc.1").unwrap() < parse_version("1.0.0").unwrap());
    }

    #[test]
    fn test_is_newer_never_downgrades() {
        let installed = Version::new(1, 2, 0);
        assert!(is_newer(&Version::new(1, 3, 0), &installed));
        assert!(!is_newer(&Version::new(1, 2, 0), &installed));
        assert!(!is_newer(&Version::new(1, 1, 9), &installed));
    }
}
