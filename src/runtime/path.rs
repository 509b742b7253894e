//! Lexical path checks. Nothing here touches the file system.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if `path` is under `dir`, comparing normalized components.
///
/// `/env/scripts/../../etc/passwd` is NOT under `/env/scripts`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// A manifest-supplied relative path is safe when it is non-empty, relative,
/// and never climbs out of its base with `..`.
pub fn is_safe_relative(path: &str) -> bool {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || path.starts_with('/') || path.contains('\\') {
        return false;
    }
    Path::new(trimmed)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_parent_dir() {
        assert_eq!(
            normalize_path(Path::new("/env/scripts/../cache")),
            PathBuf::from("/env/cache")
        );
    }

    #[test]
    fn test_normalize_path_with_dot() {
        assert_eq!(
            normalize_path(Path::new("/env/./scripts/.")),
            PathBuf::from("/env/scripts")
        );
    }

    #[test]
    fn test_is_path_under_simple() {
        assert!(is_path_under(
            Path::new("/env/scripts/whois.py"),
            Path::new("/env/scripts")
        ));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        assert!(!is_path_under(
            Path::new("/env/scripts2/whois.py"),
            Path::new("/env/scripts")
        ));
    }

    #[test]
    fn test_is_path_under_directory_traversal_attack() {
        assert!(!is_path_under(
            Path::new("/env/scripts/../../etc/passwd"),
            Path::new("/env/scripts")
        ));
    }

    #[test]
    fn test_is_safe_relative() {
        assert!(is_safe_relative("packages/whois"));
        assert!(is_safe_relative("whois/"));
        assert!(is_safe_relative("./whois"));
        assert!(!is_safe_relative(""));
        assert!(!is_safe_relative("/etc"));
        assert!(!is_safe_relative("../outside"));
        assert!(!is_safe_relative("a/../../b"));
        assert!(!is_safe_relative("a\\b"));
    }
}
