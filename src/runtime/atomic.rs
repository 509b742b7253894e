//! Atomic file replacement: write a sibling temp file, then rename over the
//! target. A reader sees either the old content or the new content, never a
//! partial file.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::Runtime;

/// Sibling temp path used while `path` is being replaced: `<dir>/.<name>.tmp`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_name = format!(".{}.tmp", name);
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

/// Replace `path` with `contents` via temp file + rename.
///
/// On failure the temp file is removed and `path` keeps its previous content.
pub fn write_atomic<R: Runtime + ?Sized>(runtime: &R, path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_path_for(path);
    debug!("Writing {:?} via {:?}", path, tmp);

    if let Err(e) = runtime.write(&tmp, contents) {
        discard_temp(runtime, &tmp);
        return Err(e).with_context(|| format!("Failed to write temp file for {:?}", path));
    }

    if let Err(e) = runtime.rename(&tmp, path) {
        discard_temp(runtime, &tmp);
        return Err(e).with_context(|| format!("Failed to move new content into {:?}", path));
    }

    Ok(())
}

fn discard_temp<R: Runtime + ?Sized>(runtime: &R, tmp: &Path) {
    if runtime.exists(tmp)
        && let Err(e) = runtime.remove_file(tmp)
    {
        warn!("Failed to remove temp file {:?}: {}", tmp, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/env/installed.json")),
            PathBuf::from("/env/.installed.json.tmp")
        );
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let target = dir.path().join("state.json");

        write_atomic(&runtime, &target, b"one").unwrap();
        write_atomic(&runtime, &target, b"two").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "two");
        assert!(!temp_path_for(&target).exists());
    }

    #[test]
    fn test_write_atomic_rename_failure_cleans_temp() {
        let mut runtime = MockRuntime::new();
        let target = PathBuf::from("/env/installed.json");
        let tmp = PathBuf::from("/env/.installed.json.tmp");

        runtime
            .expect_write()
            .with(eq(tmp.clone()), eq(b"new".to_vec()))
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_rename()
            .with(eq(tmp.clone()), eq(target.clone()))
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("simulated crash before rename")));
        runtime
            .expect_exists()
            .with(eq(tmp.clone()))
            .returning(|_| true);
        runtime
            .expect_remove_file()
            .with(eq(tmp))
            .times(1)
            .returning(|_| Ok(()));

        let err = write_atomic(&runtime, &target, b"new").unwrap_err();
        assert!(err.to_string().contains("installed.json"));
    }
}
