//! Remove action - deletes an installed script and its manifest record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::error::PkgError;
use crate::package::{Environment, InstalledManifest, InstalledRecord};
use crate::runtime::{Runtime, is_path_under};

pub struct RemoveAction<'a, R: Runtime> {
    runtime: &'a R,
}

/// Where a script waits while the manifest is rewritten: `.<file>.removing`.
fn aside_path(script: &Path) -> PathBuf {
    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    script.with_file_name(format!(".{}.removing", name))
}

impl<'a, R: Runtime> RemoveAction<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Remove `name` from `env`.
    ///
    /// The script recorded at install time is moved aside, the manifest
    /// rewritten, and only then is the moved file deleted. If the manifest
    /// cannot be written the script is moved back. A file that another record
    /// still points at is left in place. Removing something that is not
    /// installed is `NotFound`.
    pub fn remove(&self, env: &Environment, name: &str) -> Result<InstalledRecord> {
        let _lock = self.runtime.lock_exclusive(&env.lock_path())?;
        let mut manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        let record = manifest
            .remove(name)
            .ok_or_else(|| PkgError::not_found("installed package", name))?;

        let script = record.install_path.clone();
        if !is_path_under(&script, &env.scripts_dir()) {
            return Err(PkgError::Config(format!(
                "refusing to delete {} outside {}",
                script.display(),
                env.scripts_dir().display()
            ))
            .into());
        }
        let shared = manifest.records().any(|r| r.install_path == script);
        if shared {
            warn!("Keeping {:?}: another package still owns it", script);
        }

        let aside = aside_path(&script);
        let moved = !shared && self.runtime.exists(&script);
        if moved {
            self.runtime
                .rename(&script, &aside)
                .map_err(|e| PkgError::Io(format!("{:#}", e)))
                .with_context(|| format!("Failed to remove {}", name))?;
        } else {
            debug!("Script for {} already gone: {:?}", name, script);
        }

        if let Err(e) = manifest.save(self.runtime, &env.manifest_path()) {
            if moved && let Err(restore) = self.runtime.rename(&aside, &script) {
                warn!("Failed to restore {:?}: {:#}", script, restore);
            }
            return Err(PkgError::Io(format!("{:#}", e)))
                .with_context(|| format!("Failed to record removal of {}", name));
        }

        if moved && let Err(e) = self.runtime.remove_file(&aside) {
            warn!("Failed to delete {:?}: {:#}", aside, e);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::package::record;
    use crate::runtime::{FileLock, MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_aside_path() {
        assert_eq!(
            aside_path(Path::new("/env/scripts/demo.py")),
            PathBuf::from("/env/scripts/.demo.py.removing")
        );
    }

    #[test]
    fn test_remove_twice() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let env = Environment::open(&runtime, dir.path()).unwrap();
        env.ensure_scripts_dir(&runtime).unwrap();
        std::fs::write(env.script_path("demo"), "x").unwrap();

        let mut manifest = InstalledManifest::default();
        for name in ["demo", "other"] {
            let mut r = record(name, "1.0.0", "main");
            r.install_path = env.script_path(name);
            manifest.upsert(r);
        }
        manifest.save(&runtime, &env.manifest_path()).unwrap();

        let action = RemoveAction::new(&runtime);
        let removed = action.remove(&env, "demo").unwrap();
        assert_eq!(removed.package_name, "demo");
        assert!(!env.script_path("demo").exists());
        assert!(!aside_path(&env.script_path("demo")).exists());

        let manifest = InstalledManifest::load(&runtime, &env.manifest_path()).unwrap();
        assert!(!manifest.contains("demo"));
        assert!(manifest.contains("other"));

        let err = action.remove(&env, "demo").unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::NotFound);
    }

    #[test]
    fn test_manifest_failure_restores_script() {
        let mut runtime = MockRuntime::new();
        let script = PathBuf::from("/env/scripts/demo.py");
        let aside = PathBuf::from("/env/scripts/.demo.py.removing");
        let manifest_json = {
            let mut m = InstalledManifest::default();
            m.upsert(record("demo", "1.0.0", "main"));
            serde_json::to_string(&m).unwrap()
        };

        runtime.expect_is_dir().returning(|_| true);
        runtime
            .expect_lock_exclusive()
            .returning(|p| Ok(FileLock::detached(p)));
        runtime
            .expect_exists()
            .returning(|p| p.ends_with("installed.json") || p.ends_with("demo.py"));
        runtime
            .expect_read_to_string()
            .returning(move |_| Ok(manifest_json.clone()));
        runtime
            .expect_rename()
            .with(eq(script.clone()), eq(aside.clone()))
            .times(1)
            .returning(|_, _| Ok(()));
        runtime
            .expect_write()
            .returning(|_, _| Err(anyhow::anyhow!("disk full")));
        runtime
            .expect_remove_file()
            .withf(|p| p.ends_with(".installed.json.tmp"))
            .returning(|_| Ok(()));
        runtime
            .expect_rename()
            .with(eq(aside), eq(script))
            .times(1)
            .returning(|_, _| Ok(()));

        let env = Environment::open(&runtime, Path::new("/env")).unwrap();
        let err = RemoveAction::new(&runtime).remove(&env, "demo").unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::Io);
    }

    #[test]
    fn test_remove_deletes_recorded_path_only() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let env = Environment::open(&runtime, dir.path()).unwrap();
        env.ensure_scripts_dir(&runtime).unwrap();

        let shared = env.script_path("port_scanner");
        std::fs::write(&shared, "x").unwrap();
        let mut manifest = InstalledManifest::default();
        for name in ["port-scanner", "port_scanner"] {
            let mut r = record(name, "1.0.0", "main");
            r.install_path = shared.clone();
            manifest.upsert(r);
        }
        manifest.save(&runtime, &env.manifest_path()).unwrap();

        RemoveAction::new(&runtime)
            .remove(&env, "port-scanner")
            .unwrap();

        let manifest = InstalledManifest::load(&runtime, &env.manifest_path()).unwrap();
        assert!(manifest.contains("port_scanner"));
        assert!(shared.exists());
    }

    #[test]
    fn test_remove_refuses_path_outside_scripts() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let env = Environment::open(&runtime, dir.path()).unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "x").unwrap();

        let mut r = record("demo", "1.0.0", "main");
        r.install_path = outside.clone();
        let mut manifest = InstalledManifest::default();
        manifest.upsert(r);
        manifest.save(&runtime, &env.manifest_path()).unwrap();

        let err = RemoveAction::new(&runtime).remove(&env, "demo").unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::Config);
        assert!(outside.exists());
    }
}
