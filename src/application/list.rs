//! List action - reads what is installed in an environment.

use anyhow::Result;

use crate::package::{Environment, InstalledManifest, InstalledRecord};
use crate::runtime::Runtime;

pub struct ListAction<'a, R: Runtime> {
    runtime: &'a R,
}

impl<'a, R: Runtime> ListAction<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime }
    }

    /// Installed records sorted by package name.
    pub fn list(&self, env: &Environment) -> Result<Vec<InstalledRecord>> {
        let manifest = InstalledManifest::load(self.runtime, &env.manifest_path())?;
        Ok(manifest.records().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::record;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[test]
    fn test_list_sorted_by_name() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let env = Environment::open(&runtime, dir.path()).unwrap();
        let action = ListAction::new(&runtime);
        assert!(action.list(&env).unwrap().is_empty());

        let mut manifest = InstalledManifest::default();
        manifest.upsert(record("zeta", "1.0.0", "main"));
        manifest.upsert(record("alpha", "2.0.0", "main"));
        manifest.save(&runtime, &env.manifest_path()).unwrap();

        let names: Vec<_> = action
            .list(&env)
            .unwrap()
            .into_iter()
            .map(|r| r.package_name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
