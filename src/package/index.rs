//! The merged package catalog across all enabled sources.
//!
//! Each refresh builds a brand new index; nothing is patched in place.
//! When several sources publish the same name, the source with the lowest
//! priority number wins and ties go to the lexically smaller source name.
//! The losers stay reachable through a source-scoped lookup.

use anyhow::Result;
use futures_util::{StreamExt, stream};
use log::{debug, warn};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::application::Summary;
use crate::error::{ErrorKind, PkgError};
use crate::registry::{FetchResult, RegistryFetcher};
use crate::runtime::Runtime;
use crate::source::Source;

use super::PackageDescriptor;

/// Category name for packages that declare none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// What happened to one source during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Fresh { packages: usize },
    /// Network failed; the cached manifest was used.
    Degraded { packages: usize },
    /// No cache exists yet (offline builds only).
    NoCache,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source_name: String,
    pub outcome: SourceOutcome,
    /// Set for fresh fetches only.
    pub fetch: Option<(chrono::DateTime<chrono::Utc>, String)>,
}

/// Per-source outcomes of a refresh, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub sources: Vec<SourceReport>,
}

impl RefreshReport {
    pub fn summary(&self) -> Summary {
        let failed = self
            .sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count();
        Summary::from_counts(self.sources.len() - failed, failed)
    }
}

/// Search filters. All given filters must match.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    pub tag: Option<String>,
    pub category: Option<String>,
    /// Restrict to one source, including packages another source shadows.
    pub source: Option<String>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub packages: usize,
    pub sources: usize,
    pub categories: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    /// Winner per package name.
    winners: BTreeMap<String, PackageDescriptor>,
    /// Every descriptor, winners and losers, in precedence order.
    all: Vec<PackageDescriptor>,
}

impl PackageIndex {
    /// Merge per-source results according to source priority.
    pub fn build(sources: &[Source], results: Vec<FetchResult>) -> Self {
        let priority: HashMap<&str, u32> = sources
            .iter()
            .map(|s| (s.name.as_str(), s.priority))
            .collect();

        let mut all: Vec<PackageDescriptor> =
            results.into_iter().flat_map(|r| r.descriptors).collect();
        all.sort_by(|a, b| {
            let pa = priority.get(a.source_name.as_str()).copied().unwrap_or(u32::MAX);
            let pb = priority.get(b.source_name.as_str()).copied().unwrap_or(u32::MAX);
            (pa, &a.source_name, &a.name).cmp(&(pb, &b.source_name, &b.name))
        });

        let mut winners: BTreeMap<String, PackageDescriptor> = BTreeMap::new();
        for descriptor in &all {
            if let Some(winner) = winners.get(&descriptor.name) {
                debug!(
                    "{} from {} is shadowed by {}",
                    descriptor.name, descriptor.source_name, winner.source_name
                );
                continue;
            }
            winners.insert(descriptor.name.clone(), descriptor.clone());
        }

        Self { winners, all }
    }

    /// Fetch every enabled source concurrently and build a fresh index.
    /// A failing source is reported; it never blocks the others.
    pub async fn refresh<R: Runtime>(
        sources: &[Source],
        fetcher: &RegistryFetcher<'_, R>,
        jobs: usize,
    ) -> (Self, RefreshReport) {
        let enabled: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();

        let fetched: Vec<(&Source, Result<FetchResult>)> = stream::iter(enabled)
            .map(|source| async move { (source, fetcher.fetch(source).await) })
            .buffered(jobs.max(1))
            .collect()
            .await;

        let mut report = RefreshReport::default();
        let mut results = Vec::new();
        for (source, result) in fetched {
            let mut fetch = None;
            let outcome = match result {
                Ok(r) => {
                    let packages = r.descriptors.len();
                    let outcome = if r.degraded {
                        SourceOutcome::Degraded { packages }
                    } else {
                        fetch = Some((r.fetched_at, r.manifest_hash.clone()));
                        SourceOutcome::Fresh { packages }
                    };
                    results.push(r);
                    outcome
                }
                Err(e) => {
                    warn!("Source {} failed: {:#}", source.name, e);
                    SourceOutcome::Failed {
                        kind: PkgError::kind_of(&e),
                        message: format!("{:#}", e),
                    }
                }
            };
            report.sources.push(SourceReport {
                source_name: source.name.clone(),
                outcome,
                fetch,
            });
        }

        (Self::build(sources, results), report)
    }

    /// Build the index from cached manifests only.
    pub fn from_cache<R: Runtime>(
        sources: &[Source],
        fetcher: &RegistryFetcher<'_, R>,
    ) -> (Self, RefreshReport) {
        let mut report = RefreshReport::default();
        let mut results = Vec::new();
        for source in sources.iter().filter(|s| s.enabled) {
            let outcome = match fetcher.load_cached(source) {
                Some(r) => {
                    let packages = r.descriptors.len();
                    results.push(r);
                    SourceOutcome::Fresh { packages }
                }
                None => SourceOutcome::NoCache,
            };
            report.sources.push(SourceReport {
                source_name: source.name.clone(),
                outcome,
                fetch: None,
            });
        }
        (Self::build(sources, results), report)
    }

    pub fn len(&self) -> usize {
        self.winners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    /// Case-insensitive substring search over name and description.
    ///
    /// Order: exact name match first, then relevance (number of
    /// occurrences), then name.
    pub fn search(&self, query: &SearchQuery) -> Vec<&PackageDescriptor> {
        let text = query.text.trim().to_lowercase();

        let candidates: Box<dyn Iterator<Item = &PackageDescriptor> + '_> = match &query.source {
            Some(source) => Box::new(self.all.iter().filter(move |d| &d.source_name == source)),
            None => Box::new(self.winners.values()),
        };

        let mut hits: Vec<(&PackageDescriptor, bool, usize)> = candidates
            .filter(|d| {
                text.is_empty()
                    || d.name.to_lowercase().contains(&text)
                    || d.description.to_lowercase().contains(&text)
            })
            .filter(|d| query.tag.as_deref().is_none_or(|t| d.has_tag(t)))
            .filter(|d| query.category.as_deref().is_none_or(|c| d.in_category(c)))
            .map(|d| {
                let exact = !text.is_empty() && d.name.to_lowercase() == text;
                (d, exact, d.relevance(&text))
            })
            .collect();

        hits.sort_by(|(a, a_exact, a_rel), (b, b_exact, b_rel)| {
            b_exact
                .cmp(a_exact)
                .then(b_rel.cmp(a_rel))
                .then(a.name.cmp(&b.name))
        });
        hits.into_iter().map(|(d, _, _)| d).collect()
    }

    /// The winning descriptor for `name`.
    pub fn info(&self, name: &str) -> Result<&PackageDescriptor> {
        self.winners
            .get(name)
            .ok_or_else(|| PkgError::not_found("package", name).into())
    }

    /// The descriptor `source` publishes for `name`, shadowed or not.
    pub fn info_in(&self, name: &str, source: &str) -> Result<&PackageDescriptor> {
        self.all
            .iter()
            .find(|d| d.name == name && d.source_name == source)
            .ok_or_else(|| PkgError::not_found("package", format!("{}@{}", name, source)).into())
    }

    pub fn version_of(&self, name: &str) -> Result<&Version> {
        Ok(&self.info(name)?.version)
    }

    /// Winners grouped by category; packages without one land in
    /// [`UNCATEGORIZED`].
    pub fn by_category(&self) -> BTreeMap<String, Vec<&PackageDescriptor>> {
        let mut groups: BTreeMap<String, Vec<&PackageDescriptor>> = BTreeMap::new();
        for d in self.winners.values() {
            let category = d.category.clone().unwrap_or_else(|| UNCATEGORIZED.to_string());
            groups.entry(category).or_default().push(d);
        }
        groups
    }

    pub fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self.all.iter().map(|d| d.source_name.as_str()).collect();
        let categories: BTreeSet<&str> = self
            .winners
            .values()
            .filter_map(|d| d.category.as_deref())
            .collect();
        IndexStats {
            packages: self.winners.len(),
            sources: sources.len(),
            categories: categories.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::descriptor;
    use crate::provider::MockProvider;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    fn result(source: &str, descriptors: Vec<PackageDescriptor>) -> FetchResult {
        FetchResult {
            source_name: source.to_string(),
            descriptors,
            degraded: false,
            fetched_at: chrono::Utc::now(),
            manifest_hash: String::new(),
        }
    }

    fn two_sources() -> Vec<Source> {
        vec![
            Source::new("community", "https://github.com/c/c").with_priority(20),
            Source::new("official", "https://github.com/o/o").with_priority(5),
        ]
    }

    #[test]
    fn test_lower_priority_number_wins() {
        let index = PackageIndex::build(
            &two_sources(),
            vec![
                result("community", vec![descriptor("whois", "9.0.0", "community")]),
                result("official", vec![descriptor("whois", "1.0.0", "official")]),
            ],
        );

        let winner = index.info("whois").unwrap();
        assert_eq!(winner.source_name, "official");
        assert_eq!(index.version_of("whois").unwrap(), &Version::new(1, 0, 0));

        let shadowed = index.info_in("whois", "community").unwrap();
        assert_eq!(shadowed.version, Version::new(9, 0, 0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_priority_tie_breaks_by_source_name() {
        let sources = vec![
            Source::new("beta", "https://github.com/b/b"),
            Source::new("alpha", "https://github.com/a/a"),
        ];
        let index = PackageIndex::build(
            &sources,
            vec![
                result("beta", vec![descriptor("dns", "1.0.0", "beta")]),
                result("alpha", vec![descriptor("dns", "1.0.0", "alpha")]),
            ],
        );
        assert_eq!(index.info("dns").unwrap().source_name, "alpha");
    }

    #[test]
    fn test_search_ordering_and_filters() {
        let mut exact = descriptor("dns", "1.0.0", "official");
        exact.description = "Resolver".into();
        let mut busy = descriptor("dns-walk", "1.0.0", "official");
        busy.description = "dns zone walk over dns".into();
        busy.tags.insert("recon".into());
        let mut once = descriptor("axfr", "1.0.0", "official");
        once.description = "Zone transfer via DNS".into();
        once.category = Some("Network".into());
        let other = descriptor("whois", "1.0.0", "official");

        let index = PackageIndex::build(
            &two_sources(),
            vec![result("official", vec![exact, busy, once, other])],
        );

        let names = |q: &SearchQuery| -> Vec<String> {
            index.search(q).into_iter().map(|d| d.name.clone()).collect()
        };

        assert_eq!(names(&SearchQuery::text("DNS")), vec!["dns", "dns-walk", "axfr"]);
        assert_eq!(names(&SearchQuery::text("")).len(), 4);
        assert_eq!(
            names(&SearchQuery {
                text: "dns".into(),
                tag: Some("RECON".into()),
                ..Default::default()
            }),
            vec!["dns-walk"]
        );
        assert_eq!(
            names(&SearchQuery {
                category: Some("network".into()),
                ..Default::default()
            }),
            vec!["axfr"]
        );
        assert!(names(&SearchQuery::text("nothing-matches")).is_empty());
    }

    #[test]
    fn test_search_source_filter_reaches_shadowed() {
        let index = PackageIndex::build(
            &two_sources(),
            vec![
                result("community", vec![descriptor("whois", "2.0.0", "community")]),
                result("official", vec![descriptor("whois", "1.0.0", "official")]),
            ],
        );

        let unscoped = index.search(&SearchQuery::text("whois"));
        assert_eq!(unscoped.len(), 1);
        assert_eq!(unscoped[0].source_name, "official");

        let scoped = index.search(&SearchQuery {
            text: "whois".into(),
            source: Some("community".into()),
            ..Default::default()
        });
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].version, Version::new(2, 0, 0));
    }

    #[test]
    fn test_info_not_found() {
        let index = PackageIndex::default();
        let err = index.info("ghost").unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::NotFound);
        assert!(index.version_of("ghost").is_err());
    }

    #[test]
    fn test_by_category_and_stats() {
        let mut a = descriptor("a", "1.0.0", "official");
        a.category = Some("Recon".into());
        let b = descriptor("b", "1.0.0", "community");
        let index = PackageIndex::build(
            &two_sources(),
            vec![result("official", vec![a]), result("community", vec![b])],
        );

        let groups = index.by_category();
        assert_eq!(groups["Recon"].len(), 1);
        assert_eq!(groups[UNCATEGORIZED][0].name, "b");
        assert_eq!(
            index.stats(),
            IndexStats {
                packages: 2,
                sources: 2,
                categories: 1
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_refresh_isolates_failing_sources() {
        let runtime = RealRuntime;
        let dir = tempdir().unwrap();
        let mut provider = MockProvider::new();
        provider.expect_fetch_manifest().returning(|source| {
            if source.name == "official" {
                Ok(r#"{"packages": {"whois": {"version": "1.0.0", "description": "d", "path": "whois"}}}"#.to_string())
            } else {
                Err(anyhow::anyhow!("connection refused"))
            }
        });

        let mut sources = two_sources();
        sources.push(Source::new("disabled", "https://github.com/d/d"));
        sources[2].enabled = false;

        let fetcher = RegistryFetcher::new(&runtime, &provider, dir.path());
        let (index, report) = PackageIndex::refresh(&sources, &fetcher, 4).await;

        assert_eq!(index.info("whois").unwrap().source_name, "official");
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.summary(), Summary::Partial);

        let community = &report.sources[0];
        assert_eq!(community.source_name, "community");
        assert!(matches!(
            community.outcome,
            SourceOutcome::Failed {
                kind: ErrorKind::SourceUnreachable,
                ..
            }
        ));
        assert!(report.sources[1].fetch.is_some());

        let (cached, cache_report) = PackageIndex::from_cache(&sources, &fetcher);
        assert_eq!(cached.len(), 1);
        assert_eq!(cache_report.sources[0].outcome, SourceOutcome::NoCache);
    }
}
