use anyhow::Result;
use log::debug;

use crate::application::Summary;
use crate::package::{Environment, InstalledManifest, PackageDescriptor, SearchQuery};
use crate::runtime::Runtime;

use super::config::Config;
use super::load_index;

fn summary_line(d: &PackageDescriptor) -> String {
    format!("{} {} [{}] - {}", d.name, d.version, d.source_name, d.description)
}

/// Search the index. Without any filter, list every package by category.
#[tracing::instrument(skip(config))]
pub async fn search<R: Runtime>(config: &Config<R>, query: &SearchQuery) -> Result<Summary> {
    let loaded = load_index(config).await?;
    let index = &loaded.index;

    let unfiltered = query.text.trim().is_empty()
        && query.tag.is_none()
        && query.category.is_none()
        && query.source.is_none();
    if unfiltered {
        let stats = index.stats();
        println!(
            "{} package(s) from {} source(s) in {} categories",
            stats.packages, stats.sources, stats.categories
        );
        for (category, packages) in index.by_category() {
            println!("\n{}:", category);
            for d in packages {
                println!("  {}", summary_line(d));
            }
        }
        return Ok(Summary::Success);
    }

    let hits = index.search(query);
    debug!("{} hit(s) for {:?}", hits.len(), query);
    if hits.is_empty() {
        println!("No packages found.");
    }
    for d in hits {
        println!("{}", summary_line(d));
    }
    Ok(Summary::Success)
}

#[tracing::instrument(skip(config))]
pub async fn info<R: Runtime>(config: &Config<R>, name: &str, source: Option<&str>) -> Result<Summary> {
    let loaded = load_index(config).await?;
    let d = match source {
        Some(source) => loaded.index.info_in(name, source)?,
        None => loaded.index.info(name)?,
    };

    println!("{} {}", d.name, d.version);
    println!("  {}", d.description);
    println!("  source: {}", d.source_name);
    if let Some(author) = &d.author {
        println!("  author: {}", author);
    }
    if let Some(category) = &d.category {
        println!("  category: {}", category);
    }
    if !d.tags.is_empty() {
        let tags: Vec<&str> = d.tags.iter().map(String::as_str).collect();
        println!("  tags: {}", tags.join(", "));
    }
    if !d.dependencies.is_empty() {
        println!("  requires: {}", d.dependencies.join(", "));
    }

    // The environment is optional here; a missing one just means "not installed".
    if let Ok(env) = Environment::open(&config.runtime, &config.env_root) {
        let manifest = InstalledManifest::load(&config.runtime, &env.manifest_path())?;
        match manifest.get(&d.name) {
            Some(record) => println!("  installed: {} from {}", record.version, record.source_name),
            None => println!("  installed: no"),
        }
    }
    Ok(Summary::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::ConfigOptions;
    use crate::commands::source_add;
    use crate::error::{ErrorKind, PkgError};
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_info_prefers_lower_priority_number() {
        let mut server = mockito::Server::new_async().await;
        for (repo, version) in [("five", "5.0.0"), ("ten", "10.0.0")] {
            server
                .mock("GET", format!("/acme/{}/main/registry.json", repo).as_str())
                .with_body(format!(
                    r#"{{"packages": {{"p": {{"version": "{}", "description": "P", "path": "p"}}}}}}"#,
                    version
                ))
                .create_async()
                .await;
        }

        let dir = tempdir().unwrap();
        let options = ConfigOptions {
            home: Some(dir.path().to_path_buf()),
            env: Some(dir.path().join("missing-env")),
            raw_url: Some(server.url()),
            ..Default::default()
        };
        let config = Config::new(RealRuntime, options).unwrap();
        source_add(&config, "https://github.com/acme/ten", None, None, Some(10)).unwrap();
        source_add(&config, "https://github.com/acme/five", None, None, Some(5)).unwrap();

        let loaded = load_index(&config).await.unwrap();
        assert_eq!(loaded.index.info("p").unwrap().source_name, "acme/five");

        assert_eq!(info(&config, "p", None).await.unwrap(), Summary::Success);
        assert_eq!(
            info(&config, "p", Some("acme/ten")).await.unwrap(),
            Summary::Success
        );
        let err = info(&config, "nope", None).await.unwrap_err();
        assert_eq!(PkgError::kind_of(&err), ErrorKind::NotFound);

        let query = SearchQuery::text("p");
        assert_eq!(search(&config, &query).await.unwrap(), Summary::Success);
    }
}
