//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_harvest::config::{
    CollectionEntry, Config, CrawlerConfig, HarvestConfig, ProviderConfig, StorageConfig, UserAgentConfig,
};
use sumi_harvest::crawler::{
    CrawlEngine, CrawlEngineFactory, CrawlStats, CrawlVisitor, EngineConfig,
};
use sumi_harvest::storage::{shared, SharedStorage, SqliteStorage};
use sumi_harvest::{HarvestError, LockRegistry, Pipeline};
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with one provider rooted at `root_url`
pub fn test_config(root_url: &str, working_dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 5,
            max_pages: 100,
            seed_politeness_delay: 0,
            politeness_delay: 0,
            respect_robots_txt: false,
            working_directory: working_dir.display().to_string(),
            proxy: None,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        storage: StorageConfig {
            database_path: ":memory:".to_string(),
        },
        harvest: HarvestConfig::default(),
        providers: vec![ProviderConfig {
            name: "noaa".to_string(),
            root_url: root_url.to_string(),
            search_key: r"\.grb2$".to_string(),
            ignore_patterns: vec![],
            collections: vec![],
        }],
    }
}

pub fn memory_storage() -> SharedStorage {
    shared(SqliteStorage::new_in_memory().expect("in-memory database"))
}

pub fn pipeline(config: Config, storage: SharedStorage) -> Pipeline {
    Pipeline::new(
        config,
        "test-hash".to_string(),
        storage,
        Arc::new(LockRegistry::new()),
    )
    .expect("pipeline")
}

fn listing(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{}">{}</a>"#, l, l))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body><a href=\"../\">Parent Directory</a>{}</body></html>", anchors),
        "text/html",
    )
}

/// Mounts an autoindex-style provider tree:
///
/// ```text
/// /pub/
///   modelA/2024-01-14/a.grb2
///   modelA/2024-01-15/a.grb2, b.grb2
///   static/land.grb2
/// ```
pub async fn mount_provider_tree(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path_regex(r"/$"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(server)
        .await;
    Mock::given(method("HEAD"))
        .and(path_regex(r"\.grb2$"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .insert_header("content-length", "1024"),
        )
        .mount(server)
        .await;

    let pages: [(&str, &[&str]); 5] = [
        ("/pub/", &["modelA/", "static/", "?C=N;O=D"]),
        ("/pub/modelA/", &["2024-01-14/", "2024-01-15/"]),
        ("/pub/modelA/2024-01-14/", &["a.grb2"]),
        ("/pub/modelA/2024-01-15/", &["a.grb2", "b.grb2", "readme.txt"]),
        ("/pub/static/", &["land.grb2"]),
    ];
    for (page, links) in pages {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(listing(links))
            .mount(server)
            .await;
    }
}

/// Engine that offers a fixed list of URLs per seed instead of crawling
pub struct ScriptedEngineFactory {
    pub pages: HashMap<String, Vec<String>>,
    /// Seeds whose engine fails to start
    pub failing: HashSet<String>,
    pub pause: Duration,
    pub started: Arc<Mutex<Vec<String>>>,
    pub resets: Arc<Mutex<usize>>,
}

impl ScriptedEngineFactory {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failing: HashSet::new(),
            pause: Duration::ZERO,
            started: Arc::new(Mutex::new(Vec::new())),
            resets: Arc::new(Mutex::new(0)),
        }
    }

    pub fn page(mut self, seed: &str, urls: &[&str]) -> Self {
        self.pages
            .insert(seed.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn failing(mut self, seed: &str) -> Self {
        self.failing.insert(seed.to_string());
        self
    }

    pub fn pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

struct ScriptedEngine {
    seeds: Vec<Url>,
    offered: Vec<String>,
    fail: bool,
    pause: Duration,
}

#[async_trait]
impl CrawlEngine for ScriptedEngine {
    async fn start(&mut self, visitor: &mut dyn CrawlVisitor) -> sumi_harvest::Result<CrawlStats> {
        tokio::time::sleep(self.pause).await;
        if self.fail {
            return Err(HarvestError::Engine(format!("cannot crawl {:?}", self.seeds)));
        }

        let mut stats = CrawlStats::default();
        for url in &self.offered {
            let url = Url::parse(url).map_err(HarvestError::UrlParse)?;
            stats.links_seen += 1;
            visitor.should_visit(&url);
        }
        Ok(stats)
    }
}

impl CrawlEngineFactory for ScriptedEngineFactory {
    fn create(&self, config: EngineConfig) -> sumi_harvest::Result<Box<dyn CrawlEngine>> {
        let seed = config.seeds[0].to_string();
        self.started.lock().unwrap().push(seed.clone());
        Ok(Box::new(ScriptedEngine {
            offered: self.pages.get(&seed).cloned().unwrap_or_default(),
            fail: self.failing.contains(&seed),
            pause: self.pause,
            seeds: config.seeds,
        }))
    }

    fn reset_state(&self, _working_dir: &Path) -> sumi_harvest::Result<()> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

/// An undated operator-defined collection
pub fn collection_entry(name: &str, seed_url_template: &str) -> CollectionEntry {
    CollectionEntry {
        name: name.to_string(),
        seed_url_template: seed_url_template.to_string(),
        date_format: None,
        url_key: String::new(),
        search_key: None,
        sub_name: None,
        last_known_date: None,
        posting_delay_hours: None,
        politeness_delay: None,
        ignore: false,
        mature: true,
        projection: None,
        parameter_lookups: BTreeMap::new(),
    }
}
