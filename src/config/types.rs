use crate::model::CollectionDefinition;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Looks up a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}

/// Crawl engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum link depth below a crawl's seed URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages fetched in a single engine pass
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Politeness delay used by seed crawls (milliseconds)
    #[serde(rename = "seed-politeness-delay", default = "default_seed_delay")]
    pub seed_politeness_delay: u64,

    /// Politeness delay used by main-sequence crawls unless a collection overrides it (milliseconds)
    #[serde(rename = "politeness-delay", default = "default_politeness_delay")]
    pub politeness_delay: u64,

    /// Whether robots.txt is honored
    #[serde(rename = "respect-robots-txt", default = "default_true")]
    pub respect_robots_txt: bool,

    /// Root directory for per-job crawl engine state
    #[serde(rename = "working-directory")]
    pub working_directory: String,

    /// Optional HTTP proxy URL
    #[serde(default)]
    pub proxy: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Harvest pass configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Maximum number of links dequeued per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Links older than this many days are purged after a main-sequence crawl
    #[serde(rename = "link-retention-days", default = "default_retention_days")]
    pub link_retention_days: u32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            link_retention_days: default_retention_days(),
        }
    }
}

/// A data provider and its crawl settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (alphanumeric, '-' and '_')
    pub name: String,

    /// Root URL the seed crawl starts from
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Regex identifying terminal result URLs (data files)
    #[serde(rename = "search-key")]
    pub search_key: String,

    /// Regexes for URLs that are never followed
    #[serde(rename = "ignore-patterns", default)]
    pub ignore_patterns: Vec<String>,

    /// Operator-defined collections, imported into storage when absent
    #[serde(rename = "collection", default)]
    pub collections: Vec<CollectionEntry>,
}

/// Operator-defined collection entry
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionEntry {
    pub name: String,

    /// URL template; dated collections contain a `{date}` placeholder
    #[serde(rename = "seed-url-template")]
    pub seed_url_template: String,

    /// chrono strftime pattern of the `{date}` fragment
    #[serde(rename = "date-format", default)]
    pub date_format: Option<String>,

    #[serde(rename = "url-key", default)]
    pub url_key: String,

    #[serde(rename = "search-key", default)]
    pub search_key: Option<String>,

    #[serde(rename = "sub-name", default)]
    pub sub_name: Option<String>,

    #[serde(rename = "last-known-date", default)]
    pub last_known_date: Option<NaiveDate>,

    #[serde(rename = "posting-delay-hours", default)]
    pub posting_delay_hours: Option<u32>,

    #[serde(rename = "politeness-delay", default)]
    pub politeness_delay: Option<u64>,

    #[serde(default)]
    pub ignore: bool,

    #[serde(default = "default_true")]
    pub mature: bool,

    #[serde(default)]
    pub projection: Option<String>,

    #[serde(rename = "parameter-lookups", default)]
    pub parameter_lookups: BTreeMap<String, String>,
}

impl CollectionEntry {
    /// Converts the entry into a persisted collection definition for `provider`
    pub fn to_definition(&self, provider: &str) -> CollectionDefinition {
        CollectionDefinition {
            provider_name: provider.to_string(),
            name: self.name.clone(),
            seed_url_template: self.seed_url_template.clone(),
            date_format: self.date_format.clone(),
            url_key: self.url_key.clone(),
            search_key: self.search_key.clone(),
            sub_name: self.sub_name.clone(),
            last_known_date: self.last_known_date,
            posting_delay_hours: self.posting_delay_hours,
            politeness_delay_ms: self.politeness_delay,
            ignore: self.ignore,
            mature: self.mature,
            projection: self.projection.clone(),
            parameter_lookups: self.parameter_lookups.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_seed_delay() -> u64 {
    200
}

fn default_politeness_delay() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    1000
}

fn default_retention_days() -> u32 {
    30
}
