//! Sumi-Harvest: a polite dataset harvester
//!
//! This crate discovers dataset collections published on data-provider web
//! servers, crawls their dated directory trees for new resources, queues the
//! discovered links durably and hands them, deduplicated against previous runs,
//! to metadata extraction.

pub mod config;
pub mod crawler;
pub mod dates;
pub mod harvest;
pub mod lock;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Crawl engine error: {0}")]
    Engine(String),

    #[error("Extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Metadata parse error for {provider}/{collection}: {message}")]
    MetadataParse {
        provider: String,
        collection: String,
        message: String,
    },

    #[error("Date format error: {0}")]
    DateFormat(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use lock::{LockOutcome, LockRegistry};
pub use model::{CollectionDefinition, CollectionTemplate, CrawlJobDescriptor, CrawlType, Link};
pub use pipeline::Pipeline;
pub use url::{normalize_url, PatternMatcher, UrlDecision};
