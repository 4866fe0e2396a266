//! Crawl engine seam
//!
//! Orchestrators drive a [`CrawlEngine`] through a [`CrawlVisitor`]: the
//! engine owns fetching, politeness and the frontier, the visitor owns every
//! decision about which URLs matter.

use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// A page the engine fetched headers for
#[derive(Debug, Clone)]
pub struct VisitedPage {
    pub url: Url,
    /// Link distance from the seed
    pub depth: u32,
    pub status_code: u16,
    pub content_type: Option<String>,
}

/// Decides what the engine fetches and follows
pub trait CrawlVisitor: Send {
    /// Called once per newly discovered URL; true schedules it for a visit
    fn should_visit(&mut self, url: &Url) -> bool;

    /// Called for each visited page; true lets the engine follow its links
    fn visit(&mut self, page: &VisitedPage) -> bool;
}

/// Totals for one engine pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_visited: u64,
    pub listings_fetched: u64,
    pub links_seen: u64,
    pub robots_denied: u64,
    pub errors: u64,
}

/// Configuration of one engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub seeds: Vec<Url>,
    pub max_depth: u32,
    pub max_pages: u32,
    /// Minimum interval between requests
    pub politeness_delay: Duration,
    pub proxy: Option<String>,
    /// Directory holding the pass's frontier state
    pub working_dir: PathBuf,
    pub respect_robots: bool,
    /// Full user-agent header value
    pub user_agent: String,
}

/// One crawl pass over a set of seeds
#[async_trait]
pub trait CrawlEngine: Send {
    /// Runs the pass to completion
    async fn start(&mut self, visitor: &mut dyn CrawlVisitor) -> Result<CrawlStats>;
}

/// Creates engine instances and manages their on-disk state
pub trait CrawlEngineFactory: Send + Sync {
    fn create(&self, config: EngineConfig) -> Result<Box<dyn CrawlEngine>>;

    /// Removes whatever state engines left in `working_dir`
    fn reset_state(&self, working_dir: &Path) -> Result<()>;
}
