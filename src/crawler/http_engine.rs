//! Breadth-first HTTP crawl engine
//!
//! Each pass:
//! 1. Clears the frontier in the working directory and queues the seeds the
//!    visitor accepts
//! 2. Pops URLs in discovery order until the frontier is empty or the page
//!    budget is spent
//! 3. Checks robots.txt, waits out the politeness delay and probes the URL
//!    with HEAD
//! 4. Hands the page to the visitor; if it may be followed and is HTML, GETs
//!    the listing and offers every new link to the visitor

use crate::crawler::engine::{
    CrawlEngine, CrawlEngineFactory, CrawlStats, CrawlVisitor, EngineConfig, VisitedPage,
};
use crate::crawler::fetcher::{build_http_client, fetch_page, probe_url};
use crate::crawler::frontier::FrontierState;
use crate::crawler::parser::extract_links;
use crate::robots::{product_token, RobotsCache};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

pub struct HttpCrawlEngine {
    config: EngineConfig,
    client: Client,
    robots: RobotsCache,
    last_request: Option<Instant>,
}

impl HttpCrawlEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.proxy.as_deref())?;
        Ok(Self {
            config,
            client,
            robots: RobotsCache::new(),
            last_request: None,
        })
    }

    /// Sleeps until `delay` has passed since the previous request
    async fn wait_politely(&mut self, delay: Duration) {
        if let Some(last) = self.last_request {
            tokio::time::sleep_until(last + delay).await;
        }
        self.last_request = Some(Instant::now());
    }

    /// Robots verdict and effective delay for `url`
    async fn robots_check(&mut self, url: &Url) -> (bool, Duration) {
        if !self.config.respect_robots {
            return (true, self.config.politeness_delay);
        }

        let agent = product_token(&self.config.user_agent).to_string();
        let rules = self.robots.rules_for(&self.client, url).await;
        let allowed = rules.is_allowed(url.as_str(), &agent);
        let delay = rules
            .crawl_delay(&agent)
            .map_or(self.config.politeness_delay, |d| {
                d.max(self.config.politeness_delay)
            });
        (allowed, delay)
    }

    async fn run_pass(
        &mut self,
        frontier: &mut FrontierState,
        visitor: &mut dyn CrawlVisitor,
    ) -> Result<CrawlStats> {
        let mut stats = CrawlStats::default();

        for seed in self.config.seeds.clone() {
            if frontier.mark_seen(&seed)? && visitor.should_visit(&seed) {
                frontier.push(&seed, 0)?;
            }
        }

        while let Some((url, depth)) = frontier.pop()? {
            if stats.pages_visited >= u64::from(self.config.max_pages) {
                tracing::info!(
                    "Page budget of {} reached, {} URLs left unvisited",
                    self.config.max_pages,
                    frontier.queued()? + 1
                );
                break;
            }

            let (allowed, delay) = self.robots_check(&url).await;
            if !allowed {
                tracing::debug!("URL {} disallowed by robots.txt", url);
                stats.robots_denied += 1;
                continue;
            }

            self.wait_politely(delay).await;
            let probe = match probe_url(&self.client, &url).await {
                Ok(probe) => probe,
                Err(e) => {
                    tracing::debug!("Probe of {} failed: {}", url, e);
                    stats.errors += 1;
                    continue;
                }
            };

            stats.pages_visited += 1;
            let page = VisitedPage {
                url: url.clone(),
                depth,
                status_code: probe.status_code,
                content_type: probe.content_type.clone(),
            };

            if !visitor.visit(&page) || !probe.is_html() || depth >= self.config.max_depth {
                continue;
            }

            self.wait_politely(delay).await;
            let listing = match fetch_page(&self.client, &url).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::debug!("Fetch of {} failed: {}", url, e);
                    stats.errors += 1;
                    continue;
                }
            };
            stats.listings_fetched += 1;

            for link in extract_links(&listing.body, &listing.final_url) {
                if !frontier.mark_seen(&link)? {
                    continue;
                }
                stats.links_seen += 1;
                if visitor.should_visit(&link) {
                    frontier.push(&link, depth + 1)?;
                }
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl CrawlEngine for HttpCrawlEngine {
    async fn start(&mut self, visitor: &mut dyn CrawlVisitor) -> Result<CrawlStats> {
        let mut frontier = FrontierState::open(&self.config.working_dir)?;
        tracing::debug!(
            "Starting pass from {} seed(s), frontier at {}",
            self.config.seeds.len(),
            frontier.path().display()
        );

        let stats = self.run_pass(&mut frontier, visitor).await?;
        tracing::debug!(
            "Pass finished: {} visited, {} listings, {} errors",
            stats.pages_visited,
            stats.listings_fetched,
            stats.errors
        );
        Ok(stats)
    }
}

/// Creates [`HttpCrawlEngine`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpCrawlEngineFactory;

impl CrawlEngineFactory for HttpCrawlEngineFactory {
    fn create(&self, config: EngineConfig) -> Result<Box<dyn CrawlEngine>> {
        Ok(Box::new(HttpCrawlEngine::new(config)?))
    }

    fn reset_state(&self, working_dir: &Path) -> Result<()> {
        match std::fs::remove_dir_all(working_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HarvestError::Io(e)),
        }
    }
}
