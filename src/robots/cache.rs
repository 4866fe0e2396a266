//! Per-pass robots.txt cache
//!
//! Each crawl pass fetches robots.txt at most once per origin. Nothing is
//! shared between passes, so a changed robots.txt is honored on the next run.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::origin_of;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, ParsedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the origin of `url`, fetching them on first use
    pub async fn rules_for(&mut self, client: &reqwest::Client, url: &Url) -> &ParsedRobots {
        let origin = origin_of(url);
        if !self.entries.contains_key(&origin) {
            let robots = fetch_robots(client, &origin).await;
            self.entries.insert(origin.clone(), robots);
        }
        self.entries.entry(origin).or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
