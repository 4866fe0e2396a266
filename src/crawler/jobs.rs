//! Crawl job computation
//!
//! Jobs are derived fresh from configuration and persisted collections
//! before every orchestrator run and are never stored.

use crate::config::{Config, CrawlerConfig, ProviderConfig};
use crate::crawler::engine::EngineConfig;
use crate::dates::format_date;
use crate::model::{CollectionDefinition, CrawlJobDescriptor, CrawlType, DATE_PLACEHOLDER};
use crate::url::normalize_url;
use crate::{ConfigError, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Calendar dates a main-sequence crawl should cover
///
/// Today, the last known date when the collection tracks dates, and every
/// day from `now - posting_delay` up to today when that lands on an earlier
/// day. May contain duplicates; callers dedupe on the formatted fragment.
pub fn crawl_dates(collection: &CollectionDefinition, now: DateTime<Utc>) -> Vec<NaiveDate> {
    let today = now.date_naive();
    let mut dates = vec![today];

    if collection.tracks_dates() {
        if let Some(last_known) = collection.last_known_date {
            dates.push(last_known);
        }
    }

    if let Some(hours) = collection.posting_delay_hours.filter(|h| *h > 0) {
        let earliest = (now - ChronoDuration::hours(i64::from(hours))).date_naive();
        let mut day = earliest;
        while day < today {
            dates.push(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    dates
}

/// Formats `dates` with `format`, keeping the first occurrence of each fragment
pub fn date_fragments(format: &str, dates: &[NaiveDate]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut fragments = Vec::new();
    for date in dates {
        let fragment = format_date(format, *date)?;
        if seen.insert(fragment.clone()) {
            fragments.push(fragment);
        }
    }
    Ok(fragments)
}

fn checked_search_key(key: &str) -> Result<String> {
    Regex::new(key)?;
    Ok(key.to_string())
}

/// Job for a provider's seed crawl
pub fn seed_job(provider: &ProviderConfig, crawler: &CrawlerConfig) -> Result<CrawlJobDescriptor> {
    Ok(CrawlJobDescriptor {
        provider_name: provider.name.clone(),
        collection_name: String::new(),
        sub_name: None,
        target_url: normalize_url(&provider.root_url)?,
        date_fragment: None,
        search_key: checked_search_key(&provider.search_key)?,
        politeness_delay: Duration::from_millis(crawler.seed_politeness_delay),
    })
}

/// Jobs for one main-sequence run: one per (collection, date fragment)
///
/// Ignored collections are skipped. Any malformed template or search key
/// fails the whole computation.
pub fn main_sequence_jobs(
    provider: &ProviderConfig,
    collections: &[CollectionDefinition],
    crawler: &CrawlerConfig,
    now: DateTime<Utc>,
) -> Result<Vec<CrawlJobDescriptor>> {
    let mut jobs = Vec::new();

    for collection in collections.iter().filter(|c| !c.ignore) {
        let search_key =
            checked_search_key(collection.search_key.as_deref().unwrap_or(&provider.search_key))?;
        let politeness_delay = Duration::from_millis(
            collection
                .politeness_delay_ms
                .unwrap_or(crawler.politeness_delay),
        );

        let job = |target: &str, fragment: Option<String>| -> Result<CrawlJobDescriptor> {
            Ok(CrawlJobDescriptor {
                provider_name: provider.name.clone(),
                collection_name: collection.name.clone(),
                sub_name: collection.sub_name.clone(),
                target_url: normalize_url(target)?,
                date_fragment: fragment,
                search_key: search_key.clone(),
                politeness_delay,
            })
        };

        match &collection.date_format {
            Some(format) => {
                let dates = crawl_dates(collection, now);
                for fragment in date_fragments(format, &dates)? {
                    let target = collection
                        .seed_url_template
                        .replace(DATE_PLACEHOLDER, &fragment);
                    jobs.push(job(&target, Some(fragment))?);
                }
            }
            None => {
                if collection.seed_url_template.contains(DATE_PLACEHOLDER) {
                    return Err(ConfigError::Validation(format!(
                        "collection '{}' has a {} placeholder but no date format",
                        collection.name, DATE_PLACEHOLDER
                    ))
                    .into());
                }
                jobs.push(job(&collection.seed_url_template, None)?);
            }
        }
    }

    Ok(jobs)
}

/// Engine working directory for one provider and crawl type
pub fn working_dir(crawler: &CrawlerConfig, provider: &str, crawl_type: CrawlType) -> PathBuf {
    PathBuf::from(&crawler.working_directory).join(crawl_type.lock_key(provider))
}

/// Engine configuration for a job
pub fn engine_config(config: &Config, job: &CrawlJobDescriptor, working_dir: PathBuf) -> EngineConfig {
    EngineConfig {
        seeds: vec![job.target_url.clone()],
        max_depth: config.crawler.max_depth,
        max_pages: config.crawler.max_pages,
        politeness_delay: job.politeness_delay,
        proxy: config.crawler.proxy.clone(),
        working_dir,
        respect_robots: config.crawler.respect_robots_txt,
        user_agent: config.user_agent.header_value(),
    }
}
