//! Seed crawl orchestration
//!
//! Walks a provider's directory tree from its root URL, infers collections
//! from the targets it reaches and merges them into the persisted collection
//! set.

use crate::config::ProviderConfig;
use crate::crawler::discovery::CollectionDiscovery;
use crate::crawler::engine::CrawlStats;
use crate::crawler::jobs::{seed_job, working_dir};
use crate::crawler::visitor::SeedVisitor;
use crate::crawler::CrawlContext;
use crate::model::{reconcile, CrawlType};
use crate::storage::{self, Storage};
use crate::url::{ignore_patterns, known_patterns, PatternMatcher};
use crate::Result;

/// Outcome of one seed crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Target pages visited
    pub targets: usize,
    pub added: usize,
    pub updated: usize,
    /// Targets whose date format disagreed with their collection
    pub inconsistencies: usize,
    pub stats: CrawlStats,
}

/// Runs one seed crawl for `provider`
///
/// Mature collections are excluded from traversal. The engine's working state
/// is reset whether or not the pass succeeds.
pub async fn run_seed_crawl(ctx: &CrawlContext, provider: &ProviderConfig) -> Result<SeedSummary> {
    let job = seed_job(provider, &ctx.config.crawler)?;

    let existing = {
        let store = storage::lock(&ctx.storage)?;
        store.get_collections(&provider.name)?
    };

    let matcher = PatternMatcher::compile(
        &job.search_key,
        &known_patterns(&existing),
        &ignore_patterns(&provider.ignore_patterns),
        job.target_url.as_str(),
    )?;

    tracing::info!(
        "Seed crawl of {} from {} ({} known collections)",
        provider.name,
        job.target_url,
        existing.iter().filter(|c| c.mature).count()
    );

    let working = working_dir(&ctx.config.crawler, &provider.name, CrawlType::Seed);
    let mut visitor = SeedVisitor::new(matcher, CollectionDiscovery::new(ctx.recognizer.clone()));

    let pass = ctx.run_engine(&job, working.clone(), &mut visitor).await;
    let reset = ctx.engines.reset_state(&working);
    let stats = pass?;
    reset?;

    let targets = visitor.targets();
    let inconsistencies = visitor.inconsistencies();
    let templates = visitor.into_templates();
    let merged = reconcile(&provider.name, &existing, &templates);

    {
        let mut store = storage::lock(&ctx.storage)?;
        store.save_collections(&merged.definitions)?;
    }

    tracing::info!(
        "Seed crawl of {} finished: {} targets, {} collections added, {} updated",
        provider.name,
        targets,
        merged.added,
        merged.updated
    );
    if inconsistencies > 0 {
        tracing::warn!(
            "{} target(s) of {} carried an inconsistent date format",
            inconsistencies,
            provider.name
        );
    }

    Ok(SeedSummary {
        targets,
        added: merged.added,
        updated: merged.updated,
        inconsistencies,
        stats,
    })
}
