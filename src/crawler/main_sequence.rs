//! Main-sequence crawl orchestration
//!
//! One engine pass per (collection, date fragment) job. Each pass gets a
//! fresh engine and visitor; the links it captured are enqueued once the
//! pass returns.

use crate::config::ProviderConfig;
use crate::crawler::jobs::{main_sequence_jobs, working_dir};
use crate::crawler::seed::{run_seed_crawl, SeedSummary};
use crate::crawler::visitor::MainSequenceVisitor;
use crate::crawler::CrawlContext;
use crate::lock::LockOutcome;
use crate::model::{CrawlJobDescriptor, CrawlType, LinkTemplate};
use crate::storage::{self, Storage};
use crate::url::{ignore_patterns, PatternMatcher};
use crate::{HarvestError, Result};
use chrono::Utc;

/// Outcome of one main-sequence crawl
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainSequenceSummary {
    pub jobs: usize,
    pub failed_jobs: usize,
    pub links_found: usize,
    /// Links that were not already queued
    pub links_enqueued: usize,
    pub links_purged: usize,
    /// Set when the provider had no collections and a seed crawl ran instead
    pub seeded: Option<SeedSummary>,
}

/// Runs the seed crawl under the provider's seed lock
///
/// Returns None when a seed crawl of the provider is already running.
async fn run_fallback_seed(
    ctx: &CrawlContext,
    provider: &ProviderConfig,
) -> Result<Option<SeedSummary>> {
    let key = CrawlType::Seed.lock_key(&provider.name);
    let mut seeded = None;
    let slot = &mut seeded;
    let outcome = ctx
        .locks
        .try_run_exclusive(&key, move || async move {
            *slot = Some(run_seed_crawl(ctx, provider).await?);
            Ok(())
        })
        .await;

    match outcome {
        LockOutcome::Completed | LockOutcome::Busy => Ok(seeded),
        LockOutcome::Failed => Err(HarvestError::Engine(format!(
            "seed crawl of {} failed",
            provider.name
        ))),
    }
}

/// Runs one main-sequence crawl for `provider`
///
/// Falls back to a seed crawl when the provider has no collections yet,
/// skipped when a seed crawl of the provider is already running. Every
/// matcher is compiled before the first pass so a bad pattern aborts the run
/// with nothing persisted. A failing pass is logged and the remaining jobs
/// still run.
pub async fn run_main_sequence_crawl(
    ctx: &CrawlContext,
    provider: &ProviderConfig,
) -> Result<MainSequenceSummary> {
    let collections = {
        let store = storage::lock(&ctx.storage)?;
        store.get_collections(&provider.name)?
    };

    if collections.is_empty() {
        tracing::info!(
            "Provider {} has no collections, running a seed crawl instead",
            provider.name
        );
        let seeded = run_fallback_seed(ctx, provider).await?;
        return Ok(MainSequenceSummary {
            seeded,
            ..Default::default()
        });
    }

    let jobs = main_sequence_jobs(provider, &collections, &ctx.config.crawler, Utc::now())?;
    let ignore = ignore_patterns(&provider.ignore_patterns);
    let planned = jobs
        .into_iter()
        .map(|job| {
            let matcher =
                PatternMatcher::compile(&job.search_key, &[], &ignore, job.target_url.as_str())?;
            Ok((job, matcher))
        })
        .collect::<Result<Vec<(CrawlJobDescriptor, PatternMatcher)>>>()?;

    tracing::info!(
        "Main-sequence crawl of {}: {} job(s) over {} collection(s)",
        provider.name,
        planned.len(),
        collections.iter().filter(|c| !c.ignore).count()
    );

    let working = working_dir(&ctx.config.crawler, &provider.name, CrawlType::MainSequence);
    let mut summary = MainSequenceSummary {
        jobs: planned.len(),
        ..Default::default()
    };

    for (job, matcher) in planned {
        let template = LinkTemplate::new(
            &job.provider_name,
            &job.collection_name,
            job.sub_name.as_deref(),
        )
        .with_bucket(job.date_fragment.as_deref());
        let mut visitor = MainSequenceVisitor::new(matcher, template);

        let pass = ctx.run_engine(&job, working.clone(), &mut visitor).await;
        match pass {
            Ok(stats) => {
                let links = visitor.into_links();
                let inserted = {
                    let mut store = storage::lock(&ctx.storage)?;
                    store.enqueue_links(&links)?
                };
                tracing::debug!(
                    "{} at {}: {} pages, {} links, {} new",
                    job.collection_name,
                    job.target_url,
                    stats.pages_visited,
                    links.len(),
                    inserted
                );
                summary.links_found += links.len();
                summary.links_enqueued += inserted;
            }
            Err(e) => {
                tracing::warn!(
                    "Crawl of {} at {} failed: {}",
                    job.collection_name,
                    job.target_url,
                    e
                );
                summary.failed_jobs += 1;
            }
        }
    }

    summary.links_purged = {
        let mut store = storage::lock(&ctx.storage)?;
        store.purge_links_older_than(&provider.name, ctx.config.harvest.link_retention_days)?
    };
    if summary.links_purged > 0 {
        tracing::info!(
            "Purged {} link(s) of {} older than {} days",
            summary.links_purged,
            provider.name,
            ctx.config.harvest.link_retention_days
        );
    }

    ctx.engines.reset_state(&working)?;

    tracing::info!(
        "Main-sequence crawl of {} finished: {} job(s), {} failed, {} new link(s)",
        provider.name,
        summary.jobs,
        summary.failed_jobs,
        summary.links_enqueued
    );
    Ok(summary)
}
