//! Statistics over the link queue, harvested records and crawl runs

use crate::model::CrawlType;
use crate::storage::{QueueSummaryRow, RunRecord, Storage, StorageResult};

/// Snapshot of harvest state
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub total_links: u64,
    pub unprocessed_links: u64,
    pub records: u64,

    /// Queue counts per (provider, collection)
    pub queue: Vec<QueueSummaryRow>,

    /// Most recent run of each provider and crawl type, where one exists
    pub latest_runs: Vec<RunRecord>,
}

impl HarvestStatistics {
    /// Share of queued links already processed, in percent
    pub fn processed_rate(&self) -> f64 {
        if self.total_links == 0 {
            return 0.0;
        }
        (self.total_links - self.unprocessed_links) as f64 / self.total_links as f64 * 100.0
    }
}

/// Loads statistics for the given providers
pub fn load_statistics(
    storage: &dyn Storage,
    providers: &[String],
) -> StorageResult<HarvestStatistics> {
    let mut latest_runs = Vec::new();
    for provider in providers {
        for crawl_type in [CrawlType::Seed, CrawlType::MainSequence] {
            if let Some(run) = storage.get_latest_run(provider, crawl_type)? {
                latest_runs.push(run);
            }
        }
    }
    if let Some(run) = storage.get_latest_run(crate::pipeline::ALL_PROVIDERS, CrawlType::Harvest)? {
        latest_runs.push(run);
    }

    Ok(HarvestStatistics {
        total_links: storage.count_links()?,
        unprocessed_links: storage.count_unprocessed_links()?,
        records: storage.count_records()?,
        queue: storage.queue_summary()?,
        latest_runs,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Queued links: {}", stats.total_links);
    println!("  Pending links: {}", stats.unprocessed_links);
    println!("  Harvested records: {}", stats.records);
    println!("  Processed: {:.1}%", stats.processed_rate());
    println!();

    if !stats.queue.is_empty() {
        println!("Queue by Collection:");
        for row in &stats.queue {
            let oldest = row
                .oldest_pending
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}/{}: {} pending, {} processed (oldest pending: {})",
                row.provider, row.collection, row.pending, row.processed, oldest
            );
        }
        println!();
    }

    if !stats.latest_runs.is_empty() {
        println!("Latest Runs:");
        for run in &stats.latest_runs {
            println!(
                "  {} {}: {} (started {}, finished {})",
                run.provider,
                run.crawl_type,
                run.status.to_db_string(),
                run.started_at,
                run.finished_at.as_deref().unwrap_or("-")
            );
        }
    }
}
