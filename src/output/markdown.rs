//! Markdown harvest report

use crate::output::stats::HarvestStatistics;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report for `stats` to `output_path`
pub fn write_markdown_report(stats: &HarvestStatistics, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_report(stats);
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())
}

/// Formats harvest statistics as markdown
pub fn format_markdown_report(stats: &HarvestStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Report\n\n");

    md.push_str("## Overview\n\n");
    md.push_str(&format!("- **Queued Links**: {}\n", stats.total_links));
    md.push_str(&format!("- **Pending Links**: {}\n", stats.unprocessed_links));
    md.push_str(&format!("- **Harvested Records**: {}\n", stats.records));
    md.push_str(&format!("- **Processed**: {:.2}%\n\n", stats.processed_rate()));

    if !stats.queue.is_empty() {
        md.push_str("## Link Queue\n\n");
        md.push_str("| Provider | Collection | Pending | Processed | Oldest Pending |\n");
        md.push_str("|----------|------------|---------|-----------|----------------|\n");
        for row in &stats.queue {
            let oldest = row
                .oldest_pending
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                row.provider, row.collection, row.pending, row.processed, oldest
            ));
        }
        md.push('\n');
    }

    if !stats.latest_runs.is_empty() {
        md.push_str("## Latest Runs\n\n");
        md.push_str("| Provider | Type | Status | Started | Finished | Config Hash |\n");
        md.push_str("|----------|------|--------|---------|----------|-------------|\n");
        for run in &stats.latest_runs {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                run.provider,
                run.crawl_type,
                run.status.to_db_string(),
                run.started_at,
                run.finished_at.as_deref().unwrap_or("-"),
                run.config_hash
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CrawlType;
    use crate::storage::{QueueSummaryRow, RunRecord, RunStatus};
    use tempfile::TempDir;

    fn stats() -> HarvestStatistics {
        HarvestStatistics {
            total_links: 10,
            unprocessed_links: 4,
            records: 6,
            queue: vec![QueueSummaryRow {
                provider: "noaa".to_string(),
                collection: "gfs".to_string(),
                pending: 4,
                processed: 6,
                oldest_pending: None,
            }],
            latest_runs: vec![RunRecord {
                id: 1,
                provider: "noaa".to_string(),
                crawl_type: CrawlType::MainSequence,
                started_at: "2024-01-15T06:00:00+00:00".to_string(),
                finished_at: None,
                config_hash: "abc123".to_string(),
                status: RunStatus::Running,
            }],
        }
    }

    #[test]
    fn test_report_sections() {
        let md = format_markdown_report(&stats());
        assert!(md.contains("# Sumi-Harvest Report"));
        assert!(md.contains("- **Processed**: 60.00%"));
        assert!(md.contains("| noaa | gfs | 4 | 6 | - |"));
        assert!(md.contains("| noaa | main-sequence | running |"));
    }

    #[test]
    fn test_write_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        write_markdown_report(&stats(), &path).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("# Sumi-Harvest Report"));
    }
}
