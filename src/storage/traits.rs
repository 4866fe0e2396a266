//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{CollectionDefinition, CrawlType, DatasetRecord, Link};
use crate::storage::{QueueSummaryRow, RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every operation that touches more than one row runs in a single
/// transaction.
pub trait Storage {
    // ===== Run Management =====

    /// Records the start of a crawl or harvest invocation
    fn create_run(
        &mut self,
        provider: &str,
        crawl_type: CrawlType,
        config_hash: &str,
    ) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Most recent run for a provider and crawl type
    fn get_latest_run(
        &self,
        provider: &str,
        crawl_type: CrawlType,
    ) -> StorageResult<Option<RunRecord>>;

    /// Sets a terminal status and the finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Link Queue =====

    /// Inserts links whose URL is not yet queued
    ///
    /// Existing rows are left untouched, including their processed flag and
    /// creation time. Returns the number of rows inserted.
    fn enqueue_links(&mut self, links: &[Link]) -> StorageResult<usize>;

    /// Returns up to `limit` unprocessed links of the (provider, collection)
    /// pair that owns the oldest unprocessed link, oldest first
    ///
    /// Pair selection and batch read happen in one transaction. Returns an
    /// empty batch when nothing is pending.
    fn dequeue_oldest_unprocessed_batch(&mut self, limit: usize) -> StorageResult<Vec<Link>>;

    /// Flags exactly these URLs as processed; returns the rows updated
    fn mark_processed(&mut self, links: &[Link]) -> StorageResult<usize>;

    /// Deletes a provider's links created before `cutoff`, processed or not
    fn purge_links_created_before(
        &mut self,
        provider: &str,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Deletes a provider's links older than `age_days`
    fn purge_links_older_than(&mut self, provider: &str, age_days: u32) -> StorageResult<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(age_days));
        self.purge_links_created_before(provider, cutoff)
    }

    fn get_link(&self, url: &str) -> StorageResult<Option<Link>>;

    fn count_links(&self) -> StorageResult<u64>;

    fn count_unprocessed_links(&self) -> StorageResult<u64>;

    // ===== Previous Runs =====

    /// URLs already harvested for a bucket; empty if none were saved
    fn load_previous_run(
        &self,
        provider: &str,
        collection: &str,
        bucket: &str,
    ) -> StorageResult<HashSet<String>>;

    /// Replaces the saved URL set for a bucket
    fn save_previous_run(
        &mut self,
        provider: &str,
        collection: &str,
        bucket: &str,
        urls: &HashSet<String>,
    ) -> StorageResult<()>;

    // ===== Collections =====

    /// All collection definitions of a provider, ordered by name
    fn get_collections(&self, provider: &str) -> StorageResult<Vec<CollectionDefinition>>;

    fn get_collection(
        &self,
        provider: &str,
        name: &str,
    ) -> StorageResult<Option<CollectionDefinition>>;

    /// Inserts or replaces the given definitions
    fn save_collections(&mut self, collections: &[CollectionDefinition]) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts or replaces records keyed by URL; returns the count written
    fn save_records(&mut self, records: &[DatasetRecord]) -> StorageResult<usize>;

    fn get_record(&self, url: &str) -> StorageResult<Option<DatasetRecord>>;

    fn count_records(&self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Queue counts per (provider, collection)
    fn queue_summary(&self) -> StorageResult<Vec<QueueSummaryRow>>;
}
