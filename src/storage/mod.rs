//! Storage module for persisting harvest state
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The durable link queue
//! - Previous-run URL sets
//! - Collection definitions
//! - Crawl run tracking and harvested records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::model::CrawlType;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between orchestrators and the harvest coordinator
///
/// Guards are never held across an `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) the database at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, mapping poisoning to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub provider: String,
    pub crawl_type: CrawlType,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Queue counts for one (provider, collection) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSummaryRow {
    pub provider: String,
    pub collection: String,
    pub pending: u64,
    pub processed: u64,
    pub oldest_pending: Option<DateTime<Utc>>,
}
