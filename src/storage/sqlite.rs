//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{CollectionDefinition, CrawlType, DatasetRecord, Link};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{QueueSummaryRow, RunRecord, RunStatus};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const DATE_COLUMN_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

fn from_micros(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

fn parse_date_column(idx: usize, value: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(&s, DATE_COLUMN_FORMAT)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

const LINK_COLUMNS: &str = "url, provider, collection, sub_name, created_at, bucket, processed";

fn row_to_link(row: &Row<'_>) -> rusqlite::Result<Link> {
    Ok(Link {
        url: row.get(0)?,
        provider_name: row.get(1)?,
        collection_name: row.get(2)?,
        sub_name: row.get(3)?,
        creation_time: from_micros(4, row.get(4)?)?,
        bucket: row.get(5)?,
        processed: row.get(6)?,
    })
}

const RUN_COLUMNS: &str = "id, provider, crawl_type, started_at, finished_at, config_hash, status";

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let crawl_type: String = row.get(2)?;
    Ok(RunRecord {
        id: row.get(0)?,
        provider: row.get(1)?,
        crawl_type: CrawlType::from_db_string(&crawl_type).unwrap_or(CrawlType::MainSequence),
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?).unwrap_or(RunStatus::Running),
    })
}

const COLLECTION_COLUMNS: &str = "provider, name, seed_url_template, date_format, url_key, \
     search_key, sub_name, last_known_date, posting_delay_hours, politeness_delay_ms, ignored, \
     mature, projection";

fn row_to_collection(row: &Row<'_>) -> rusqlite::Result<CollectionDefinition> {
    Ok(CollectionDefinition {
        provider_name: row.get(0)?,
        name: row.get(1)?,
        seed_url_template: row.get(2)?,
        date_format: row.get(3)?,
        url_key: row.get(4)?,
        search_key: row.get(5)?,
        sub_name: row.get(6)?,
        last_known_date: parse_date_column(7, row.get(7)?)?,
        posting_delay_hours: row.get(8)?,
        politeness_delay_ms: row.get::<_, Option<i64>>(9)?.map(|v| v.max(0) as u64),
        ignore: row.get(10)?,
        mature: row.get(11)?,
        projection: row.get(12)?,
        parameter_lookups: BTreeMap::new(),
    })
}

impl SqliteStorage {
    fn load_parameters(
        &self,
        provider: &str,
        collection: &str,
    ) -> StorageResult<BTreeMap<String, String>> {
        let mut stmt = self.conn.prepare(
            "SELECT parameter, value FROM collection_parameters
             WHERE provider = ?1 AND collection = ?2",
        )?;
        let params = stmt
            .query_map(params![provider, collection], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(params)
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(
        &mut self,
        provider: &str,
        crawl_type: CrawlType,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (provider, crawl_type, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                provider,
                crawl_type.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                row_to_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(
        &self,
        provider: &str,
        crawl_type: CrawlType,
    ) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_runs WHERE provider = ?1 AND crawl_type = ?2
                     ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![provider, crawl_type.to_db_string()],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Link Queue =====

    fn enqueue_links(&mut self, links: &[Link]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO links (url, provider, collection, sub_name, created_at, bucket, processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for link in links {
                inserted += stmt.execute(params![
                    link.url,
                    link.provider_name,
                    link.collection_name,
                    link.sub_name,
                    to_micros(link.creation_time),
                    link.bucket,
                    link.processed
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn dequeue_oldest_unprocessed_batch(&mut self, limit: usize) -> StorageResult<Vec<Link>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pair: Option<(String, String)> = tx
            .query_row(
                "SELECT provider, collection FROM links WHERE processed = 0
                 ORDER BY created_at ASC, id ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let batch = match pair {
            Some((provider, collection)) => {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {} FROM links
                     WHERE processed = 0 AND provider = ?1 AND collection = ?2
                     ORDER BY created_at ASC, id ASC LIMIT ?3",
                    LINK_COLUMNS
                ))?;
                let links = stmt
                    .query_map(
                        params![provider, collection, limit as i64],
                        row_to_link,
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                links
            }
            None => Vec::new(),
        };

        tx.commit()?;
        Ok(batch)
    }

    fn mark_processed(&mut self, links: &[Link]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE links SET processed = 1 WHERE url = ?1")?;
            for link in links {
                updated += stmt.execute(params![link.url])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn purge_links_created_before(
        &mut self,
        provider: &str,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM links WHERE provider = ?1 AND created_at < ?2",
            params![provider, to_micros(cutoff)],
        )?;
        Ok(deleted)
    }

    fn get_link(&self, url: &str) -> StorageResult<Option<Link>> {
        let link = self
            .conn
            .query_row(
                &format!("SELECT {} FROM links WHERE url = ?1", LINK_COLUMNS),
                params![url],
                row_to_link,
            )
            .optional()?;
        Ok(link)
    }

    fn count_links(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unprocessed_links(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Previous Runs =====

    fn load_previous_run(
        &self,
        provider: &str,
        collection: &str,
        bucket: &str,
    ) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM previous_run_urls
             WHERE provider = ?1 AND collection = ?2 AND bucket = ?3",
        )?;
        let urls = stmt
            .query_map(params![provider, collection, bucket], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(urls)
    }

    fn save_previous_run(
        &mut self,
        provider: &str,
        collection: &str,
        bucket: &str,
        urls: &HashSet<String>,
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM previous_run_urls WHERE provider = ?1 AND collection = ?2 AND bucket = ?3",
            params![provider, collection, bucket],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO previous_run_urls (provider, collection, bucket, url)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for url in urls {
                stmt.execute(params![provider, collection, bucket, url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Collections =====

    fn get_collections(&self, provider: &str) -> StorageResult<Vec<CollectionDefinition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM collections WHERE provider = ?1 ORDER BY name",
            COLLECTION_COLUMNS
        ))?;
        let mut collections = stmt
            .query_map(params![provider], row_to_collection)?
            .collect::<Result<Vec<_>, _>>()?;

        for collection in &mut collections {
            collection.parameter_lookups = self.load_parameters(provider, &collection.name)?;
        }
        Ok(collections)
    }

    fn get_collection(
        &self,
        provider: &str,
        name: &str,
    ) -> StorageResult<Option<CollectionDefinition>> {
        let collection = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM collections WHERE provider = ?1 AND name = ?2",
                    COLLECTION_COLUMNS
                ),
                params![provider, name],
                row_to_collection,
            )
            .optional()?;

        match collection {
            Some(mut collection) => {
                collection.parameter_lookups = self.load_parameters(provider, name)?;
                Ok(Some(collection))
            }
            None => Ok(None),
        }
    }

    fn save_collections(&mut self, collections: &[CollectionDefinition]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(&format!(
                "INSERT OR REPLACE INTO collections ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                COLLECTION_COLUMNS
            ))?;
            let mut clear = tx.prepare(
                "DELETE FROM collection_parameters WHERE provider = ?1 AND collection = ?2",
            )?;
            let mut insert_param = tx.prepare(
                "INSERT INTO collection_parameters (provider, collection, parameter, value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;

            for c in collections {
                upsert.execute(params![
                    c.provider_name,
                    c.name,
                    c.seed_url_template,
                    c.date_format,
                    c.url_key,
                    c.search_key,
                    c.sub_name,
                    c.last_known_date
                        .map(|d| d.format(DATE_COLUMN_FORMAT).to_string()),
                    c.posting_delay_hours,
                    c.politeness_delay_ms.map(|v| v as i64),
                    c.ignore,
                    c.mature,
                    c.projection
                ])?;

                clear.execute(params![c.provider_name, c.name])?;
                for (parameter, value) in &c.parameter_lookups {
                    insert_param.execute(params![c.provider_name, c.name, parameter, value])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Records =====

    fn save_records(&mut self, records: &[DatasetRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO dataset_records
                 (url, provider, collection, sub_name, content_type, content_length,
                  last_modified, projection, parameters, harvested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for record in records {
                let parameters = toml::to_string(&record.parameters)
                    .map_err(|e| StorageError::Database(format!("encode parameters: {}", e)))?;
                written += stmt.execute(params![
                    record.url,
                    record.provider_name,
                    record.collection_name,
                    record.sub_name,
                    record.content_type,
                    record.content_length.map(|v| v as i64),
                    record.last_modified,
                    record.projection,
                    parameters,
                    record.harvested_at.to_rfc3339()
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn get_record(&self, url: &str) -> StorageResult<Option<DatasetRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT url, provider, collection, sub_name, content_type, content_length,
                 last_modified, projection, parameters, harvested_at
                 FROM dataset_records WHERE url = ?1",
                params![url],
                |row| {
                    let parameters: Option<String> = row.get(8)?;
                    let parameters = match parameters {
                        Some(text) => toml::from_str(&text).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
                        })?,
                        None => BTreeMap::new(),
                    };
                    let harvested_at: String = row.get(9)?;
                    let harvested_at = DateTime::parse_from_rfc3339(&harvested_at)
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
                        })?
                        .with_timezone(&Utc);

                    Ok(DatasetRecord {
                        url: row.get(0)?,
                        provider_name: row.get(1)?,
                        collection_name: row.get(2)?,
                        sub_name: row.get(3)?,
                        content_type: row.get(4)?,
                        content_length: row.get::<_, Option<i64>>(5)?.map(|v| v.max(0) as u64),
                        last_modified: row.get(6)?,
                        projection: row.get(7)?,
                        parameters,
                        harvested_at,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM dataset_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn queue_summary(&self) -> StorageResult<Vec<QueueSummaryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT provider, collection,
                    SUM(CASE WHEN processed = 0 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN processed = 1 THEN 1 ELSE 0 END),
                    MIN(CASE WHEN processed = 0 THEN created_at END)
             FROM links
             GROUP BY provider, collection
             ORDER BY provider, collection",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let oldest: Option<i64> = row.get(4)?;
                Ok(QueueSummaryRow {
                    provider: row.get(0)?,
                    collection: row.get(1)?,
                    pending: row.get::<_, i64>(2)? as u64,
                    processed: row.get::<_, i64>(3)? as u64,
                    oldest_pending: oldest.map(|v| from_micros(4, v)).transpose()?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
