//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl and harvest invocations
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    crawl_type TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_provider ON crawl_runs(provider, crawl_type);

-- Durable link queue; created_at is microseconds since the Unix epoch (UTC)
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    provider TEXT NOT NULL,
    collection TEXT NOT NULL,
    sub_name TEXT,
    created_at INTEGER NOT NULL,
    bucket TEXT NOT NULL DEFAULT 'undated',
    processed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_pending ON links(processed, created_at);
CREATE INDEX IF NOT EXISTS idx_links_pair ON links(provider, collection, processed);
CREATE INDEX IF NOT EXISTS idx_links_age ON links(provider, created_at);

-- URLs already harvested per (provider, collection, date fragment bucket)
CREATE TABLE IF NOT EXISTS previous_run_urls (
    provider TEXT NOT NULL,
    collection TEXT NOT NULL,
    bucket TEXT NOT NULL,
    url TEXT NOT NULL,
    PRIMARY KEY (provider, collection, bucket, url)
);

-- Persisted collection definitions
CREATE TABLE IF NOT EXISTS collections (
    provider TEXT NOT NULL,
    name TEXT NOT NULL,
    seed_url_template TEXT NOT NULL,
    date_format TEXT,
    url_key TEXT NOT NULL DEFAULT '',
    search_key TEXT,
    sub_name TEXT,
    last_known_date TEXT,
    posting_delay_hours INTEGER,
    politeness_delay_ms INTEGER,
    ignored INTEGER NOT NULL DEFAULT 0,
    mature INTEGER NOT NULL DEFAULT 0,
    projection TEXT,
    PRIMARY KEY (provider, name)
);

CREATE TABLE IF NOT EXISTS collection_parameters (
    provider TEXT NOT NULL,
    collection TEXT NOT NULL,
    parameter TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (provider, collection, parameter)
);

-- Harvested metadata records
CREATE TABLE IF NOT EXISTS dataset_records (
    url TEXT PRIMARY KEY,
    provider TEXT NOT NULL,
    collection TEXT NOT NULL,
    sub_name TEXT,
    content_type TEXT,
    content_length INTEGER,
    last_modified TEXT,
    projection TEXT,
    parameters TEXT,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dataset_records_collection ON dataset_records(provider, collection);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
