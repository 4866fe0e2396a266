//! Crawling: the engine seam, the HTTP engine and the two orchestrators
//!
//! This module contains:
//! - The [`CrawlEngine`] / [`CrawlVisitor`] seam and its HTTP implementation
//! - Visitors binding URL decisions and collection discovery to a pass
//! - Job computation and the seed and main-sequence orchestrators

pub mod discovery;
pub mod engine;
pub mod fetcher;
pub mod frontier;
pub mod http_engine;
pub mod jobs;
pub mod main_sequence;
pub mod parser;
pub mod seed;
pub mod visitor;

pub use discovery::{collection_name, resolve_date_depth, CollectionDiscovery, DateDepth};
pub use engine::{
    CrawlEngine, CrawlEngineFactory, CrawlStats, CrawlVisitor, EngineConfig, VisitedPage,
};
pub use fetcher::{build_http_client, fetch_page, probe_url, FetchError, FetchedPage, Probe};
pub use http_engine::{HttpCrawlEngine, HttpCrawlEngineFactory};
pub use main_sequence::{run_main_sequence_crawl, MainSequenceSummary};
pub use seed::{run_seed_crawl, SeedSummary};
pub use visitor::{MainSequenceVisitor, SeedVisitor};

use crate::config::Config;
use crate::dates::DateFormatRecognizer;
use crate::lock::LockRegistry;
use crate::model::CrawlJobDescriptor;
use crate::storage::SharedStorage;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Collaborators shared by both orchestrators
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub storage: SharedStorage,
    pub engines: Arc<dyn CrawlEngineFactory>,
    pub recognizer: Arc<dyn DateFormatRecognizer>,
    /// Registry the pipeline runs under; nested crawls take their own key
    pub locks: Arc<LockRegistry>,
}

impl CrawlContext {
    /// Runs one pass of a fresh engine for `job`
    pub(crate) async fn run_engine(
        &self,
        job: &CrawlJobDescriptor,
        working_dir: PathBuf,
        visitor: &mut dyn CrawlVisitor,
    ) -> Result<CrawlStats> {
        let config = jobs::engine_config(&self.config, job, working_dir);
        let mut engine = self.engines.create(config)?;
        engine.start(visitor).await
    }
}
