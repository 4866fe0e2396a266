//! Lock-gated entry points for crawling and harvesting
//!
//! A [`Pipeline`] is what an external trigger (the CLI, a cron wrapper, a
//! test) calls. Every invocation runs under the [`LockRegistry`] key
//! `"{provider}-{crawl_type}"`, is recorded as a crawl run, and reports only a
//! [`LockOutcome`]; details go to the log.

use crate::config::{Config, ProviderConfig};
use crate::crawler::jobs::{main_sequence_jobs, seed_job};
use crate::crawler::{
    run_main_sequence_crawl, run_seed_crawl, CrawlContext, CrawlEngineFactory,
    HttpCrawlEngineFactory,
};
use crate::dates::{DateFormatRecognizer, PatternDateRecognizer};
use crate::harvest::{
    BasicRecordParser, HarvestCoordinator, HttpHeaderExtractor, MetadataExtractor, MetadataParser,
};
use crate::lock::{LockOutcome, LockRegistry};
use crate::model::{CollectionDefinition, CrawlJobDescriptor, CrawlType};
use crate::storage::{self, RunStatus, SharedStorage, Storage};
use crate::{HarvestError, Result};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Provider name recorded for harvest passes, which span every provider
pub const ALL_PROVIDERS: &str = "*";

pub struct Pipeline {
    context: CrawlContext,
    config_hash: String,
    harvester: AsyncMutex<HarvestCoordinator>,
}

impl Pipeline {
    /// Creates a pipeline with the HTTP engine, the built-in date formats and
    /// header-based extraction
    pub fn new(
        config: Config,
        config_hash: String,
        storage: SharedStorage,
        locks: Arc<LockRegistry>,
    ) -> Result<Self> {
        let extractor = HttpHeaderExtractor::new(
            &config.user_agent.header_value(),
            config.crawler.proxy.as_deref(),
        )?;
        let harvester = HarvestCoordinator::new(
            storage.clone(),
            Box::new(extractor),
            Arc::new(BasicRecordParser),
            config.harvest.batch_size,
        );

        Ok(Self {
            context: CrawlContext {
                config: Arc::new(config),
                storage,
                engines: Arc::new(HttpCrawlEngineFactory),
                recognizer: Arc::new(PatternDateRecognizer::default()),
                locks,
            },
            config_hash,
            harvester: AsyncMutex::new(harvester),
        })
    }

    pub fn with_engine_factory(mut self, engines: Arc<dyn CrawlEngineFactory>) -> Self {
        self.context.engines = engines;
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn DateFormatRecognizer>) -> Self {
        self.context.recognizer = recognizer;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.harvester.get_mut().set_extractor(extractor);
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn MetadataParser>) -> Self {
        self.harvester.get_mut().set_parser(parser);
        self
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.context.storage
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.context.locks
    }

    fn provider(&self, name: &str) -> Result<&ProviderConfig> {
        self.context
            .config
            .provider(name)
            .ok_or_else(|| HarvestError::UnknownProvider(name.to_string()))
    }

    /// Runs a seed crawl for `provider`
    pub async fn run_seed(&self, provider: &str) -> LockOutcome {
        let key = CrawlType::Seed.lock_key(provider);
        self.context
            .locks
            .try_run_exclusive(&key, move || async move {
                let provider = self.provider(provider)?;
                self.tracked(&provider.name, CrawlType::Seed, async {
                    seed_job(provider, &self.context.config.crawler)?;
                    self.import_configured_collections(provider)?;
                    run_seed_crawl(&self.context, provider).await.map(|_| ())
                })
                .await
            })
            .await
    }

    /// Runs a main-sequence crawl for `provider`
    pub async fn run_main_sequence(&self, provider: &str) -> LockOutcome {
        let key = CrawlType::MainSequence.lock_key(provider);
        self.context
            .locks
            .try_run_exclusive(&key, move || async move {
                let provider = self.provider(provider)?;
                self.tracked(&provider.name, CrawlType::MainSequence, async {
                    self.plan(&provider.name)?;
                    self.import_configured_collections(provider)?;
                    run_main_sequence_crawl(&self.context, provider)
                        .await
                        .map(|_| ())
                })
                .await
            })
            .await
    }

    /// Drains the link queue
    pub async fn run_harvest(&self) -> LockOutcome {
        let key = CrawlType::Harvest.lock_key(ALL_PROVIDERS);
        self.context
            .locks
            .try_run_exclusive(&key, move || async move {
                self.tracked(ALL_PROVIDERS, CrawlType::Harvest, async {
                    let mut harvester = self.harvester.lock().await;
                    harvester.run().await.map(|_| ())
                })
                .await
            })
            .await
    }

    /// Records `work` as a crawl run, marking it completed or failed
    async fn tracked<F>(&self, provider: &str, crawl_type: CrawlType, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let run_id =
            storage::lock(&self.context.storage)?.create_run(provider, crawl_type, &self.config_hash)?;
        tracing::debug!("Started {} run {} for {}", crawl_type, run_id, provider);

        let result = work.await;
        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        storage::lock(&self.context.storage)?.finish_run(run_id, status)?;
        result
    }

    /// Persists collections declared in the configuration that storage does
    /// not know yet; returns how many were added
    ///
    /// Crawls call this only after their jobs validate, so a configuration
    /// error leaves storage untouched.
    pub fn import_configured_collections(&self, provider: &ProviderConfig) -> Result<usize> {
        let mut store = storage::lock(&self.context.storage)?;
        let mut missing = Vec::new();
        for entry in &provider.collections {
            if store.get_collection(&provider.name, &entry.name)?.is_none() {
                missing.push(entry.to_definition(&provider.name));
            }
        }
        if !missing.is_empty() {
            store.save_collections(&missing)?;
            tracing::info!(
                "Imported {} configured collection(s) for {}",
                missing.len(),
                provider.name
            );
        }
        Ok(missing.len())
    }

    /// Jobs the next main-sequence run of `provider` would execute
    ///
    /// Nothing is persisted. A provider without collections plans its seed
    /// job instead.
    pub fn plan(&self, provider: &str) -> Result<Vec<CrawlJobDescriptor>> {
        let provider = self.provider(provider)?;
        let mut collections: Vec<CollectionDefinition> = {
            let store = storage::lock(&self.context.storage)?;
            store.get_collections(&provider.name)?
        };
        for entry in &provider.collections {
            if !collections.iter().any(|c| c.name == entry.name) {
                collections.push(entry.to_definition(&provider.name));
            }
        }

        if collections.is_empty() {
            return Ok(vec![seed_job(provider, &self.context.config.crawler)?]);
        }
        main_sequence_jobs(provider, &collections, &self.context.config.crawler, Utc::now())
    }

    /// Deletes `provider`'s links older than the configured retention
    pub fn purge(&self, provider: &str) -> Result<usize> {
        let provider = self.provider(provider)?;
        let days = self.context.config.harvest.link_retention_days;
        let purged = storage::lock(&self.context.storage)?.purge_links_older_than(&provider.name, days)?;
        tracing::info!("Purged {} link(s) of {} older than {} days", purged, provider.name, days);
        Ok(purged)
    }
}
