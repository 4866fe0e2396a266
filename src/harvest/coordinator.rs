//! Harvest pass over the link queue
//!
//! Each batch belongs to one (provider, collection) pair and is split by the
//! links' previous-run bucket (the date fragment of the crawl job that found
//! them). Links already in their bucket's previous-run set are skipped, the
//! rest are extracted one by one and parsed together. Every dequeued link is
//! marked processed at the end of its batch whatever happened to it, so a link
//! is never retried.

use crate::harvest::extractor::{MetadataExtractor, RawMetadata};
use crate::harvest::parser::{BatchContext, MetadataParser};
use crate::model::Link;
use crate::storage::{self, SharedStorage, Storage};
use crate::Result;
use std::sync::Arc;

/// Totals for one harvest pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub batches: usize,
    pub dequeued: usize,
    /// Links dropped because a previous run already harvested them
    pub skipped: usize,
    pub extraction_failures: usize,
    /// Batches whose parse failed
    pub parse_failures: usize,
    pub records: usize,
}

/// Groups a dequeued batch by previous-run bucket, keeping queue order
pub fn split_by_bucket(batch: &[Link]) -> Vec<(String, Vec<Link>)> {
    let mut groups: Vec<(String, Vec<Link>)> = Vec::new();
    for link in batch {
        match groups.iter_mut().find(|(bucket, _)| *bucket == link.bucket) {
            Some((_, links)) => links.push(link.clone()),
            None => groups.push((link.bucket.clone(), vec![link.clone()])),
        }
    }
    groups
}

pub struct HarvestCoordinator {
    storage: SharedStorage,
    extractor: Box<dyn MetadataExtractor>,
    parser: Arc<dyn MetadataParser>,
    batch_size: usize,
}

impl HarvestCoordinator {
    pub fn new(
        storage: SharedStorage,
        extractor: Box<dyn MetadataExtractor>,
        parser: Arc<dyn MetadataParser>,
        batch_size: usize,
    ) -> Self {
        Self {
            storage,
            extractor,
            parser,
            batch_size: batch_size.max(1),
        }
    }

    pub fn set_extractor(&mut self, extractor: Box<dyn MetadataExtractor>) {
        self.extractor = extractor;
    }

    pub fn set_parser(&mut self, parser: Arc<dyn MetadataParser>) {
        self.parser = parser;
    }

    /// Drains the link queue batch by batch
    ///
    /// Extraction and parse failures are contained to their link or batch.
    /// Storage failures end the pass.
    pub async fn run(&mut self) -> Result<HarvestSummary> {
        let mut summary = HarvestSummary::default();

        loop {
            let batch = {
                let mut store = storage::lock(&self.storage)?;
                store.dequeue_oldest_unprocessed_batch(self.batch_size)?
            };
            if batch.is_empty() {
                break;
            }

            summary.batches += 1;
            summary.dequeued += batch.len();
            for (bucket, links) in split_by_bucket(&batch) {
                self.harvest_batch(&links, bucket, &mut summary).await?;
            }

            storage::lock(&self.storage)?.mark_processed(&batch)?;
        }

        tracing::info!(
            "Harvest finished: {} batch(es), {} link(s), {} skipped, {} extraction failure(s), {} record(s)",
            summary.batches,
            summary.dequeued,
            summary.skipped,
            summary.extraction_failures,
            summary.records
        );
        Ok(summary)
    }

    async fn harvest_batch(
        &mut self,
        batch: &[Link],
        bucket: String,
        summary: &mut HarvestSummary,
    ) -> Result<()> {
        let provider = batch[0].provider_name.clone();
        let collection = batch[0].collection_name.clone();

        let (mut previous, definition) = {
            let store = storage::lock(&self.storage)?;
            (
                store.load_previous_run(&provider, &collection, &bucket)?,
                store.get_collection(&provider, &collection)?,
            )
        };

        let fresh: Vec<&Link> = batch
            .iter()
            .filter(|link| !previous.contains(&link.url))
            .collect();
        summary.skipped += batch.len() - fresh.len();
        tracing::debug!(
            "Batch {}/{} [{}]: {} link(s), {} new",
            provider,
            collection,
            bucket,
            batch.len(),
            fresh.len()
        );

        let mut extracted: Vec<(Link, RawMetadata)> = Vec::with_capacity(fresh.len());
        for link in fresh {
            match self.extractor.extract(link).await {
                Ok(raw) => extracted.push((link.clone(), raw)),
                Err(e) => {
                    tracing::warn!("Extraction of {} failed: {}", link.url, e);
                    summary.extraction_failures += 1;
                }
            }
        }

        if extracted.is_empty() {
            return Ok(());
        }

        let context = BatchContext {
            provider_name: provider.clone(),
            collection_name: collection.clone(),
            collection: definition,
            bucket: bucket.clone(),
        };
        let records = match self.parser.parse(&context, &extracted) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Parsing {} link(s) of {}/{} failed: {}",
                    extracted.len(),
                    provider,
                    collection,
                    e
                );
                summary.parse_failures += 1;
                return Ok(());
            }
        };

        previous.extend(extracted.into_iter().map(|(link, _)| link.url));
        let mut store = storage::lock(&self.storage)?;
        summary.records += store.save_records(&records)?;
        store.save_previous_run(&provider, &collection, &bucket, &previous)?;
        Ok(())
    }
}
