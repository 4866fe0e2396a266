//! Batch metadata parsing

use crate::harvest::extractor::RawMetadata;
use crate::model::{CollectionDefinition, DatasetRecord, Link};
use crate::{HarvestError, Result};
use chrono::Utc;

/// What a parser knows about the batch it is given
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub provider_name: String,
    pub collection_name: String,
    /// None when the collection has no persisted definition
    pub collection: Option<CollectionDefinition>,
    /// Previous-run bucket shared by every link of the batch
    pub bucket: String,
}

/// Turns a batch of raw metadata into dataset records
pub trait MetadataParser: Send + Sync {
    fn parse(
        &self,
        context: &BatchContext,
        batch: &[(Link, RawMetadata)],
    ) -> Result<Vec<DatasetRecord>>;
}

/// One record per link, carrying headers and collection settings
///
/// Parameter lookups apply to a record when their key occurs in its URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicRecordParser;

impl MetadataParser for BasicRecordParser {
    fn parse(
        &self,
        context: &BatchContext,
        batch: &[(Link, RawMetadata)],
    ) -> Result<Vec<DatasetRecord>> {
        let harvested_at = Utc::now();

        batch
            .iter()
            .map(|(link, raw)| {
                if link.url != raw.url {
                    return Err(HarvestError::MetadataParse {
                        provider: context.provider_name.clone(),
                        collection: context.collection_name.clone(),
                        message: format!("metadata for {} attached to {}", raw.url, link.url),
                    });
                }

                let (projection, parameters) = match &context.collection {
                    Some(collection) => (
                        collection.projection.clone(),
                        collection
                            .parameter_lookups
                            .iter()
                            .filter(|(key, _)| link.url.contains(key.as_str()))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                    None => (None, Default::default()),
                };

                Ok(DatasetRecord {
                    url: link.url.clone(),
                    provider_name: link.provider_name.clone(),
                    collection_name: link.collection_name.clone(),
                    sub_name: link.sub_name.clone(),
                    content_type: raw.content_type.clone(),
                    content_length: raw.content_length,
                    last_modified: raw.last_modified.clone(),
                    projection,
                    parameters,
                    harvested_at,
                })
            })
            .collect()
    }
}
