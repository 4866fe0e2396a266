//! Harvesting queued links into dataset records
//!
//! - `extractor`: per-link raw metadata (HTTP headers by default)
//! - `parser`: per-batch conversion into [`DatasetRecord`](crate::model::DatasetRecord)s
//! - `coordinator`: the queue-draining loop with previous-run deduplication

pub mod coordinator;
pub mod extractor;
pub mod parser;

pub use coordinator::{split_by_bucket, HarvestCoordinator, HarvestSummary};
pub use extractor::{HttpHeaderExtractor, MetadataExtractor, RawMetadata};
pub use parser::{BasicRecordParser, BatchContext, MetadataParser};
