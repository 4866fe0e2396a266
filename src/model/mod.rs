//! Domain types shared by the crawl and harvest pipeline
//!
//! - `Link`: a discovered resource in the durable link queue
//! - `CollectionTemplate` / `CollectionDefinition`: inferred and persisted collections
//! - `CrawlJobDescriptor`: one computed unit of crawl work
//! - `DatasetRecord`: harvested metadata for one resource

mod collection;
mod job;
mod link;
mod record;

pub use collection::{
    reconcile, CollectionDefinition, CollectionTemplate, Reconciliation, DATE_PLACEHOLDER,
};
pub use job::{CrawlJobDescriptor, CrawlType};
pub use link::{Link, LinkTemplate, UNDATED_BUCKET};
pub use record::DatasetRecord;
