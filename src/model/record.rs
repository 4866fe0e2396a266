use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Structured metadata produced for one harvested resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub url: String,
    pub provider_name: String,
    pub collection_name: String,
    pub sub_name: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// `Last-Modified` as published by the server
    pub last_modified: Option<String>,
    pub projection: Option<String>,
    /// Collection parameter lookups that apply to this resource
    pub parameters: BTreeMap<String, String>,
    pub harvested_at: DateTime<Utc>,
}
