use chrono::{DateTime, Utc};

/// Previous-run bucket of links found by undated crawl jobs
pub const UNDATED_BUCKET: &str = "undated";

/// A discovered resource queued for metadata extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Unique identifier of the link within the queue
    pub url: String,
    pub provider_name: String,
    pub collection_name: String,
    /// Optional sub-classification (e.g. a forecast member)
    pub sub_name: Option<String>,
    /// Wall-clock time of discovery
    pub creation_time: DateTime<Utc>,
    /// Previous-run bucket: the date fragment of the job that found the link
    pub bucket: String,
    pub processed: bool,
}

/// Identity fields shared by every link captured during one crawl job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    pub provider_name: String,
    pub collection_name: String,
    pub sub_name: Option<String>,
    pub bucket: String,
}

impl LinkTemplate {
    pub fn new(provider_name: &str, collection_name: &str, sub_name: Option<&str>) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            collection_name: collection_name.to_string(),
            sub_name: sub_name.map(str::to_string),
            bucket: UNDATED_BUCKET.to_string(),
        }
    }

    /// Buckets links under a crawl job's date fragment
    pub fn with_bucket(mut self, date_fragment: Option<&str>) -> Self {
        self.bucket = date_fragment.unwrap_or(UNDATED_BUCKET).to_string();
        self
    }

    /// Builds an unprocessed link discovered now
    pub fn link(&self, url: &str) -> Link {
        self.link_at(url, Utc::now())
    }

    /// Builds an unprocessed link with an explicit discovery time
    pub fn link_at(&self, url: &str, creation_time: DateTime<Utc>) -> Link {
        Link {
            url: url.to_string(),
            provider_name: self.provider_name.clone(),
            collection_name: self.collection_name.clone(),
            sub_name: self.sub_name.clone(),
            creation_time,
            bucket: self.bucket.clone(),
            processed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_copies_identity() {
        let template = LinkTemplate::new("noaa", "gfs", Some("member01"));
        let link = template.link("https://h.org/gfs/a.nc");

        assert_eq!(link.url, "https://h.org/gfs/a.nc");
        assert_eq!(link.provider_name, "noaa");
        assert_eq!(link.collection_name, "gfs");
        assert_eq!(link.sub_name.as_deref(), Some("member01"));
        assert!(!link.processed);
        assert_eq!(link.bucket, UNDATED_BUCKET);
    }

    #[test]
    fn test_bucket_follows_date_fragment() {
        let dated = LinkTemplate::new("noaa", "gfs", None).with_bucket(Some("20240115"));
        assert_eq!(dated.link("https://h.org/gfs/a.nc").bucket, "20240115");

        let undated = LinkTemplate::new("noaa", "gfs", None).with_bucket(None);
        assert_eq!(undated.link("https://h.org/gfs/a.nc").bucket, UNDATED_BUCKET);
    }
}
