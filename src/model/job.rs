use std::fmt;
use std::time::Duration;
use url::Url;

/// Kinds of lock-gated work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlType {
    Seed,
    MainSequence,
    Harvest,
}

impl CrawlType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::MainSequence => "main-sequence",
            Self::Harvest => "harvest",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "seed" => Some(Self::Seed),
            "main-sequence" => Some(Self::MainSequence),
            "harvest" => Some(Self::Harvest),
            _ => None,
        }
    }

    /// Lock registry key, also used to namespace engine working directories
    pub fn lock_key(&self, provider: &str) -> String {
        format!("{}-{}", provider, self.to_db_string())
    }
}

impl fmt::Display for CrawlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// One unit of crawl work; computed before each run and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJobDescriptor {
    pub provider_name: String,
    pub collection_name: String,
    pub sub_name: Option<String>,
    pub target_url: Url,
    /// Formatted date fragment; None for undated collections and seed crawls
    pub date_fragment: Option<String>,
    /// Regex identifying terminal result URLs
    pub search_key: String,
    /// Minimum interval between requests
    pub politeness_delay: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_type_roundtrip() {
        for crawl_type in [CrawlType::Seed, CrawlType::MainSequence, CrawlType::Harvest] {
            assert_eq!(
                CrawlType::from_db_string(crawl_type.to_db_string()),
                Some(crawl_type)
            );
        }
        assert_eq!(CrawlType::from_db_string("bogus"), None);
    }

    #[test]
    fn test_lock_key_format() {
        assert_eq!(CrawlType::Seed.lock_key("noaa"), "noaa-seed");
        assert_eq!(CrawlType::MainSequence.lock_key("noaa"), "noaa-main-sequence");
    }
}
