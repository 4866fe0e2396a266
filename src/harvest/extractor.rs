//! Per-link metadata extraction

use crate::crawler::fetcher::{build_http_client, probe_url};
use crate::model::Link;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// Raw metadata fetched for one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMetadata {
    pub url: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
}

/// Fetches raw metadata for individual links
///
/// Extractors are stateful and live for one harvest pass.
#[async_trait]
pub trait MetadataExtractor: Send {
    async fn extract(&mut self, link: &Link) -> Result<RawMetadata>;
}

/// Extracts response headers with a HEAD request
///
/// The most recent result is cached by URL so repeated requests for the same
/// link within one extractor lifetime hit the network once.
pub struct HttpHeaderExtractor {
    client: Client,
    last: Option<RawMetadata>,
}

impl HttpHeaderExtractor {
    pub fn new(user_agent: &str, proxy: Option<&str>) -> Result<Self> {
        Ok(Self::with_client(build_http_client(user_agent, proxy)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client, last: None }
    }
}

#[async_trait]
impl MetadataExtractor for HttpHeaderExtractor {
    async fn extract(&mut self, link: &Link) -> Result<RawMetadata> {
        if let Some(cached) = self.last.as_ref().filter(|m| m.url == link.url) {
            return Ok(cached.clone());
        }

        let url = Url::parse(&link.url)?;
        let probe = probe_url(&self.client, &url)
            .await
            .map_err(|e| HarvestError::Extraction {
                url: link.url.clone(),
                message: e.to_string(),
            })?;

        let metadata = RawMetadata {
            url: link.url.clone(),
            content_type: probe.content_type,
            content_length: probe.content_length,
            last_modified: probe.last_modified,
        };
        self.last = Some(metadata.clone());
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkTemplate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_extracts_headers_once_per_url() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/gfs/a.grb2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .insert_header("last-modified", "Mon, 15 Jan 2024 06:00:00 GMT"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let link = LinkTemplate::new("noaa", "gfs", None).link(&format!("{}/gfs/a.grb2", server.uri()));
        let mut extractor = HttpHeaderExtractor::new("TestHarvester/1.0", None).unwrap();

        let first = extractor.extract(&link).await.unwrap();
        let second = extractor.extract(&link).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(
            first.last_modified.as_deref(),
            Some("Mon, 15 Jan 2024 06:00:00 GMT")
        );
    }

    #[tokio::test]
    async fn test_missing_resource_is_an_extraction_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let link = LinkTemplate::new("noaa", "gfs", None).link(&format!("{}/gone.grb2", server.uri()));
        let mut extractor = HttpHeaderExtractor::new("TestHarvester/1.0", None).unwrap();

        match extractor.extract(&link).await {
            Err(HarvestError::Extraction { url, message }) => {
                assert_eq!(url, link.url);
                assert_eq!(message, "HTTP 404");
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
    }
}
