//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made while crawling and harvesting:
//! - Building HTTP clients with the configured user agent and proxy
//! - HEAD probes for content type and size
//! - GET requests for directory listings

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use std::time::Duration;
use url::Url;

/// Response headers of a HEAD probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
}

impl Probe {
    /// Whether the resource is an HTML page whose links can be followed
    ///
    /// Responses without a content type count as HTML when the URL names a
    /// directory.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => ct.contains("text/html") || ct.contains("application/xhtml"),
            None => self.final_url.path().ends_with('/'),
        }
    }
}

/// A fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status_code: u16,
    pub body: String,
}

/// Failure of a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered with a non-success status
    Status(u16),
    /// Connection, TLS or timeout failure
    Network(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Network(e) => write!(f, "{}", e),
        }
    }
}

/// Builds an HTTP client with the given user agent and optional proxy
pub fn build_http_client(user_agent: &str, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network("Request timeout".to_string())
    } else if e.is_connect() {
        FetchError::Network("Connection refused".to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

fn header(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Sends a HEAD request and reports the response headers
///
/// Servers that reject HEAD (405 or 501) are probed with a GET whose body is
/// never read.
pub async fn probe_url(client: &Client, url: &Url) -> Result<Probe, FetchError> {
    let mut response = client.head(url.clone()).send().await.map_err(classify)?;

    if matches!(
        response.status(),
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
    ) {
        response = client.get(url.clone()).send().await.map_err(classify)?;
    }

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    Ok(Probe {
        final_url: response.url().clone(),
        status_code: status.as_u16(),
        content_type: header(&response, CONTENT_TYPE),
        content_length: header(&response, CONTENT_LENGTH).and_then(|v| v.parse().ok()),
        last_modified: header(&response, LAST_MODIFIED),
    })
}

/// Fetches a page body with GET
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client.get(url.clone()).send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().clone();
    let body = response.text().await.map_err(classify)?;
    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}
