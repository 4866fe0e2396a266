use crate::UrlError;
use url::Url;

/// Normalizes a URL found on a directory listing
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https` (the scheme is kept as published)
/// 3. Require a host; the parser already lowercases it and drops default ports
/// 4. Collapse empty paths to `/`
/// 5. Remove the fragment
///
/// Trailing slashes are kept: on a directory server `/gfs` and `/gfs/` are
/// different resources. Query strings are kept as well; listing sort links
/// are dropped by ignore patterns instead.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("https://DATA.Example.gov:443/pub/gfs/#top").unwrap();
/// assert_eq!(url.as_str(), "https://data.example.gov/pub/gfs/");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    check(&url)?;

    if url.path().is_empty() {
        url.set_path("/");
    }
    url.set_fragment(None);

    Ok(url)
}

/// Resolves `href` against `base` and normalizes the result
pub fn resolve_url(base: &Url, href: &str) -> Result<Url, UrlError> {
    let joined = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_url(joined.as_str())
}

fn check(url: &Url) -> Result<(), UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }
    Ok(())
}

/// Scheme, host and port of `url`, e.g. `https://data.example.gov`
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
