//! Link extraction from directory listings
//!
//! Provider servers publish their trees as HTML index pages. Only `<a href>`
//! anchors matter; everything else on the page is ignored.

use crate::url::resolve_url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts the absolute, normalized links of a listing page
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anchors resolving to http(s) URLs
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Links back to the page itself
/// - Duplicates (first occurrence wins)
pub fn extract_links(html: &str, base_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&anchors) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_link(href, base_url) else {
            continue;
        };
        if url.as_str() == base_url.as_str() {
            continue;
        }
        if seen.insert(url.to_string()) {
            links.push(url);
        }
    }

    links
}

fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    resolve_url(base_url, href).ok()
}
