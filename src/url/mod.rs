//! URL handling module for Sumi-Harvest
//!
//! This module provides URL normalization and the pattern matcher that
//! decides, for every candidate URL, whether a crawl captures it, follows it
//! or refuses it.

mod matcher;
mod normalize;

pub use matcher::{compile_patterns, known_patterns, PatternMatcher, RefuseReason, UrlDecision};
pub use normalize::{normalize_url, origin_of, resolve_url};

/// Ignore patterns applied to every crawl
///
/// Apache and nginx autoindex pages link to sorted views of themselves
/// (`?C=N;O=D`) and to their parent directory; neither leads anywhere new.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[r"\?[CO]=[A-Z](;[CO]=[A-Z])*$", r"/\.\./?$"];

/// Provider ignore patterns followed by the built-in defaults
pub fn ignore_patterns(provider_patterns: &[String]) -> Vec<String> {
    provider_patterns
        .iter()
        .cloned()
        .chain(DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()))
        .collect()
}
