use crate::model::CollectionDefinition;
use regex::Regex;

/// Why a URL was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefuseReason {
    /// Lies under an already-known collection
    Known,
    /// Matches a provider or built-in ignore pattern
    Ignored,
    /// Outside the crawl's required prefix
    OutOfScope,
}

/// Decision for a candidate URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlDecision {
    /// Terminal result: record it and never traverse beneath it
    Capture,
    /// Traverse it to find more links
    Follow,
    Refuse(RefuseReason),
}

impl UrlDecision {
    /// Returns true if the engine may fetch the URL
    pub fn is_visitable(&self) -> bool {
        !matches!(self, Self::Refuse(_))
    }
}

/// Compiled matcher for one crawl job
///
/// Decision order:
/// 1. Known patterns (highest priority)
/// 2. Ignore patterns
/// 3. Target (search key)
/// 4. Required prefix
/// 5. Out of scope (default)
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    target: Regex,
    known: Vec<Regex>,
    ignore: Vec<Regex>,
    required_prefix: String,
}

impl PatternMatcher {
    pub fn new(
        target: Regex,
        known: Vec<Regex>,
        ignore: Vec<Regex>,
        required_prefix: impl Into<String>,
    ) -> Self {
        Self {
            target,
            known,
            ignore,
            required_prefix: required_prefix.into(),
        }
    }

    /// Compiles all patterns, failing on the first invalid one
    pub fn compile(
        target: &str,
        known: &[String],
        ignore: &[String],
        required_prefix: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self::new(
            Regex::new(target)?,
            compile_patterns(known)?,
            compile_patterns(ignore)?,
            required_prefix,
        ))
    }

    pub fn decide(&self, url: &str) -> UrlDecision {
        if self.known.iter().any(|re| re.is_match(url)) {
            return UrlDecision::Refuse(RefuseReason::Known);
        }

        if self.ignore.iter().any(|re| re.is_match(url)) {
            return UrlDecision::Refuse(RefuseReason::Ignored);
        }

        if self.target.is_match(url) {
            return UrlDecision::Capture;
        }

        if url.starts_with(&self.required_prefix) {
            return UrlDecision::Follow;
        }

        UrlDecision::Refuse(RefuseReason::OutOfScope)
    }

    pub fn required_prefix(&self) -> &str {
        &self.required_prefix
    }
}

/// Compiles a list of regex sources
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

/// Known patterns for collections whose subtrees a seed crawl must not revisit
pub fn known_patterns(collections: &[CollectionDefinition]) -> Vec<String> {
    collections
        .iter()
        .filter(|c| c.mature)
        .map(CollectionDefinition::known_pattern)
        .collect()
}
