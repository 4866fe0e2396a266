//! Visitors binding the URL pattern matcher to the crawl engine

use crate::crawler::discovery::CollectionDiscovery;
use crate::crawler::engine::{CrawlVisitor, VisitedPage};
use crate::model::{CollectionTemplate, Link, LinkTemplate};
use crate::url::{PatternMatcher, UrlDecision};
use std::collections::HashSet;
use url::Url;

/// Collects target links for one main-sequence job
///
/// Captured URLs are recorded and never fetched. The list is persisted by the
/// orchestrator once the engine pass returns.
pub struct MainSequenceVisitor {
    matcher: PatternMatcher,
    template: LinkTemplate,
    links: Vec<Link>,
    captured: HashSet<String>,
}

impl MainSequenceVisitor {
    pub fn new(matcher: PatternMatcher, template: LinkTemplate) -> Self {
        Self {
            matcher,
            template,
            links: Vec::new(),
            captured: HashSet::new(),
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn into_links(self) -> Vec<Link> {
        self.links
    }
}

impl CrawlVisitor for MainSequenceVisitor {
    fn should_visit(&mut self, url: &Url) -> bool {
        match self.matcher.decide(url.as_str()) {
            UrlDecision::Capture => {
                if self.captured.insert(url.to_string()) {
                    tracing::trace!("Captured {}", url);
                    self.links.push(self.template.link(url.as_str()));
                }
                false
            }
            UrlDecision::Follow => true,
            UrlDecision::Refuse(reason) => {
                tracing::trace!("Refused {} ({:?})", url, reason);
                false
            }
        }
    }

    fn visit(&mut self, _page: &VisitedPage) -> bool {
        true
    }
}

/// Infers collections from the targets a seed crawl reaches
///
/// Targets are visited so the engine confirms they exist, but their links
/// are never followed.
pub struct SeedVisitor {
    matcher: PatternMatcher,
    discovery: CollectionDiscovery,
    targets: usize,
}

impl SeedVisitor {
    pub fn new(matcher: PatternMatcher, discovery: CollectionDiscovery) -> Self {
        Self {
            matcher,
            discovery,
            targets: 0,
        }
    }

    /// Number of target pages visited
    pub fn targets(&self) -> usize {
        self.targets
    }

    pub fn inconsistencies(&self) -> usize {
        self.discovery.inconsistencies()
    }

    pub fn into_templates(self) -> Vec<CollectionTemplate> {
        self.discovery.into_templates()
    }
}

impl CrawlVisitor for SeedVisitor {
    fn should_visit(&mut self, url: &Url) -> bool {
        let decision = self.matcher.decide(url.as_str());
        tracing::trace!("{} -> {:?}", url, decision);
        decision.is_visitable()
    }

    fn visit(&mut self, page: &VisitedPage) -> bool {
        if self.matcher.decide(page.url.as_str()) == UrlDecision::Capture {
            self.targets += 1;
            self.discovery.record(&page.url);
            return false;
        }
        true
    }
}
