//! Collection inference from target URLs found by a seed crawl
//!
//! For a target such as `https://h.org/modelA/2024-01-15/file.grb2` the path
//! is split into directory segments (`modelA`, `2024-01-15`) and searched
//! from the top for a date token. The first dated segment splits the path:
//! everything above it is the collection key (`/modelA`), the token is the
//! date fragment, and the segment with the token replaced by `{date}` becomes
//! part of the seed URL template (`https://h.org/modelA/{date}/`).

use crate::dates::DateFormatRecognizer;
use crate::model::{CollectionTemplate, DATE_PLACEHOLDER};
use crate::url::origin_of;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use url::Url;

/// Where the date sits in one target URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateDepth {
    /// Index of the dated directory segment
    pub depth: usize,
    pub collection_key: String,
    pub date_fragment: String,
    pub format: String,
    pub url_key: String,
    pub seed_url_template: String,
}

/// Finds the shallowest dated directory segment of `url`
pub fn resolve_date_depth(url: &Url, recognizer: &dyn DateFormatRecognizer) -> Option<DateDepth> {
    let dirs = directory_segments(url);
    let origin = origin_of(url);

    dirs.iter().enumerate().find_map(|(depth, segment)| {
        let found = recognizer.recognize(segment)?;
        let end = found.start + found.token.len();
        let collection_key = key_of(&dirs[..depth]);
        let url_key = format!("{}{}", &segment[..found.start], &segment[end..]);
        let templated = format!("{}{}{}", &segment[..found.start], DATE_PLACEHOLDER, &segment[end..]);

        Some(DateDepth {
            depth,
            seed_url_template: format!("{}{}/{}/", origin, collection_key, templated),
            collection_key,
            date_fragment: found.token,
            format: found.format,
            url_key,
        })
    })
}

/// Non-empty path segments above the final one
fn directory_segments(url: &Url) -> Vec<String> {
    let path = url.path().trim_start_matches('/');
    let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();
    segments.pop();
    segments.retain(|s| !s.is_empty());
    segments
}

fn key_of(segments: &[String]) -> String {
    segments.iter().map(|s| format!("/{}", s)).collect()
}

/// Collection name derived from its key and url key
pub fn collection_name(collection_key: &str, url_key: &str) -> String {
    let mut parts: Vec<&str> = collection_key.split('/').filter(|s| !s.is_empty()).collect();
    let url_key = url_key.trim_matches(|c: char| !c.is_ascii_alphanumeric());
    if !url_key.is_empty() {
        parts.push(url_key);
    }
    if parts.is_empty() {
        "root".to_string()
    } else {
        parts.join("_")
    }
}

/// Identity of a discovered template; dated entries order first
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TemplateId {
    Dated {
        collection_key: String,
        url_key: String,
    },
    Undated {
        collection_key: String,
    },
}

/// Accumulates collection templates over one seed pass
pub struct CollectionDiscovery {
    recognizer: Arc<dyn DateFormatRecognizer>,
    templates: BTreeMap<TemplateId, CollectionTemplate>,
    inconsistencies: usize,
}

impl CollectionDiscovery {
    pub fn new(recognizer: Arc<dyn DateFormatRecognizer>) -> Self {
        Self {
            recognizer,
            templates: BTreeMap::new(),
            inconsistencies: 0,
        }
    }

    /// Folds one target URL into the templates
    pub fn record(&mut self, url: &Url) {
        match resolve_date_depth(url, self.recognizer.as_ref()) {
            Some(found) => self.record_dated(url, found),
            None => self.record_undated(url),
        }
    }

    fn record_dated(&mut self, url: &Url, found: DateDepth) {
        let date = self.recognizer.parse(&found.format, &found.date_fragment);
        let id = TemplateId::Dated {
            collection_key: found.collection_key.clone(),
            url_key: found.url_key.clone(),
        };

        match self.templates.get_mut(&id) {
            Some(template) => {
                if template.date_format.as_deref() == Some(found.format.as_str()) {
                    template.observe(&found.date_fragment, date);
                } else {
                    tracing::warn!(
                        "Collection {} uses {:?} but {} carries a {} date; ignoring it",
                        template.name,
                        template.date_format,
                        url,
                        found.format
                    );
                    self.inconsistencies += 1;
                }
            }
            None => {
                let mut template = CollectionTemplate {
                    name: collection_name(&found.collection_key, &found.url_key),
                    collection_key: found.collection_key,
                    seed_url_template: found.seed_url_template,
                    date_format: Some(found.format),
                    url_key: found.url_key,
                    dates: Default::default(),
                    latest_date: None,
                };
                template.observe(&found.date_fragment, date);
                tracing::debug!("Discovered dated collection {}", template.name);
                self.templates.insert(id, template);
            }
        }
    }

    fn record_undated(&mut self, url: &Url) {
        let dirs = directory_segments(url);
        let collection_key = key_of(&dirs);
        let id = TemplateId::Undated {
            collection_key: collection_key.clone(),
        };
        if self.templates.contains_key(&id) {
            return;
        }

        let seed_url_template = if collection_key.is_empty() {
            format!("{}/", origin_of(url))
        } else {
            format!("{}{}/", origin_of(url), collection_key)
        };
        let template = CollectionTemplate {
            name: collection_name(&collection_key, ""),
            collection_key,
            seed_url_template,
            date_format: None,
            url_key: String::new(),
            dates: Default::default(),
            latest_date: None,
        };
        tracing::debug!("Discovered undated collection {}", template.name);
        self.templates.insert(id, template);
    }

    /// Number of dated URLs whose format disagreed with their collection
    pub fn inconsistencies(&self) -> usize {
        self.inconsistencies
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates with unique names
    ///
    /// When two templates derive the same name the first one wins, so a
    /// dated collection is kept over an undated one.
    pub fn into_templates(self) -> Vec<CollectionTemplate> {
        let mut names = HashSet::new();
        let mut templates = Vec::with_capacity(self.templates.len());
        for template in self.templates.into_values() {
            if names.insert(template.name.clone()) {
                templates.push(template);
            } else {
                tracing::warn!(
                    "Collection name {} is already taken; dropping {}",
                    template.name,
                    template.seed_url_template
                );
            }
        }
        templates
    }
}
