//! Collection definitions and seed-crawl reconciliation

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Placeholder for the date fragment inside a seed URL template
pub const DATE_PLACEHOLDER: &str = "{date}";

/// A collection as inferred by one seed crawl pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTemplate {
    pub name: String,
    /// URL path the collection lives under, e.g. `/modelA`
    pub collection_key: String,
    pub seed_url_template: String,
    /// None for collections whose path carries no date
    pub date_format: Option<String>,
    /// Literal remainder of the dated segment once the date is stripped
    pub url_key: String,
    /// Date tokens observed during the pass
    pub dates: BTreeSet<String>,
    pub latest_date: Option<NaiveDate>,
}

impl CollectionTemplate {
    /// Records an observed date token
    pub fn observe(&mut self, token: &str, date: Option<NaiveDate>) {
        self.dates.insert(token.to_string());
        if let Some(date) = date {
            if self.latest_date.map_or(true, |latest| date > latest) {
                self.latest_date = Some(date);
            }
        }
    }
}

/// Persisted collection configuration for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDefinition {
    pub provider_name: String,
    pub name: String,
    pub seed_url_template: String,
    pub date_format: Option<String>,
    pub url_key: String,
    /// Overrides the provider's search key
    pub search_key: Option<String>,
    pub sub_name: Option<String>,
    pub last_known_date: Option<NaiveDate>,
    pub posting_delay_hours: Option<u32>,
    pub politeness_delay_ms: Option<u64>,
    /// Ignored collections are skipped by the main-sequence crawl
    pub ignore: bool,
    /// Mature collections are not re-traversed by seed crawls
    pub mature: bool,
    pub projection: Option<String>,
    pub parameter_lookups: BTreeMap<String, String>,
}

impl CollectionDefinition {
    /// Creates a fresh definition from a seed-crawl template
    pub fn from_template(provider: &str, template: &CollectionTemplate) -> Self {
        Self {
            provider_name: provider.to_string(),
            name: template.name.clone(),
            seed_url_template: template.seed_url_template.clone(),
            date_format: template.date_format.clone(),
            url_key: template.url_key.clone(),
            search_key: None,
            sub_name: None,
            last_known_date: template.latest_date,
            posting_delay_hours: None,
            politeness_delay_ms: None,
            ignore: false,
            mature: false,
            projection: None,
            parameter_lookups: BTreeMap::new(),
        }
    }

    /// Whether the collection's URLs vary by date
    pub fn tracks_dates(&self) -> bool {
        self.date_format.is_some()
    }

    /// Regex matching every URL at or below this collection
    ///
    /// The `{date}` placeholder and anything after it are matched by `.*`.
    pub fn known_pattern(&self) -> String {
        let prefix = self
            .seed_url_template
            .split(DATE_PLACEHOLDER)
            .next()
            .unwrap_or_default();
        format!("^{}.*", regex::escape(prefix))
    }
}

/// Result of merging seed-crawl templates into existing definitions
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Definitions to persist (new and updated)
    pub definitions: Vec<CollectionDefinition>,
    pub added: usize,
    pub updated: usize,
}

/// Merges freshly observed templates into a provider's collections
///
/// New collections are added. For collections already defined, identity and
/// date fields come from the template while operator overrides (ignore flag,
/// projection, parameter lookups, search key, sub name, delays, maturity) are
/// kept. `last_known_date` only moves forward.
pub fn reconcile(
    provider: &str,
    existing: &[CollectionDefinition],
    discovered: &[CollectionTemplate],
) -> Reconciliation {
    let by_name: HashMap<&str, &CollectionDefinition> =
        existing.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut result = Reconciliation::default();

    for template in discovered {
        match by_name.get(template.name.as_str()) {
            Some(current) => {
                let mut merged = (*current).clone();
                merged.seed_url_template = template.seed_url_template.clone();
                merged.date_format = template.date_format.clone();
                merged.url_key = template.url_key.clone();
                merged.last_known_date = match (current.last_known_date, template.latest_date) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
                result.definitions.push(merged);
                result.updated += 1;
            }
            None => {
                result
                    .definitions
                    .push(CollectionDefinition::from_template(provider, template));
                result.added += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template(name: &str, format: Option<&str>, latest: Option<NaiveDate>) -> CollectionTemplate {
        CollectionTemplate {
            name: name.to_string(),
            collection_key: format!("/{}", name),
            seed_url_template: format!("https://h.org/{}/{{date}}/", name),
            date_format: format.map(str::to_string),
            url_key: String::new(),
            dates: BTreeSet::new(),
            latest_date: latest,
        }
    }

    fn existing(name: &str) -> CollectionDefinition {
        let mut lookups = BTreeMap::new();
        lookups.insert("tmp".to_string(), "air_temperature".to_string());
        CollectionDefinition {
            provider_name: "noaa".to_string(),
            name: name.to_string(),
            seed_url_template: format!("https://old.h.org/{}/", name),
            date_format: None,
            url_key: "old".to_string(),
            search_key: Some(r".*\.grb2$".to_string()),
            sub_name: Some("member01".to_string()),
            last_known_date: Some(ymd(2024, 1, 10)),
            posting_delay_hours: Some(6),
            politeness_delay_ms: Some(2000),
            ignore: true,
            mature: true,
            projection: Some("EPSG:4326".to_string()),
            parameter_lookups: lookups,
        }
    }

    #[test]
    fn test_reconcile_adds_new_collections() {
        let result = reconcile("noaa", &[], &[template("modelA", Some("%Y-%m-%d"), None)]);

        assert_eq!(result.added, 1);
        assert_eq!(result.updated, 0);
        let added = &result.definitions[0];
        assert_eq!(added.provider_name, "noaa");
        assert!(!added.mature);
        assert!(!added.ignore);
    }

    #[test]
    fn test_reconcile_preserves_overrides() {
        let current = existing("modelA");
        let fresh = template("modelA", Some("%Y-%m-%d"), Some(ymd(2024, 1, 15)));

        let result = reconcile("noaa", &[current.clone()], &[fresh.clone()]);
        assert_eq!(result.updated, 1);
        let merged = &result.definitions[0];

        // Identity and date fields from the fresh template
        assert_eq!(merged.seed_url_template, fresh.seed_url_template);
        assert_eq!(merged.date_format.as_deref(), Some("%Y-%m-%d"));
        assert_eq!(merged.url_key, "");
        assert_eq!(merged.last_known_date, Some(ymd(2024, 1, 15)));

        // Operator overrides from the existing definition
        assert!(merged.ignore);
        assert!(merged.mature);
        assert_eq!(merged.projection, current.projection);
        assert_eq!(merged.parameter_lookups, current.parameter_lookups);
        assert_eq!(merged.search_key, current.search_key);
        assert_eq!(merged.sub_name, current.sub_name);
        assert_eq!(merged.posting_delay_hours, Some(6));
    }

    #[test]
    fn test_reconcile_never_moves_last_known_date_back() {
        let current = existing("modelA");
        let stale = template("modelA", Some("%Y-%m-%d"), Some(ymd(2023, 6, 1)));

        let result = reconcile("noaa", &[current], &[stale]);
        assert_eq!(result.definitions[0].last_known_date, Some(ymd(2024, 1, 10)));
    }

    #[test]
    fn test_known_pattern_stops_at_placeholder() {
        let mut def = existing("gfs");
        def.seed_url_template = "https://h.org/pub/gfs.{date}/".to_string();
        let re = regex::Regex::new(&def.known_pattern()).unwrap();

        assert!(re.is_match("https://h.org/pub/gfs.20240115/a.nc"));
        assert!(!re.is_match("https://h.org/pub/gfsX20240115/a.nc"));
        assert!(!re.is_match("https://h.org/pub/nam.20240115/"));
    }

    #[test]
    fn test_observe_tracks_latest_date() {
        let mut t = template("modelA", Some("%Y-%m-%d"), None);
        t.observe("2024-01-02", Some(ymd(2024, 1, 2)));
        t.observe("2024-01-01", Some(ymd(2024, 1, 1)));

        assert_eq!(t.dates.len(), 2);
        assert_eq!(t.latest_date, Some(ymd(2024, 1, 2)));
    }
}
