//! Date-format inference for dated directory names
//!
//! Providers encode publication dates in path segments in many ways
//! (`2024-01-15`, `gfs.20240115`, `run_2024_01_15`). The seed crawl asks a
//! [`DateFormatRecognizer`] to find such a token inside a single segment and
//! name its chrono strftime pattern; the main-sequence crawl later formats
//! calendar dates back into URL fragments with the same pattern.

use crate::{ConfigError, HarvestError};
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::fmt::Write;

/// A date token found inside a path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// chrono strftime pattern, e.g. `%Y%m%d`
    pub format: String,
    /// The matched text, e.g. `20240115`
    pub token: String,
    /// Byte offset of the token within the fragment
    pub start: usize,
    /// The parsed calendar date
    pub date: NaiveDate,
}

/// Recognizes and parses date tokens in URL fragments
pub trait DateFormatRecognizer: Send + Sync {
    /// Finds the first date token in `fragment`, if any
    fn recognize(&self, fragment: &str) -> Option<DateMatch>;

    /// Parses `fragment` with a known `format`
    fn parse(&self, format: &str, fragment: &str) -> Option<NaiveDate> {
        parse_date(format, fragment)
    }
}

/// Built-in formats, most specific first
const BUILT_IN_FORMATS: &[(&str, &str)] = &[
    ("%Y-%m-%d", r"\d{4}-\d{2}-\d{2}"),
    ("%Y_%m_%d", r"\d{4}_\d{2}_\d{2}"),
    ("%Y.%m.%d", r"\d{4}\.\d{2}\.\d{2}"),
    ("%Y%m%d", r"\d{8}"),
    ("%Y-%m", r"\d{4}-\d{2}"),
];

/// Regex-driven recognizer validated with chrono
///
/// A candidate token must be delimited by non-digits (or the ends of the
/// fragment), parse as a real calendar date and fall in 1900..=2100.
#[derive(Debug, Clone)]
pub struct PatternDateRecognizer {
    formats: Vec<(String, Regex)>,
}

impl PatternDateRecognizer {
    /// Builds a recognizer from `(strftime, regex)` pairs tried in order
    pub fn with_formats(formats: &[(&str, &str)]) -> Result<Self, regex::Error> {
        let formats = formats
            .iter()
            .map(|(format, pattern)| {
                Regex::new(&format!(r"(?:^|\D)({})(?:\D|$)", pattern))
                    .map(|re| (format.to_string(), re))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { formats })
    }
}

impl Default for PatternDateRecognizer {
    fn default() -> Self {
        Self::with_formats(BUILT_IN_FORMATS).expect("built-in date patterns compile")
    }
}

impl DateFormatRecognizer for PatternDateRecognizer {
    fn recognize(&self, fragment: &str) -> Option<DateMatch> {
        for (format, re) in &self.formats {
            for caps in re.captures_iter(fragment) {
                let Some(m) = caps.get(1) else { continue };
                if let Some(date) = parse_date(format, m.as_str()) {
                    return Some(DateMatch {
                        format: format.clone(),
                        token: m.as_str().to_string(),
                        start: m.start(),
                        date,
                    });
                }
            }
        }
        None
    }
}

/// Parses a date token; month-only formats resolve to the first of the month
pub fn parse_date(format: &str, fragment: &str) -> Option<NaiveDate> {
    let parsed = if format.contains("%d") || format.contains("%j") || format.contains("%F") {
        NaiveDate::parse_from_str(fragment, format).ok()
    } else {
        NaiveDate::parse_from_str(&format!("{}|01", fragment), &format!("{}|%d", format)).ok()
    }?;

    (1900..=2100).contains(&parsed.year()).then_some(parsed)
}

/// Formats `date` into a URL fragment
pub fn format_date(format: &str, date: NaiveDate) -> Result<String, HarvestError> {
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| HarvestError::DateFormat(format!("cannot format date with '{}'", format)))?;
    Ok(out)
}

/// Rejects empty or malformed strftime patterns
pub fn validate_date_format(format: &str) -> Result<(), ConfigError> {
    if format.is_empty() {
        return Err(ConfigError::InvalidDateFormat(
            "date format cannot be empty".to_string(),
        ));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidDateFormat(format!(
            "'{}' is not a valid strftime pattern",
            format
        )));
    }
    Ok(())
}
