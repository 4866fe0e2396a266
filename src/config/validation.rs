use crate::config::types::{
    CollectionEntry, Config, CrawlerConfig, HarvestConfig, ProviderConfig, StorageConfig,
    UserAgentConfig,
};
use crate::dates::validate_date_format;
use crate::model::DATE_PLACEHOLDER;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_harvest_config(&config.harvest)?;
    validate_providers(&config.providers)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.politeness_delay < 100 {
        return Err(ConfigError::Validation(format!(
            "politeness_delay must be >= 100ms, got {}ms",
            config.politeness_delay
        )));
    }

    if config.working_directory.is_empty() {
        return Err(ConfigError::Validation(
            "working_directory cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 10000, got {}",
            config.batch_size
        )));
    }
    if config.link_retention_days < 1 {
        return Err(ConfigError::Validation(
            "link_retention_days must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates provider entries and their collections
fn validate_providers(providers: &[ProviderConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for provider in providers {
        validate_name(&provider.name, "provider")?;

        if !names.insert(provider.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate provider '{}'",
                provider.name
            )));
        }

        let root = Url::parse(&provider.root_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid root URL '{}': {}",
                provider.root_url, e
            ))
        })?;
        validate_scheme(&root, &provider.root_url)?;

        validate_pattern(&provider.search_key)?;
        for pattern in &provider.ignore_patterns {
            validate_pattern(pattern)?;
        }

        let mut collection_names = HashSet::new();
        for collection in &provider.collections {
            if !collection_names.insert(collection.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate collection '{}' for provider '{}'",
                    collection.name, provider.name
                )));
            }
            validate_collection(collection)?;
        }
    }

    Ok(())
}

/// Validates a single collection entry
fn validate_collection(collection: &CollectionEntry) -> Result<(), ConfigError> {
    if collection.name.is_empty() {
        return Err(ConfigError::Validation(
            "collection name cannot be empty".to_string(),
        ));
    }

    let probe = collection.seed_url_template.replace(DATE_PLACEHOLDER, "0");
    let url = Url::parse(&probe).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid seed URL template '{}': {}",
            collection.seed_url_template, e
        ))
    })?;
    validate_scheme(&url, &collection.seed_url_template)?;

    let has_placeholder = collection.seed_url_template.contains(DATE_PLACEHOLDER);
    match &collection.date_format {
        Some(format) => {
            validate_date_format(format)?;
            if !has_placeholder {
                return Err(ConfigError::Validation(format!(
                    "Collection '{}' has a date format but its template has no {} placeholder",
                    collection.name, DATE_PLACEHOLDER
                )));
            }
        }
        None if has_placeholder => {
            return Err(ConfigError::Validation(format!(
                "Collection '{}' uses {} but has no date format",
                collection.name, DATE_PLACEHOLDER
            )));
        }
        None => {}
    }

    if let Some(search_key) = &collection.search_key {
        validate_pattern(search_key)?;
    }

    Ok(())
}

/// Provider names end up in lock keys and working directory names
fn validate_name(name: &str, what: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(format!("{} name cannot be empty", what)));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "{} name must contain only ASCII alphanumerics, '-' and '_', got '{}'",
            what, name
        )));
    }

    Ok(())
}

fn validate_scheme(url: &Url, raw: &str) -> Result<(), ConfigError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "URL '{}' must use http or https",
            raw
        )));
    }
    Ok(())
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn collection(template: &str, format: Option<&str>) -> CollectionEntry {
        CollectionEntry {
            name: "gfs".to_string(),
            seed_url_template: template.to_string(),
            date_format: format.map(str::to_string),
            url_key: String::new(),
            search_key: None,
            sub_name: None,
            last_known_date: None,
            posting_delay_hours: None,
            politeness_delay: None,
            ignore: false,
            mature: true,
            projection: None,
            parameter_lookups: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("noaa", "provider").is_ok());
        assert!(validate_name("noaa_ncep-1", "provider").is_ok());

        assert!(validate_name("", "provider").is_err());
        assert!(validate_name("no aa", "provider").is_err());
        assert!(validate_name("../etc", "provider").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_dated_collection_requires_placeholder() {
        let ok = collection("https://h.org/gfs/gfs.{date}/", Some("%Y%m%d"));
        assert!(validate_collection(&ok).is_ok());

        let missing = collection("https://h.org/gfs/", Some("%Y%m%d"));
        assert!(validate_collection(&missing).is_err());

        let undated = collection("https://h.org/gfs/{date}/", None);
        assert!(validate_collection(&undated).is_err());
    }

    #[test]
    fn test_collection_rejects_bad_date_format() {
        let bad = collection("https://h.org/gfs/{date}/", Some("%Q"));
        assert!(matches!(
            validate_collection(&bad),
            Err(ConfigError::InvalidDateFormat(_))
        ));
    }

    #[test]
    fn test_collection_rejects_ftp() {
        let ftp = collection("ftp://h.org/gfs/", None);
        assert!(validate_collection(&ftp).is_err());
    }
}
