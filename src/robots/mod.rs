//! Robots.txt handling module
//!
//! This module provides functionality for fetching and parsing robots.txt
//! files so the crawl engine can honor `Disallow` rules and `Crawl-delay`.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;

/// Fetches robots.txt for an origin such as `https://data.example.gov`
///
/// Missing files, server errors and network failures all yield permissive
/// rules.
pub async fn fetch_robots(client: &reqwest::Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!("{} returned {}", robots_url, response.status());
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Robots.txt product token of a user-agent header (`Name/1.0 (...)` -> `Name`)
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(['/', ' '])
        .next()
        .filter(|token| !token.is_empty())
        .unwrap_or(user_agent)
}
