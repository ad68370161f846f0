use crate::types::{AggregatorError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONVERTER_URL: &str = "https://api.rss2json.com/v1/api.json";
pub const DEFAULT_SOCIAL_BASE_URL: &str = "https://www.reddit.com";

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub direct_timeout_ms: u64,
    pub relay_timeout_ms: u64,
    pub converter_timeout_ms: u64,
    pub max_redirects: usize,
    pub min_body_bytes: usize,
    /// Delegated relay; the strategy is skipped when unset.
    pub relay_url: Option<String>,
    /// Feed-to-JSON conversion service; the strategy is skipped when unset.
    pub converter_url: Option<String>,
    pub social_base_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; news-aggregator/0.1)".to_string(),
            direct_timeout_ms: 10_000,
            relay_timeout_ms: 12_000,
            converter_timeout_ms: 8_000,
            max_redirects: 5,
            min_body_bytes: 32,
            relay_url: None,
            converter_url: Some(DEFAULT_CONVERTER_URL.to_string()),
            social_base_url: DEFAULT_SOCIAL_BASE_URL.to_string(),
        }
    }
}

impl FetchConfig {
    /// Host every relayed social-listing target must belong to.
    pub fn social_domain(&self) -> String {
        url::Url::parse(&self.social_base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| "reddit.com".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub fetch: FetchConfig,
    pub retention_hours: i64,
    pub cache_ttl_hours: i64,
    pub summary_max_chars: usize,
    pub database_url: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            retention_hours: 48,
            cache_ttl_hours: 24,
            summary_max_chars: 300,
            database_url: "sqlite://news-aggregator.db".to_string(),
        }
    }
}

impl AggregatorConfig {
    /// Defaults overridden by `NEWS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("NEWS_DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(agent) = env::var("NEWS_USER_AGENT") {
            config.fetch.user_agent = agent;
        }
        if let Ok(relay) = env::var("NEWS_RELAY_URL") {
            config.fetch.relay_url = non_empty(relay);
        }
        // An empty value switches the converter strategy off
        if let Ok(converter) = env::var("NEWS_CONVERTER_URL") {
            config.fetch.converter_url = non_empty(converter);
        }
        if let Some(hours) = parse_var::<i64>("NEWS_RETENTION_HOURS")? {
            config.retention_hours = hours;
        }
        if let Some(hours) = parse_var::<i64>("NEWS_CACHE_TTL_HOURS")? {
            config.cache_ttl_hours = hours;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_hours <= 0 {
            return Err(AggregatorError::Config(format!(
                "retention window must be positive, got {}h",
                self.retention_hours
            )));
        }
        if self.cache_ttl_hours < 0 {
            return Err(AggregatorError::Config(format!(
                "cache TTL cannot be negative, got {}h",
                self.cache_ttl_hours
            )));
        }
        for (name, hours) in [
            ("retention window", self.retention_hours),
            ("cache TTL", self.cache_ttl_hours),
        ] {
            if hours > MAX_HOURS {
                return Err(AggregatorError::Config(format!(
                    "{} of {}h exceeds the {}h limit",
                    name, hours, MAX_HOURS
                )));
            }
        }
        for (name, url) in [
            ("relay", self.fetch.relay_url.as_deref()),
            ("converter", self.fetch.converter_url.as_deref()),
        ] {
            if let Some(url) = url {
                url::Url::parse(url)
                    .map_err(|e| AggregatorError::Config(format!("invalid {} URL {}: {}", name, url, e)))?;
            }
        }
        Ok(())
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }
}

/// Ten years. Larger windows overflow `chrono::Duration::hours`.
const MAX_HOURS: i64 = 24 * 365 * 10;

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AggregatorError::Config(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_domain_strips_www() {
        let config = FetchConfig::default();
        assert_eq!(config.social_domain(), "reddit.com");
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = AggregatorConfig {
            retention_hours: 0,
            ..AggregatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let config = AggregatorConfig {
            retention_hours: i64::MAX,
            ..AggregatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));

        let config = AggregatorConfig {
            cache_ttl_hours: MAX_HOURS + 1,
            ..AggregatorConfig::default()
        };
        assert!(matches!(config.validate(), Err(AggregatorError::Config(_))));

        let config = AggregatorConfig {
            retention_hours: MAX_HOURS,
            cache_ttl_hours: MAX_HOURS,
            ..AggregatorConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.retention().num_hours(), MAX_HOURS);
    }

    #[test]
    fn test_validate_rejects_bad_relay_url() {
        let mut config = AggregatorConfig::default();
        config.fetch.relay_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }
}
