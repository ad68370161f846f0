use crate::config::{millis, FetchConfig};
use crate::types::{AggregatorError, Result, SourceFormat};
use std::fmt;
use std::time::Duration;
use url::Url;

/// One way of retrieving an endpoint. A source's chain is tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Plain GET through the transport.
    Direct,
    /// GET `<base>?url=<endpoint>` on the delegated relay.
    Relay { base: String },
    /// GET `<base>?rss_url=<endpoint>`; always answers with a JSON envelope.
    Converter { base: String },
}

impl Strategy {
    /// Ordered strategies for a source of the given format.
    pub fn chain_for(format: SourceFormat, config: &FetchConfig) -> Vec<Strategy> {
        let mut chain = vec![Strategy::Direct];

        if let Some(base) = &config.relay_url {
            chain.push(Strategy::Relay { base: base.clone() });
        }
        if format == SourceFormat::FeedXml {
            if let Some(base) = &config.converter_url {
                chain.push(Strategy::Converter { base: base.clone() });
            }
        }

        chain
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Relay { .. } => "relay",
            Strategy::Converter { .. } => "converter",
        }
    }

    pub fn timeout(&self, config: &FetchConfig) -> Duration {
        match self {
            Strategy::Direct => millis(config.direct_timeout_ms),
            Strategy::Relay { .. } => millis(config.relay_timeout_ms),
            Strategy::Converter { .. } => millis(config.converter_timeout_ms),
        }
    }

    /// Format the response body is parsed as.
    pub fn payload_format(&self, source_format: SourceFormat) -> SourceFormat {
        match self {
            Strategy::Converter { .. } => SourceFormat::FeedJsonEnvelope,
            _ => source_format,
        }
    }

    /// URL actually requested for `endpoint`.
    pub fn request_url(&self, endpoint: &str, source_format: SourceFormat, config: &FetchConfig) -> Result<String> {
        match self {
            Strategy::Direct => {
                let target = parse_http_target(endpoint)?;
                Ok(target.to_string())
            }
            Strategy::Relay { base } => {
                let target = validate_relay_target(endpoint, source_format, &config.social_domain())?;
                let url = Url::parse_with_params(base, &[("url", target.as_str())])?;
                Ok(url.to_string())
            }
            Strategy::Converter { base } => {
                let target = parse_http_target(endpoint)?;
                let url = Url::parse_with_params(base, &[("rss_url", target.as_str())])?;
                Ok(url.to_string())
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The relay only forwards http(s) targets, and only platform hosts for
/// social listings.
pub fn validate_relay_target(target: &str, format: SourceFormat, social_domain: &str) -> Result<Url> {
    let url = parse_http_target(target)?;

    if format == SourceFormat::SocialListing {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let allowed = host == social_domain || host.ends_with(&format!(".{}", social_domain));
        if !allowed {
            return Err(AggregatorError::Validation(format!(
                "relay target host '{}' is not on {}",
                host, social_domain
            )));
        }
    }

    Ok(url)
}

fn parse_http_target(target: &str) -> Result<Url> {
    let url = Url::parse(target.trim())
        .map_err(|e| AggregatorError::Validation(format!("malformed target {}: {}", target, e)))?;

    let supported = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    if !supported {
        return Err(AggregatorError::Validation(format!(
            "unsupported target scheme '{}' in {}",
            url.scheme(),
            target
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_relay() -> FetchConfig {
        FetchConfig {
            relay_url: Some("https://relay.test/fetch".to_string()),
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_chain_order() {
        let config = config_with_relay();
        let xml = Strategy::chain_for(SourceFormat::FeedXml, &config);
        assert_eq!(
            xml.iter().map(|s| s.name()).collect::<Vec<_>>(),
            vec!["direct", "relay", "converter"]
        );

        let social = Strategy::chain_for(SourceFormat::SocialListing, &config);
        assert_eq!(
            social.iter().map(|s| s.name()).collect::<Vec<_>>(),
            vec!["direct", "relay"]
        );
    }

    #[test]
    fn test_timeouts_are_per_strategy() {
        let config = FetchConfig::default();
        assert_eq!(Strategy::Direct.timeout(&config), Duration::from_secs(10));
        let relay = Strategy::Relay { base: "https://relay.test".to_string() };
        assert_eq!(relay.timeout(&config), Duration::from_secs(12));
        let converter = Strategy::Converter { base: "https://conv.test".to_string() };
        assert_eq!(converter.timeout(&config), Duration::from_secs(8));
    }

    #[test]
    fn test_relay_url_encodes_target() {
        let config = config_with_relay();
        let relay = Strategy::Relay { base: "https://relay.test/fetch".to_string() };
        let url = relay
            .request_url("https://www.reddit.com/r/rust/new.json?limit=5", SourceFormat::SocialListing, &config)
            .unwrap();
        assert!(url.starts_with("https://relay.test/fetch?url=https%3A%2F%2Fwww.reddit.com"));
    }

    #[test]
    fn test_relay_rejects_foreign_host_for_social() {
        let err = validate_relay_target("https://evil.test/r/rust.json", SourceFormat::SocialListing, "reddit.com")
            .unwrap_err();
        assert!(matches!(err, AggregatorError::Validation(_)));

        assert!(validate_relay_target("https://old.reddit.com/r/rust.json", SourceFormat::SocialListing, "reddit.com").is_ok());
        assert!(validate_relay_target("https://evil.test/feed", SourceFormat::FeedXml, "reddit.com").is_ok());
    }

    #[test]
    fn test_relay_rejects_non_http_scheme() {
        let err = validate_relay_target("file:///etc/passwd", SourceFormat::FeedXml, "reddit.com").unwrap_err();
        assert!(matches!(err, AggregatorError::Validation(_)));
    }

    #[test]
    fn test_converter_changes_payload_format() {
        let converter = Strategy::Converter { base: "https://conv.test".to_string() };
        assert_eq!(converter.payload_format(SourceFormat::FeedXml), SourceFormat::FeedJsonEnvelope);
        assert_eq!(Strategy::Direct.payload_format(SourceFormat::FeedXml), SourceFormat::FeedXml);
    }
}
