//! Source registry: which feeds are polled and how each one is parsed.

use crate::feed_utils;
use crate::types::{AggregatorError, Result, SourceDescriptor, SourceFormat};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Sources polled when no registry file is supplied.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        // Newsletters
        SourceDescriptor::new(
            "bens_bites",
            "Ben's Bites",
            SourceFormat::FeedXml,
            &[
                "https://bensbites.beehiiv.com/feed",
                "https://rss.beehiiv.com/feeds/2R3C6Bt5wj.xml",
            ],
        ),
        SourceDescriptor::new(
            "rundown_ai",
            "The Rundown AI",
            SourceFormat::FeedXml,
            &[
                "https://rss.beehiiv.com/feeds/2R3C6Bt5wj.xml",
                "https://www.therundown.ai/rss",
            ],
        ),
        // Communities
        SourceDescriptor::new(
            "reddit_artificial",
            "Reddit",
            SourceFormat::SocialListing,
            &["https://www.reddit.com/r/artificial/new.json?limit=50"],
        )
        .with_subgroup("artificial"),
        SourceDescriptor::new(
            "reddit_ml",
            "Reddit",
            SourceFormat::SocialListing,
            &["https://www.reddit.com/r/MachineLearning/new.json?limit=50"],
        )
        .with_subgroup("MachineLearning"),
    ]
}

/// Load a registry from a JSON array of descriptors.
pub async fn load_sources(path: impl AsRef<Path>) -> Result<Vec<SourceDescriptor>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;
    let sources: Vec<SourceDescriptor> = serde_json::from_str(&raw)?;
    validate_sources(&sources)?;
    info!("Loaded {} sources from {}", sources.len(), path.display());
    Ok(sources)
}

pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<()> {
    let mut keys = HashSet::new();

    for source in sources {
        if source.key.trim().is_empty() {
            return Err(AggregatorError::Config(format!(
                "source '{}' has an empty key",
                source.label
            )));
        }
        if !keys.insert(source.key.as_str()) {
            return Err(AggregatorError::Config(format!("duplicate source key '{}'", source.key)));
        }
        if source.endpoints.is_empty() {
            return Err(AggregatorError::Config(format!(
                "source '{}' has no endpoints",
                source.key
            )));
        }
        if let Some(bad) = source
            .endpoints
            .iter()
            .find(|e| !feed_utils::url::is_absolute_http(e))
        {
            return Err(AggregatorError::Config(format!(
                "source '{}' has a non-http endpoint: {}",
                source.key, bad
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_are_valid() {
        let sources = default_sources();
        assert_eq!(sources.len(), 4);
        validate_sources(&sources).unwrap();
        assert!(sources
            .iter()
            .filter(|s| s.format == SourceFormat::SocialListing)
            .all(|s| s.subgroup.is_some()));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let source = SourceDescriptor::new("a", "A", SourceFormat::FeedXml, &["https://a.test/feed"]);
        let err = validate_sources(&[source.clone(), source]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_relative_endpoint_rejected() {
        let source = SourceDescriptor::new("a", "A", SourceFormat::FeedXml, &["/feed.xml"]);
        assert!(validate_sources(&[source]).is_err());
    }

    #[test]
    fn test_registry_json_shape() {
        let raw = r#"[{"key":"hn","label":"HN","endpoints":["https://hn.test/rss"],"format":"feed_xml"}]"#;
        let sources: Vec<SourceDescriptor> = serde_json::from_str(raw).unwrap();
        assert_eq!(sources[0].format, SourceFormat::FeedXml);
        assert_eq!(sources[0].subgroup, None);
    }
}
