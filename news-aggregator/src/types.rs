use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized item surfaced to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub source_key: String,
    pub source_label: String,
    pub published_at: DateTime<Utc>,
    pub author: String,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub saved: bool,
}

/// Which normalizer a payload is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    FeedXml,
    FeedJsonEnvelope,
    SocialListing,
}

impl SourceFormat {
    pub fn accept_header(&self) -> &'static str {
        match self {
            SourceFormat::FeedXml => "application/rss+xml, application/xml, text/xml, */*",
            SourceFormat::FeedJsonEnvelope | SourceFormat::SocialListing => "application/json, */*",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::FeedXml => "feed-xml",
            SourceFormat::FeedJsonEnvelope => "feed-json",
            SourceFormat::SocialListing => "social-listing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub key: String,
    pub label: String,
    pub endpoints: Vec<String>,
    pub format: SourceFormat,
    #[serde(default)]
    pub subgroup: Option<String>,
}

impl SourceDescriptor {
    pub fn new(key: &str, label: &str, format: SourceFormat, endpoints: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            format,
            subgroup: None,
        }
    }

    pub fn with_subgroup(mut self, subgroup: &str) -> Self {
        self.subgroup = Some(subgroup.to_string());
        self
    }
}

/// The merged snapshot as persisted by the cache layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub articles: Vec<Article>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Served from a fresh cache without touching the network.
    Cache,
    /// Produced by this refresh cycle.
    Network,
    /// Every source failed; the previous snapshot is served.
    Degraded,
    /// Every source failed and nothing was cached.
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub articles: Vec<Article>,
    pub errors: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Network,
    Timeout,
    Protocol,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Protocol => "protocol",
        };
        f.write_str(name)
    }
}

/// One failed endpoint/strategy combination.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub endpoint: String,
    pub strategy: String,
    pub error: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}: {}", self.endpoint, self.strategy, self.error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: TransportErrorKind, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Body too short: {len} bytes (minimum {min})")]
    EmptyBody { len: usize, min: usize },

    #[error("All {} attempts failed for {source_label}", .attempts.len())]
    SourceExhausted { source_label: String, attempts: Vec<AttemptFailure> },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AggregatorError {
    pub fn timeout(message: impl Into<String>) -> Self {
        AggregatorError::Transport {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for AggregatorError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() || e.is_request() {
            TransportErrorKind::Network
        } else {
            TransportErrorKind::Protocol
        };
        AggregatorError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
