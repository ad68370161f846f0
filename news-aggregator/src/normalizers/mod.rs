//! Per-format normalization into [`Article`]s.
//!
//! Every normalizer applies the retention window here, so an out-of-window
//! item never reaches the merge step.

pub mod feed_json;
pub mod feed_xml;
pub mod listing;

pub use feed_json::FeedEnvelope;
pub use listing::Listing;

use crate::feed_utils;
use crate::types::{AggregatorError, Article, Result, SourceDescriptor, SourceFormat};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// A structurally valid response body, decoded by format.
#[derive(Debug)]
pub enum Payload {
    Xml(feed_rs::model::Feed),
    JsonEnvelope(FeedEnvelope),
    Listing(Listing),
}

impl Payload {
    pub fn decode(format: SourceFormat, body: &str) -> Result<Self> {
        match format {
            SourceFormat::FeedXml => feed_rs::parser::parse(body.as_bytes())
                .map(Payload::Xml)
                .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e))),
            SourceFormat::FeedJsonEnvelope => FeedEnvelope::parse(body).map(Payload::JsonEnvelope),
            SourceFormat::SocialListing => Listing::parse(body).map(Payload::Listing),
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            Payload::Xml(feed) => feed.entries.len(),
            Payload::JsonEnvelope(envelope) => envelope.items.len(),
            Payload::Listing(listing) => listing.data.children.len(),
        }
    }
}

/// Everything a normalization pass needs. `cutoff` is fixed for the pass.
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub source: &'a SourceDescriptor,
    pub now: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub summary_max_chars: usize,
    pub social_base_url: &'a str,
}

impl<'a> NormalizeContext<'a> {
    pub fn new(
        source: &'a SourceDescriptor,
        now: DateTime<Utc>,
        retention: Duration,
        summary_max_chars: usize,
        social_base_url: &'a str,
    ) -> Self {
        Self {
            source,
            now,
            cutoff: now - retention,
            summary_max_chars,
            social_base_url,
        }
    }

    pub fn in_window(&self, published_at: DateTime<Utc>) -> bool {
        published_at >= self.cutoff
    }

    pub fn summarize(&self, html: &str) -> String {
        feed_utils::feed::html_to_text(html, self.summary_max_chars)
    }
}

/// Fields extracted from one raw item, before identity is assigned.
#[derive(Debug, Clone)]
pub struct ArticleDraft {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub author: String,
    pub score: Option<i64>,
    pub thumbnail: Option<String>,
}

/// Result of one pass: kept articles plus what was dropped and why.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub articles: Vec<Article>,
    pub seen: usize,
    pub stale: usize,
    pub malformed: usize,
    /// Well-formed items the source marks as not news (pinned posts)
    pub skipped: usize,
}

impl NormalizedBatch {
    fn malformed(&mut self, reason: &str) {
        self.seen += 1;
        self.malformed += 1;
        debug!("Skipping malformed item: {}", reason);
    }

    fn skip(&mut self, reason: &str) {
        self.seen += 1;
        self.skipped += 1;
        debug!("Skipping item: {}", reason);
    }

    fn admit(&mut self, ctx: &NormalizeContext<'_>, draft: ArticleDraft) {
        self.seen += 1;

        if !ctx.in_window(draft.published_at) {
            self.stale += 1;
            return;
        }

        let url = feed_utils::url::canonicalize(&draft.url);
        self.articles.push(Article {
            id: feed_utils::url::identity_hash(&url),
            title: draft.title,
            summary: draft.summary,
            url,
            source_key: ctx.source.key.clone(),
            source_label: ctx.source.label.clone(),
            published_at: draft.published_at,
            author: draft.author,
            score: draft.score,
            thumbnail: draft.thumbnail,
            saved: false,
        });
    }
}

pub fn normalize(payload: Payload, ctx: &NormalizeContext<'_>) -> NormalizedBatch {
    let batch = match payload {
        Payload::Xml(feed) => feed_xml::normalize_feed(feed, ctx),
        Payload::JsonEnvelope(envelope) => feed_json::normalize_envelope(&envelope, ctx),
        Payload::Listing(listing) => listing::normalize_listing(&listing, ctx),
    };

    debug!(
        "{}: kept {} of {} items ({} stale, {} malformed, {} skipped)",
        ctx.source.key,
        batch.articles.len(),
        batch.seen,
        batch.stale,
        batch.malformed,
        batch.skipped
    );

    batch
}

/// First candidate that is an absolute http(s) URL.
pub(crate) fn pick_thumbnail<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    candidates
        .into_iter()
        .find_map(|candidate| feed_utils::url::absolute_http(&candidate))
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) const UNTITLED: &str = "Untitled";
