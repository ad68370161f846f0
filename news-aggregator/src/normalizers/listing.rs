use super::{non_empty, pick_thumbnail, ArticleDraft, NormalizeContext, NormalizedBatch, UNTITLED};
use crate::feed_utils;
use crate::types::{AggregatorError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Social platform listing (`{"data": {"children": [...]}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData {
    // Kept raw so one bad child does not fail the listing
    #[serde(default)]
    pub children: Vec<Value>,
}

impl Listing {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse listing: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    url: Option<String>,
    created_utc: f64,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    preview: Option<Preview>,
}

#[derive(Debug, Deserialize)]
struct Preview {
    #[serde(default)]
    images: Vec<PreviewImage>,
}

#[derive(Debug, Deserialize)]
struct PreviewImage {
    source: PreviewSource,
}

#[derive(Debug, Deserialize)]
struct PreviewSource {
    url: String,
}

impl Post {
    fn link(&self, base: &str) -> Option<String> {
        if let Some(url) = self.url.as_deref().and_then(feed_utils::url::absolute_http) {
            return Some(url);
        }
        let permalink = self.permalink.as_deref().and_then(non_empty)?;
        feed_utils::url::absolute_http(&format!("{}{}", base.trim_end_matches('/'), permalink))
    }

    fn preview_url(&self) -> Option<String> {
        self.preview
            .as_ref()
            .and_then(|preview| preview.images.first())
            .map(|image| image.source.url.replace("&amp;", "&"))
    }
}

pub fn normalize_listing(listing: &Listing, ctx: &NormalizeContext<'_>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for raw in &listing.data.children {
        let post = match Child::deserialize(raw) {
            Ok(child) => child.data,
            Err(e) => {
                batch.malformed(&format!("listing entry: {}", e));
                continue;
            }
        };

        if post.stickied || post.pinned {
            batch.skip("pinned listing entry");
            continue;
        }

        let Some(url) = post.link(ctx.social_base_url) else {
            batch.malformed("listing entry has neither url nor permalink");
            continue;
        };
        let Some(published_at) = feed_utils::time::from_epoch_seconds(post.created_utc) else {
            batch.malformed("listing entry has an invalid timestamp");
            continue;
        };

        let author = post
            .author
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| ctx.source.label.clone());
        let group = post
            .subreddit
            .as_deref()
            .and_then(non_empty)
            .or_else(|| ctx.source.subgroup.clone())
            .unwrap_or_else(|| ctx.source.label.clone());

        let summary = match post.selftext.as_deref().and_then(non_empty) {
            Some(text) => ctx.summarize(&text),
            None => format!("posted in r/{} by u/{}", group, author),
        };

        let thumbnail = pick_thumbnail(post.thumbnail.clone().into_iter().chain(post.preview_url()));

        batch.admit(
            ctx,
            ArticleDraft {
                url,
                title: post
                    .title
                    .as_deref()
                    .and_then(non_empty)
                    .unwrap_or_else(|| UNTITLED.to_string()),
                summary,
                published_at,
                author,
                score: Some(post.score),
                thumbnail,
            },
        );
    }

    batch
}
