use super::{non_empty, pick_thumbnail, ArticleDraft, NormalizeContext, NormalizedBatch, UNTITLED};
use crate::feed_utils;
use crate::types::{AggregatorError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Feed converted to JSON by a conversion service (rss2json shape).
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
}

impl FeedEnvelope {
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: FeedEnvelope = serde_json::from_str(body)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed envelope: {}", e)))?;

        match envelope.status.as_deref() {
            None | Some("ok") => Ok(envelope),
            Some(status) => Err(AggregatorError::Parse(format!(
                "converter reported status '{}': {}",
                status,
                envelope.message.as_deref().unwrap_or("no message")
            ))),
        }
    }
}

// JSON pointers, tried in order
const TITLE_FIELDS: &[&str] = &["/title"];
const DATE_FIELDS: &[&str] = &["/pubDate", "/published", "/updated", "/date"];
const LINK_FIELDS: &[&str] = &["/link", "/guid", "/url"];
const SUMMARY_FIELDS: &[&str] = &["/description", "/content", "/summary"];
const AUTHOR_FIELDS: &[&str] = &["/author", "/creator"];
const HTML_FIELDS: &[&str] = &["/content", "/description"];

fn text_at(item: &Value, pointer: &str) -> Option<String> {
    match item.pointer(pointer)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(item: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| text_at(item, pointer))
}

fn enclosure_image(item: &Value) -> Option<String> {
    let enclosure = item.get("enclosure")?;
    let is_image = enclosure
        .get("type")
        .and_then(Value::as_str)
        .map_or(true, |kind| kind.is_empty() || kind.starts_with("image/"));

    if is_image {
        first_text(enclosure, &["/link", "/url"])
    } else {
        None
    }
}

fn thumbnail_candidates(item: &Value) -> impl Iterator<Item = String> + '_ {
    text_at(item, "/thumbnail")
        .into_iter()
        .chain(enclosure_image(item))
        .chain(
            HTML_FIELDS
                .iter()
                .filter_map(move |pointer| text_at(item, pointer))
                .filter_map(|html| feed_utils::feed::first_image_src(&html)),
        )
}

pub fn normalize_envelope(envelope: &FeedEnvelope, ctx: &NormalizeContext<'_>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for item in &envelope.items {
        if !item.is_object() {
            batch.malformed("envelope item is not an object");
            continue;
        }

        let Some(url) = first_text(item, LINK_FIELDS).and_then(|link| feed_utils::url::absolute_http(&link)) else {
            batch.malformed("envelope item has no absolute link");
            continue;
        };

        let published_at = DATE_FIELDS
            .iter()
            .filter_map(|pointer| text_at(item, pointer))
            .find_map(|raw| feed_utils::time::parse_timestamp(&raw))
            .unwrap_or(ctx.now);

        batch.admit(
            ctx,
            ArticleDraft {
                url,
                title: first_text(item, TITLE_FIELDS).unwrap_or_else(|| UNTITLED.to_string()),
                summary: first_text(item, SUMMARY_FIELDS)
                    .map(|html| ctx.summarize(&html))
                    .unwrap_or_default(),
                published_at,
                author: first_text(item, AUTHOR_FIELDS).unwrap_or_else(|| ctx.source.label.clone()),
                score: None,
                thumbnail: pick_thumbnail(thumbnail_candidates(item)),
            },
        );
    }

    batch
}
