use super::{non_empty, pick_thumbnail, ArticleDraft, NormalizeContext, NormalizedBatch, UNTITLED};
use crate::feed_utils;
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};

type Extractor<T> = fn(&Entry) -> Option<T>;

// Each list is tried in order until one field yields a value
const LINK_FIELDS: &[Extractor<String>] = &[alternate_link, first_link, permalink_id];
const DATE_FIELDS: &[Extractor<DateTime<Utc>>] = &[published, updated];
const SUMMARY_FIELDS: &[Extractor<String>] = &[summary_text, content_body, media_description];
const AUTHOR_FIELDS: &[Extractor<String>] = &[first_author];

fn first_of<T>(entry: &Entry, fields: &[Extractor<T>]) -> Option<T> {
    fields.iter().find_map(|extract| extract(entry))
}

fn alternate_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .filter(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .find_map(|link| feed_utils::url::absolute_http(&link.href))
}

fn first_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find_map(|link| feed_utils::url::absolute_http(&link.href))
}

/// RSS guids are often the permalink itself.
fn permalink_id(entry: &Entry) -> Option<String> {
    feed_utils::url::absolute_http(&entry.id)
}

fn published(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.published.map(|dt| dt.with_timezone(&Utc))
}

fn updated(entry: &Entry) -> Option<DateTime<Utc>> {
    entry.updated.map(|dt| dt.with_timezone(&Utc))
}

fn summary_text(entry: &Entry) -> Option<String> {
    entry.summary.as_ref().and_then(|text| non_empty(&text.content))
}

fn content_body(entry: &Entry) -> Option<String> {
    entry
        .content
        .as_ref()
        .and_then(|content| content.body.as_deref())
        .and_then(non_empty)
}

fn media_description(entry: &Entry) -> Option<String> {
    entry
        .media
        .iter()
        .filter_map(|media| media.description.as_ref())
        .find_map(|text| non_empty(&text.content))
}

fn first_author(entry: &Entry) -> Option<String> {
    entry.authors.iter().find_map(|person| non_empty(&person.name))
}

/// media:thumbnail, then image enclosures, then the first inline `<img>`.
fn thumbnail_candidates(entry: &Entry) -> impl Iterator<Item = String> + '_ {
    let thumbnails = entry
        .media
        .iter()
        .flat_map(|media| media.thumbnails.iter())
        .map(|thumbnail| thumbnail.image.uri.clone());

    let enclosures = entry
        .media
        .iter()
        .flat_map(|media| media.content.iter())
        .filter(|content| {
            content
                .content_type
                .as_ref()
                .map_or(false, |mime| mime.to_string().starts_with("image/"))
        })
        .filter_map(|content| content.url.as_ref().map(|url| url.to_string()));

    let inline = content_body(entry)
        .into_iter()
        .chain(summary_text(entry))
        .filter_map(|html| feed_utils::feed::first_image_src(&html));

    thumbnails.chain(enclosures).chain(inline)
}

pub fn normalize_feed(feed: Feed, ctx: &NormalizeContext<'_>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for entry in &feed.entries {
        let Some(url) = first_of(entry, LINK_FIELDS) else {
            batch.malformed(&format!("entry {} has no absolute link", entry.id));
            continue;
        };

        let title = entry
            .title
            .as_ref()
            .and_then(|text| non_empty(&text.content))
            .unwrap_or_else(|| UNTITLED.to_string());

        let summary = first_of(entry, SUMMARY_FIELDS)
            .map(|html| ctx.summarize(&html))
            .unwrap_or_default();

        batch.admit(
            ctx,
            ArticleDraft {
                url,
                title,
                summary,
                published_at: first_of(entry, DATE_FIELDS).unwrap_or(ctx.now),
                author: first_of(entry, AUTHOR_FIELDS).unwrap_or_else(|| ctx.source.label.clone()),
                score: None,
                thumbnail: pick_thumbnail(thumbnail_candidates(entry)),
            },
        );
    }

    batch
}
