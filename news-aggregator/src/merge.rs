use crate::types::Article;
use std::collections::HashSet;
use tracing::{debug, info};

/// Merge per-source batches in the order given. The first article seen for an
/// id wins; later duplicates are dropped regardless of content. The result is
/// sorted newest first (stable, so ties keep merge order).
pub fn merge_batches<I>(batches: I) -> Vec<Article>
where
    I: IntoIterator<Item = Vec<Article>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    let mut dropped = 0usize;

    for batch in batches {
        for article in batch {
            if seen.insert(article.id.clone()) {
                merged.push(article);
            } else {
                debug!("Dropping duplicate {} from {} ({})", article.id, article.source_key, article.url);
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        info!("Removed {} duplicate articles", dropped);
    }

    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_utils;
    use chrono::{Duration, Utc};

    fn article(url: &str, source: &str, title: &str, age_hours: i64) -> Article {
        Article {
            id: feed_utils::url::identity_hash(url),
            title: title.to_string(),
            summary: String::new(),
            url: url.to_string(),
            source_key: source.to_string(),
            source_label: source.to_string(),
            published_at: Utc::now() - Duration::hours(age_hours),
            author: source.to_string(),
            score: None,
            thumbnail: None,
            saved: false,
        }
    }

    #[test]
    fn test_first_source_wins_on_duplicate() {
        let first = vec![article("http://x/1", "source1", "First report", 5)];
        let second = vec![article("http://x/1", "source2", "Different title", 1)];

        let merged = merge_batches(vec![first, second]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_key, "source1");
        assert_eq!(merged[0].title, "First report");
    }

    #[test]
    fn test_sorted_newest_first() {
        let a = vec![article("http://x/old", "a", "old", 30), article("http://x/new", "a", "new", 1)];
        let b = vec![article("http://x/mid", "b", "mid", 10)];

        let merged = merge_batches(vec![a, b]);
        let titles: Vec<_> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_empty_batches() {
        let merged = merge_batches(vec![Vec::new(), Vec::new()]);
        assert!(merged.is_empty());
    }
}
