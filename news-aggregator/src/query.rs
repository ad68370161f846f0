//! Consumer views over a snapshot. Nothing here mutates the snapshot itself;
//! every call works on a copy.

use crate::types::Article;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceFilter {
    #[default]
    All,
    Source(String),
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Score,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "score" => Ok(SortOrder::Score),
            other => Err(format!("unknown sort order '{}' (newest, oldest, score)", other)),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Score => "score",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub filter: SourceFilter,
    pub search: Option<String>,
    pub sort: SortOrder,
}

pub fn list(articles: &[Article], saved_ids: &HashSet<String>, query: &ArticleQuery) -> Vec<Article> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut view: Vec<Article> = articles
        .iter()
        .map(|article| Article {
            saved: saved_ids.contains(&article.id),
            ..article.clone()
        })
        .filter(|article| match &query.filter {
            SourceFilter::All => true,
            SourceFilter::Source(key) => &article.source_key == key,
            SourceFilter::Saved => article.saved,
        })
        .filter(|article| needle.as_deref().map_or(true, |n| matches_search(article, n)))
        .collect();

    match query.sort {
        SortOrder::Newest => view.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
        SortOrder::Oldest => view.sort_by(|a, b| a.published_at.cmp(&b.published_at)),
        SortOrder::Score => view.sort_by(by_score),
    }

    view
}

fn matches_search(article: &Article, needle: &str) -> bool {
    [&article.title, &article.summary, &article.author]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

// Highest score first, unscored last, newest first within a tie
fn by_score(a: &Article, b: &Article) -> Ordering {
    match (a.score, b.score) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.published_at.cmp(&a.published_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn article(id: &str, source: &str, title: &str, age_hours: i64, score: Option<i64>) -> Article {
        Article {
            id: id.to_string(),
            title: title.to_string(),
            summary: format!("About {}", title.to_lowercase()),
            url: format!("https://news.test/{}", id),
            source_key: source.to_string(),
            source_label: source.to_string(),
            published_at: Utc::now() - Duration::hours(age_hours),
            author: "Staff".to_string(),
            score,
            thumbnail: None,
            saved: false,
        }
    }

    fn snapshot() -> Vec<Article> {
        vec![
            article("a", "reddit_ml", "Transformers at scale", 2, Some(40)),
            article("b", "bens_bites", "Weekly roundup", 5, None),
            article("c", "reddit_ml", "New optimizer", 1, Some(120)),
            article("d", "rundown_ai", "Chip shortage", 10, None),
        ]
    }

    fn ids(articles: &[Article]) -> Vec<&str> {
        articles.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn test_default_query_is_newest_first() {
        let view = list(&snapshot(), &HashSet::new(), &ArticleQuery::default());
        assert_eq!(ids(&view), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_oldest_first() {
        let query = ArticleQuery {
            sort: SortOrder::Oldest,
            ..ArticleQuery::default()
        };
        let view = list(&snapshot(), &HashSet::new(), &query);
        assert_eq!(ids(&view), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_score_sort_puts_unscored_last() {
        let query = ArticleQuery {
            sort: SortOrder::Score,
            ..ArticleQuery::default()
        };
        let view = list(&snapshot(), &HashSet::new(), &query);
        assert_eq!(ids(&view), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_source_filter() {
        let query = ArticleQuery {
            filter: SourceFilter::Source("reddit_ml".to_string()),
            ..ArticleQuery::default()
        };
        let view = list(&snapshot(), &HashSet::new(), &query);
        assert_eq!(ids(&view), vec!["c", "a"]);
    }

    #[test]
    fn test_saved_filter_and_flag() {
        let saved: HashSet<String> = ["d".to_string()].into_iter().collect();
        let query = ArticleQuery {
            filter: SourceFilter::Saved,
            ..ArticleQuery::default()
        };
        let view = list(&snapshot(), &saved, &query);
        assert_eq!(ids(&view), vec!["d"]);
        assert!(view[0].saved);

        let all = list(&snapshot(), &saved, &ArticleQuery::default());
        assert_eq!(all.iter().filter(|a| a.saved).count(), 1);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = ArticleQuery {
            search: Some("OPTIMIZER".to_string()),
            ..ArticleQuery::default()
        };
        let view = list(&snapshot(), &HashSet::new(), &query);
        assert_eq!(ids(&view), vec!["c"]);
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let query = ArticleQuery {
            search: Some("   ".to_string()),
            ..ArticleQuery::default()
        };
        assert_eq!(list(&snapshot(), &HashSet::new(), &query).len(), 4);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!("Score".parse::<SortOrder>(), Ok(SortOrder::Score));
        assert!("popular".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_snapshot_untouched() {
        let articles = snapshot();
        let saved: HashSet<String> = ["a".to_string()].into_iter().collect();
        let _ = list(&articles, &saved, &ArticleQuery::default());
        assert!(articles.iter().all(|a| !a.saved));
        assert_eq!(ids(&articles), vec!["a", "b", "c", "d"]);
    }
}
