use crate::config::AggregatorConfig;
use crate::fetcher::Fetcher;
use crate::merge::merge_batches;
use crate::normalizers::{self, NormalizeContext};
use crate::sources::validate_sources;
use crate::state::{SavedArticles, SnapshotCache};
use crate::store::SqliteStore;
use crate::traits::KeyValueStore;
use crate::types::{AggregatorError, Article, CacheEntry, RefreshOutcome, Result, SnapshotOrigin, SourceDescriptor};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Tally of a `watch` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub cycles: usize,
    /// Cycles that went to the network rather than serving the cache
    pub refetches: usize,
    pub failures: usize,
}

pub struct NewsAggregator {
    sources: Vec<SourceDescriptor>,
    fetcher: Fetcher,
    cache: SnapshotCache,
    saved: SavedArticles,
    config: AggregatorConfig,
}

impl NewsAggregator {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        fetcher: Fetcher,
        store: Arc<dyn KeyValueStore>,
        config: AggregatorConfig,
    ) -> Result<Self> {
        validate_sources(&sources)?;
        config.validate()?;

        Ok(Self {
            sources,
            fetcher,
            cache: SnapshotCache::new(store.clone(), config.cache_ttl()),
            saved: SavedArticles::new(store),
            config,
        })
    }

    /// HTTP transport and SQLite store from `config`.
    pub async fn connect(config: AggregatorConfig, sources: Vec<SourceDescriptor>) -> Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
        let fetcher = Fetcher::new(config.fetch.clone())?;
        Self::new(sources, fetcher, store, config)
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Serve the cached snapshot while fresh, otherwise refetch every source.
    /// `force` invalidates the cache first.
    pub async fn load(&self, force: bool) -> Result<RefreshOutcome> {
        let cycle = Uuid::new_v4();
        self.load_inner(force)
            .instrument(info_span!("refresh", cycle = %cycle))
            .await
    }

    /// Reload on a fixed schedule, logging each cycle's outcome inside its
    /// refresh span. A failed cycle is logged and the loop carries on.
    /// `max_cycles` of `None` runs until the future is dropped.
    pub async fn watch(&self, every: std::time::Duration, max_cycles: Option<usize>) -> Result<WatchSummary> {
        if every.is_zero() {
            return Err(AggregatorError::Config("watch interval must be positive".to_string()));
        }
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summary = WatchSummary::default();

        info!(
            "Watching {} sources every {}",
            self.sources.len(),
            humantime::format_duration(every)
        );

        while max_cycles.map_or(true, |max| summary.cycles < max) {
            ticker.tick().await;
            summary.cycles += 1;

            let span = info_span!("refresh", cycle = %Uuid::new_v4());
            match self.load_inner(false).instrument(span.clone()).await {
                Ok(outcome) => {
                    let _entered = span.enter();
                    info!(
                        "Cycle {}: {} articles ({:?}), {} failed sources",
                        summary.cycles,
                        outcome.articles.len(),
                        outcome.origin,
                        outcome.errors.len()
                    );
                    if outcome.origin == SnapshotOrigin::Network {
                        summary.refetches += 1;
                    }
                }
                Err(e) => {
                    let _entered = span.enter();
                    error!("Cycle {} failed: {}", summary.cycles, e);
                    summary.failures += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn load_inner(&self, force: bool) -> Result<RefreshOutcome> {
        // Read before invalidating so a degraded result keeps its real fetch time
        let cached = self.cache.read().await?;
        if force {
            info!("Forced refresh requested");
            self.cache.invalidate().await?;
        }
        let now = Utc::now();

        if let Some(entry) = &cached {
            if !force && self.cache.is_fresh(entry, now) {
                info!(
                    "Serving {} cached articles from {}",
                    entry.articles.len(),
                    entry.fetched_at.to_rfc3339()
                );
                return Ok(RefreshOutcome {
                    articles: entry.articles.clone(),
                    errors: entry.errors.clone(),
                    fetched_at: entry.fetched_at,
                    origin: SnapshotOrigin::Cache,
                });
            }
        }

        info!("Refreshing {} sources", self.sources.len());

        let results = join_all(self.sources.iter().map(|source| self.collect_source(source, now))).await;

        let mut errors = Vec::new();
        let mut batches = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(articles) => batches.push(articles),
                Err(e) => {
                    error!("{} contributed nothing: {}", source.key, e);
                    errors.push(source.label.clone());
                }
            }
        }

        if batches.is_empty() && !self.sources.is_empty() {
            return Ok(match cached {
                Some(entry) => {
                    warn!(
                        "Every source failed; serving previous snapshot of {} articles",
                        entry.articles.len()
                    );
                    RefreshOutcome {
                        articles: entry.articles,
                        errors,
                        fetched_at: entry.fetched_at,
                        origin: SnapshotOrigin::Degraded,
                    }
                }
                None => {
                    warn!("Every source failed and nothing is cached");
                    RefreshOutcome {
                        articles: Vec::new(),
                        errors,
                        fetched_at: now,
                        origin: SnapshotOrigin::Empty,
                    }
                }
            });
        }

        let articles = merge_batches(batches);
        let entry = CacheEntry {
            articles,
            fetched_at: now,
            errors,
        };
        self.cache.write(&entry).await?;

        info!(
            "Refresh complete: {} articles, {} failed sources",
            entry.articles.len(),
            entry.errors.len()
        );

        Ok(RefreshOutcome {
            articles: entry.articles,
            errors: entry.errors,
            fetched_at: entry.fetched_at,
            origin: SnapshotOrigin::Network,
        })
    }

    /// Fetch and normalize one source. The window cutoff is derived from the
    /// cycle's `now`, so every source filters against the same instant.
    async fn collect_source(&self, source: &SourceDescriptor, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let fetched = self.fetcher.fetch_source(source).await?;

        let ctx = NormalizeContext::new(
            source,
            now,
            self.config.retention(),
            self.config.summary_max_chars,
            &self.config.fetch.social_base_url,
        );
        let batch = normalizers::normalize(fetched.payload, &ctx);

        info!(
            "{}: {} articles via {} ({} stale, {} malformed)",
            source.key,
            batch.articles.len(),
            fetched.strategy,
            batch.stale,
            batch.malformed
        );

        Ok(batch.articles)
    }

    pub async fn saved_ids(&self) -> Result<HashSet<String>> {
        self.saved.load().await
    }

    /// Returns whether `id` is saved after the toggle.
    pub async fn toggle_saved(&self, id: &str) -> Result<bool> {
        let saved = self.saved.toggle(id).await?;
        info!("Article {} {}", id, if saved { "saved" } else { "unsaved" });
        Ok(saved)
    }
}
