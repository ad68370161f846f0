use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use news_aggregator::feed_utils::time::format_duration;
use news_aggregator::query::{self, ArticleQuery, SortOrder, SourceFilter};
use news_aggregator::sources::{default_sources, load_sources};
use news_aggregator::verify::{verify_sources, RECENT_WINDOW_HOURS};
use news_aggregator::{AggregatorConfig, NewsAggregator, SnapshotOrigin};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregate newsletter feeds and community listings", long_about = None)]
struct Cli {
    /// SQLite database holding the cached snapshot and saved articles
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// JSON file with the source registry (defaults to the built-in sources)
    #[arg(long, global = true)]
    sources: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the snapshot, refetching when the cache is stale
    Refresh {
        /// Ignore the cache and refetch every source
        #[arg(long)]
        force: bool,
    },
    /// Print articles from the cached snapshot
    List {
        /// Only articles from this source key
        #[arg(long, conflicts_with = "saved")]
        source: Option<String>,
        /// Only saved articles
        #[arg(long)]
        saved: bool,
        /// Case-insensitive match on title, summary or author
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "newest")]
        sort: SortOrder,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Toggle the saved flag of an article
    Save { id: String },
    /// Check every endpoint of every source
    Verify,
    /// Reload on a schedule until interrupted
    Watch {
        /// Time between cycles, e.g. `30m` or `24h`
        #[arg(long, default_value = "24h", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let mut config = AggregatorConfig::from_env().context("invalid NEWS_* configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let sources = match &cli.sources {
        Some(path) => load_sources(path)
            .await
            .with_context(|| format!("failed to load sources from {}", path.display()))?,
        None => default_sources(),
    };

    let aggregator = NewsAggregator::connect(config.clone(), sources)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;

    match cli.command {
        Commands::Refresh { force } => {
            let outcome = aggregator.load(force).await?;
            println!(
                "{} articles ({:?}, fetched {} ago)",
                outcome.articles.len(),
                outcome.origin,
                format_duration(Utc::now() - outcome.fetched_at)
            );
            if !outcome.errors.is_empty() {
                println!("Unavailable: {}", outcome.errors.join(", "));
            }
            if outcome.origin == SnapshotOrigin::Empty {
                bail!("every source failed and no cached snapshot exists");
            }
        }
        Commands::List {
            source,
            saved,
            search,
            sort,
            json,
        } => {
            let outcome = aggregator.load(false).await?;
            let saved_ids = aggregator.saved_ids().await?;

            let filter = match (source, saved) {
                (Some(key), _) => SourceFilter::Source(key),
                (None, true) => SourceFilter::Saved,
                (None, false) => SourceFilter::All,
            };
            let view = query::list(&outcome.articles, &saved_ids, &ArticleQuery { filter, search, sort });

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                for article in &view {
                    let marker = if article.saved { "*" } else { " " };
                    println!(
                        "{} {} [{}] {} ({})",
                        marker,
                        article.id,
                        article.source_label,
                        article.title,
                        article.published_at.format("%Y-%m-%d %H:%M")
                    );
                    println!("    {}", article.url);
                }
                info!("{} of {} articles shown", view.len(), outcome.articles.len());
            }
        }
        Commands::Save { id } => {
            let saved = aggregator.toggle_saved(&id).await?;
            println!("{} {}", id, if saved { "saved" } else { "removed from saved" });
        }
        Commands::Verify => {
            let reports = verify_sources(aggregator.fetcher(), aggregator.sources(), &config).await;
            let mut dead = Vec::new();

            for report in &reports {
                println!("{} ({})", report.label, report.key);
                for endpoint in &report.endpoints {
                    let status = endpoint
                        .status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "---".to_string());
                    match &endpoint.error {
                        None => println!(
                            "  {} {} {}ms, {} items, {} in last {}h",
                            status,
                            endpoint.endpoint,
                            endpoint.elapsed_ms,
                            endpoint.total_items,
                            endpoint.recent_items,
                            RECENT_WINDOW_HOURS
                        ),
                        Some(error) => println!("  {} {} {}ms, {}", status, endpoint.endpoint, endpoint.elapsed_ms, error),
                    }
                }
                if !report.responding() {
                    warn!("{} has no responding endpoint", report.key);
                    dead.push(report.key.clone());
                }
            }

            if !dead.is_empty() {
                bail!("no responding endpoint for: {}", dead.join(", "));
            }
        }
        Commands::Watch { interval } => {
            aggregator.watch(interval, None).await?;
        }
    }

    Ok(())
}
