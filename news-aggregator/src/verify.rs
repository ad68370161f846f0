//! One-shot diagnostic: hit every endpoint of every source directly and
//! report what came back.

use crate::config::AggregatorConfig;
use crate::fetcher::Fetcher;
use crate::normalizers::{self, NormalizeContext};
use crate::types::{AggregatorError, SourceDescriptor};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Items newer than this count as recent.
pub const RECENT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub endpoint: String,
    pub status: Option<u16>,
    pub elapsed_ms: u128,
    pub total_items: usize,
    pub recent_items: usize,
    pub error: Option<String>,
}

impl EndpointReport {
    pub fn ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub key: String,
    pub label: String,
    pub endpoints: Vec<EndpointReport>,
}

impl SourceReport {
    /// At least one endpoint answered with a usable payload.
    pub fn responding(&self) -> bool {
        self.endpoints.iter().any(EndpointReport::ok)
    }
}

pub async fn verify_sources(
    fetcher: &Fetcher,
    sources: &[SourceDescriptor],
    config: &AggregatorConfig,
) -> Vec<SourceReport> {
    let mut reports = Vec::with_capacity(sources.len());

    for source in sources {
        info!("Verifying {} ({} endpoints)", source.key, source.endpoints.len());
        let mut endpoints = Vec::with_capacity(source.endpoints.len());

        for endpoint in &source.endpoints {
            let start = Instant::now();
            let report = match fetcher.fetch_direct(endpoint, source.format).await {
                Ok(fetched) => {
                    let total_items = fetched.payload.item_count();
                    let ctx = NormalizeContext::new(
                        source,
                        Utc::now(),
                        Duration::hours(RECENT_WINDOW_HOURS),
                        config.summary_max_chars,
                        &config.fetch.social_base_url,
                    );
                    let batch = normalizers::normalize(fetched.payload, &ctx);

                    EndpointReport {
                        endpoint: endpoint.clone(),
                        status: Some(fetched.status),
                        elapsed_ms: start.elapsed().as_millis(),
                        total_items,
                        recent_items: batch.articles.len(),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", source.key, endpoint, e);
                    let status = match &e {
                        AggregatorError::UpstreamStatus { status, .. } => Some(*status),
                        _ => None,
                    };
                    EndpointReport {
                        endpoint: endpoint.clone(),
                        status,
                        elapsed_ms: start.elapsed().as_millis(),
                        total_items: 0,
                        recent_items: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            endpoints.push(report);
        }

        reports.push(SourceReport {
            key: source.key.clone(),
            label: source.label.clone(),
            endpoints,
        });
    }

    reports
}
