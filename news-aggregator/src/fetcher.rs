use crate::config::FetchConfig;
use crate::normalizers::Payload;
use crate::strategy::Strategy;
use crate::traits::{Transport, TransportResponse};
use crate::types::{
    AggregatorError, AttemptFailure, Result, SourceDescriptor, SourceFormat, TransportErrorKind,
};
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// reqwest-backed transport. Redirects are followed here rather than by the
/// client so relative `Location` values resolve against the current URL and
/// the hop limit is ours.
pub struct HttpTransport {
    client: Client,
    max_redirects: usize,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let mut current = Url::parse(url)?;

        for hop in 0..=self.max_redirects {
            let mut request = self.client.get(current.clone()).timeout(timeout);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string());

                if let Some(location) = location {
                    let next = current.join(&location)?;
                    debug!("Redirect {} -> {} (hop {})", current, next, hop + 1);
                    current = next;
                    continue;
                }
            }

            let response_headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect::<HashMap<_, _>>();

            let body = response.text().await?;

            return Ok(TransportResponse {
                status: status.as_u16(),
                headers: response_headers,
                body,
                final_url: current.to_string(),
            });
        }

        Err(AggregatorError::Transport {
            kind: TransportErrorKind::Protocol,
            message: format!("more than {} redirects starting at {}", self.max_redirects, url),
        })
    }
}

/// Usable content for one source, with where it came from.
#[derive(Debug)]
pub struct FetchedPayload {
    pub payload: Payload,
    pub endpoint: String,
    pub strategy: String,
    pub status: u16,
    pub bytes: usize,
}

/// Fetch orchestrator: endpoints × strategies, first success wins.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self { transport, config })
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Try every endpoint with every strategy, in order. Individual failures
    /// are logged and collected; only exhaustion is returned as an error.
    pub async fn fetch_source(&self, source: &SourceDescriptor) -> Result<FetchedPayload> {
        let chain = Strategy::chain_for(source.format, &self.config);
        let plan = source
            .endpoints
            .iter()
            .flat_map(|endpoint| chain.iter().map(move |strategy| (endpoint, strategy)));

        let mut attempts = Vec::new();

        for (endpoint, strategy) in plan {
            match self.attempt(source.format, endpoint, strategy).await {
                Ok(fetched) => {
                    info!(
                        "{}: fetched {} bytes from {} via {}",
                        source.key, fetched.bytes, endpoint, strategy
                    );
                    return Ok(fetched);
                }
                Err(e) => {
                    warn!("{}: {} via {} failed: {}", source.key, endpoint, strategy, e);
                    attempts.push(AttemptFailure {
                        endpoint: endpoint.clone(),
                        strategy: strategy.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        error!("{}: all {} attempts failed", source.key, attempts.len());
        Err(AggregatorError::SourceExhausted {
            source_label: source.label.clone(),
            attempts,
        })
    }

    /// A single direct request, no fallback.
    pub async fn fetch_direct(&self, endpoint: &str, format: SourceFormat) -> Result<FetchedPayload> {
        self.attempt(format, endpoint, &Strategy::Direct).await
    }

    async fn attempt(
        &self,
        source_format: SourceFormat,
        endpoint: &str,
        strategy: &Strategy,
    ) -> Result<FetchedPayload> {
        let request_url = strategy.request_url(endpoint, source_format, &self.config)?;
        let format = strategy.payload_format(source_format);
        let timeout = strategy.timeout(&self.config);
        let headers = vec![
            ("User-Agent".to_string(), self.config.user_agent.clone()),
            ("Accept".to_string(), format.accept_header().to_string()),
        ];

        debug!("GET {} ({}, timeout {:?})", request_url, strategy, timeout);
        let start = Instant::now();

        let response = tokio::time::timeout(timeout, self.transport.get(&request_url, &headers, timeout))
            .await
            .map_err(|_| {
                AggregatorError::timeout(format!("no response from {} within {:?}", request_url, timeout))
            })??;

        debug!(
            "{} answered HTTP {} in {}ms ({})",
            request_url,
            response.status,
            start.elapsed().as_millis(),
            response
                .headers
                .get("content-type")
                .map(String::as_str)
                .unwrap_or("no content-type")
        );
        if response.final_url != request_url {
            debug!("{} resolved to {}", request_url, response.final_url);
        }

        if response.status >= 400 {
            return Err(AggregatorError::UpstreamStatus {
                status: response.status,
                url: request_url,
            });
        }

        // A body that decodes is usable however short; the size floor only
        // classifies bodies that fail to decode
        let payload = match Payload::decode(format, &response.body) {
            Ok(payload) => payload,
            Err(e) => {
                let len = response.body.trim().len();
                if len <= self.config.min_body_bytes {
                    return Err(AggregatorError::EmptyBody {
                        len,
                        min: self.config.min_body_bytes,
                    });
                }
                return Err(e);
            }
        };

        Ok(FetchedPayload {
            payload,
            endpoint: endpoint.to_string(),
            strategy: strategy.name().to_string(),
            status: response.status,
            bytes: response.body.len(),
        })
    }
}
