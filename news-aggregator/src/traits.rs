use crate::types::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Raw response handed back by a transport after redirects are resolved.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub final_url: String,
}

/// The network GET primitive the fetch orchestrator is built on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET, following redirects up to the transport's hop limit.
    /// Non-2xx statuses are returned as responses, not errors.
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

/// Persistent JSON key-value storage backing the snapshot cache.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}
