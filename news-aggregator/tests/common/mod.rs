#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use news_aggregator::{
    AggregatorConfig, AggregatorError, FetchConfig, Result, SourceFormat, Strategy, Transport,
    TransportErrorKind, TransportResponse,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const RELAY_URL: &str = "https://relay.test/fetch";
pub const CONVERTER_URL: &str = "https://convert.test/api.json";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

/// Transport answering from a fixed URL table. Unknown URLs fail with a
/// network error; every requested URL is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: impl Into<String>) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status,
                body: body.into(),
                delay: None,
            },
        );
    }

    /// Answer only after `delay`, long enough to trip the attempt timeout.
    pub fn stall(&self, url: &str, delay: Duration) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status: 200,
                body: String::new(),
                delay: Some(delay),
            },
        );
    }

    pub fn clear(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<TransportResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        let route = self.routes.lock().unwrap().get(url).cloned();

        let Some(route) = route else {
            return Err(AggregatorError::Transport {
                kind: TransportErrorKind::Network,
                message: format!("no route to {}", url),
            });
        };

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(TransportResponse {
            status: route.status,
            headers: HashMap::new(),
            body: route.body,
            final_url: url.to_string(),
        })
    }
}

/// Short timeouts, both fallback services configured, 72h window.
pub fn test_config() -> AggregatorConfig {
    AggregatorConfig {
        fetch: FetchConfig {
            direct_timeout_ms: 50,
            relay_timeout_ms: 50,
            converter_timeout_ms: 50,
            relay_url: Some(RELAY_URL.to_string()),
            converter_url: Some(CONVERTER_URL.to_string()),
            ..FetchConfig::default()
        },
        retention_hours: 72,
        cache_ttl_hours: 24,
        ..AggregatorConfig::default()
    }
}

/// Only the direct strategy is available.
pub fn direct_only_config() -> AggregatorConfig {
    let mut config = test_config();
    config.fetch.relay_url = None;
    config.fetch.converter_url = None;
    config
}

pub fn relay_url_for(endpoint: &str, format: SourceFormat, config: &FetchConfig) -> String {
    Strategy::Relay {
        base: RELAY_URL.to_string(),
    }
    .request_url(endpoint, format, config)
    .unwrap()
}

pub fn converter_url_for(endpoint: &str, config: &FetchConfig) -> String {
    Strategy::Converter {
        base: CONVERTER_URL.to_string(),
    }
    .request_url(endpoint, SourceFormat::FeedXml, config)
    .unwrap()
}

pub struct FeedItem<'a> {
    pub title: Option<&'a str>,
    pub link: &'a str,
    pub age_hours: i64,
    pub description: Option<&'a str>,
    pub author: Option<&'a str>,
}

impl<'a> FeedItem<'a> {
    pub fn new(title: &'a str, link: &'a str, age_hours: i64) -> Self {
        Self {
            title: Some(title),
            link,
            age_hours,
            description: None,
            author: None,
        }
    }
}

pub fn rss_feed(items: &[FeedItem<'_>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
<title>Test Feed</title>
<link>https://news.test/</link>
<description>Fixture feed</description>
"#,
    );

    for item in items {
        let published = (Utc::now() - ChronoDuration::hours(item.age_hours)).to_rfc2822();
        xml.push_str("<item>\n");
        if let Some(title) = item.title {
            xml.push_str(&format!("<title>{}</title>\n", title));
        }
        xml.push_str(&format!("<link>{}</link>\n", item.link));
        xml.push_str(&format!("<pubDate>{}</pubDate>\n", published));
        if let Some(description) = item.description {
            xml.push_str(&format!("<description><![CDATA[{}]]></description>\n", description));
        }
        if let Some(author) = item.author {
            xml.push_str(&format!("<dc:creator>{}</dc:creator>\n", author));
        }
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel>\n</rss>\n");
    xml
}

pub fn empty_rss_feed() -> String {
    rss_feed(&[])
}

/// One social listing child; `fields` override the defaults.
pub fn listing_post(id: &str, age_hours: i64, fields: Value) -> Value {
    let created = (Utc::now() - ChronoDuration::hours(age_hours)).timestamp() as f64;
    let mut data = json!({
        "title": format!("Post {}", id),
        "selftext": "",
        "permalink": format!("/r/artificial/comments/{}/post/", id),
        "url": format!("https://www.reddit.com/r/artificial/comments/{}/post/", id),
        "created_utc": created,
        "author": "poster",
        "subreddit": "artificial",
        "score": 10,
        "stickied": false,
        "thumbnail": "self"
    });

    if let (Some(target), Some(overrides)) = (data.as_object_mut(), fields.as_object()) {
        for (key, value) in overrides {
            target.insert(key.clone(), value.clone());
        }
    }

    json!({ "kind": "t3", "data": data })
}

pub fn listing(children: Vec<Value>) -> String {
    json!({ "kind": "Listing", "data": { "children": children } }).to_string()
}

pub fn envelope(items: Vec<Value>) -> String {
    json!({ "status": "ok", "feed": { "title": "Converted" }, "items": items }).to_string()
}

pub fn envelope_item(title: &str, link: &str, age_hours: i64) -> Value {
    let published = (Utc::now() - ChronoDuration::hours(age_hours)).format("%Y-%m-%d %H:%M:%S");
    json!({
        "title": title,
        "link": link,
        "pubDate": published.to_string(),
        "author": "",
        "description": format!("<p>{} in brief</p>", title),
        "thumbnail": "",
        "enclosure": {}
    })
}
