//! Helpers shared by the normalizers

/// URL utilities: canonical form, identity hashing, absolute checks
pub mod url {
    use sha2::{Digest, Sha256};
    use url::Url;

    /// True for parseable http/https URLs with a host
    pub fn is_absolute_http(url_str: &str) -> bool {
        match Url::parse(url_str.trim()) {
            Ok(url) => (url.scheme() == "http" || url.scheme() == "https") && url.host_str().is_some(),
            Err(_) => false,
        }
    }

    /// Returns the trimmed value only if it is an absolute http(s) URL
    pub fn absolute_http(url_str: &str) -> Option<String> {
        let trimmed = url_str.trim();
        if is_absolute_http(trimmed) {
            Some(trimmed.to_string())
        } else {
            None
        }
    }

    /// Fragment dropped, query pairs sorted. Unparseable input is only trimmed.
    pub fn canonicalize(url_str: &str) -> String {
        let trimmed = url_str.trim();
        let Ok(mut url) = Url::parse(trimmed) else {
            return trimmed.to_string();
        };

        url.set_fragment(None);

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            pairs.sort();
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }

        url.to_string()
    }

    /// Dedup identity: SHA-256 of the canonical URL, first 8 bytes as hex
    pub fn identity_hash(url_str: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonicalize(url_str).as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

/// Time utilities for item dates and windows
pub mod time {
    use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

    /// Accepts RFC 3339, RFC 2822 and `YYYY-MM-DD HH:MM:SS` (taken as UTC)
    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    /// Epoch seconds (possibly fractional) to a UTC timestamp via milliseconds
    pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
        if !seconds.is_finite() {
            return None;
        }
        let millis = (seconds * 1000.0) as i64;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Coarse age such as `42s`, `5m`, `10h` or `3d`
    pub fn format_duration(duration: Duration) -> String {
        let (value, unit) = match duration.num_seconds().max(0) {
            s if s < 60 => (s, "s"),
            s if s < 3_600 => (s / 60, "m"),
            s if s < 86_400 => (s / 3_600, "h"),
            s => (s / 86_400, "d"),
        };
        format!("{}{}", value, unit)
    }
}

/// Markup helpers
pub mod feed {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static IMG_SRC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());
    // A `<` opens a tag only before a name or one of `/!?`
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z/!?][^>]*>").unwrap());

    const ELLIPSIS: char = '…';

    /// Strip tags, decode common entities, collapse whitespace, then truncate
    /// to `max_len` chars with an ellipsis marker.
    pub fn html_to_text(html: &str, max_len: usize) -> String {
        let stripped = TAG.replace_all(html, " ");

        let text = decode_entities(&stripped)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        truncate(&text, max_len)
    }

    pub fn truncate(text: &str, max_len: usize) -> String {
        if text.chars().count() <= max_len {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(max_len).collect();
        cut.truncate(cut.trim_end().len());
        cut.push(ELLIPSIS);
        cut
    }

    pub fn decode_entities(text: &str) -> String {
        text.replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&amp;", "&")
    }

    /// `src` of the first `<img>` in an HTML fragment
    pub fn first_image_src(html: &str) -> Option<String> {
        IMG_SRC
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("&amp;", "&"))
    }
}
