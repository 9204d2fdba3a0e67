//! Single-attempt payload retrieval.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::http::{HttpClient, HttpRequest, TransportError};

/// Headers sent with every content request.
pub const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Result of one fetch attempt. Only `Success` carries a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    Timeout,
    NetworkError(String),
    HttpStatus(u16),
    EmptyBody,
}

impl FetchOutcome {
    /// Status in `[200, 400)` with a non-blank body is the only success.
    pub fn classify(status: u16, body: String) -> Self {
        if !(200..400).contains(&status) {
            FetchOutcome::HttpStatus(status)
        } else if body.trim().is_empty() {
            FetchOutcome::EmptyBody
        } else {
            FetchOutcome::Success(body)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn into_payload(self) -> Option<String> {
        match self {
            FetchOutcome::Success(body) => Some(body),
            _ => None,
        }
    }
}

impl From<TransportError> for FetchOutcome {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => FetchOutcome::Timeout,
            TransportError::Network(detail) => FetchOutcome::NetworkError(detail),
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(body) => write!(f, "success ({} bytes)", body.len()),
            FetchOutcome::Timeout => write!(f, "timeout"),
            FetchOutcome::NetworkError(detail) => write!(f, "network error: {detail}"),
            FetchOutcome::HttpStatus(status) => write!(f, "HTTP {status}"),
            FetchOutcome::EmptyBody => write!(f, "empty body"),
        }
    }
}

/// Append `t=<epoch ms>&r=<token>` so intermediaries cannot serve a stale copy.
pub fn cache_busted(url: &str, epoch_ms: i64, token: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={epoch_ms}&r={token}")
}

/// Six lowercase alphanumerics.
pub fn cache_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

pub struct ContentFetcher<'a, H> {
    http: &'a H,
    timeout: Duration,
}

impl<'a, H: HttpClient> ContentFetcher<'a, H> {
    pub fn new(http: &'a H, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One GET, bounded by the fetch timeout. Never retries.
    pub async fn fetch(&self, url: &str, cache_busting: bool) -> FetchOutcome {
        let target = if cache_busting {
            cache_busted(url, Utc::now().timestamp_millis(), &cache_token())
        } else {
            url.to_string()
        };

        let mut request = HttpRequest::get(&target, self.timeout);
        for (name, value) in NO_CACHE_HEADERS {
            request = request.header(name, value);
        }

        let outcome = match tokio::time::timeout(self.timeout, self.http.get(request)).await {
            Ok(Ok(response)) => FetchOutcome::classify(response.status, response.body),
            Ok(Err(e)) => FetchOutcome::from(e),
            Err(_) => FetchOutcome::Timeout,
        };
        debug!(url = %target, %outcome, "fetch attempt finished");
        outcome
    }
}
