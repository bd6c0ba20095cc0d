//! Resumable paginated fetcher.
//!
//! Walks the remote page chain (every response carries the URL of the next
//! page), reading through the raw-layer [`PageCache`] before touching the
//! network. Network trouble never fails the fetch: it ends the crawl early and
//! the returned [`FetchOutcome`] says why.

use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

mod cache;
mod client;
mod error;
mod retry;

pub use cache::{CachedPage, Cursor, PageCache};
pub use client::{HttpPageSource, PageResponse, PageSource};
pub use error::{FetchError, TransportError};
pub use retry::RateLimitPolicy;

use crate::config::{RateLimitConfig, SourceConfig};
use crate::Record;

/// Response envelope of one remote page.
#[derive(Debug, Deserialize)]
struct PageEnvelope {
    #[serde(default)]
    results: Vec<Record>,
    #[serde(default)]
    next: Option<String>,
}

/// Why a fetch stopped before the page chain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TruncationReason {
    /// The page ceiling was reached while a next page was still advertised.
    PageLimitReached { limit: u32 },
    /// Connection-level failure.
    Transport { page: u32, message: String },
    /// Any non-200, non-429 status.
    HttpStatus { page: u32, status: u16 },
    /// A 200 response whose body is not a page envelope.
    MalformedPage { page: u32, message: String },
    /// The server kept answering 429 past the retry budget.
    RateLimitExhausted { page: u32, attempts: u32 },
}

impl TruncationReason {
    /// Whether the truncation should fail the run rather than just shorten it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TruncationReason::RateLimitExhausted { .. })
    }
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruncationReason::PageLimitReached { limit } => {
                write!(f, "page limit of {} reached", limit)
            }
            TruncationReason::Transport { page, message } => {
                write!(f, "connection error on page {}: {}", page, message)
            }
            TruncationReason::HttpStatus { page, status } => {
                write!(f, "HTTP {} on page {}", status, page)
            }
            TruncationReason::MalformedPage { page, message } => {
                write!(f, "malformed response on page {}: {}", page, message)
            }
            TruncationReason::RateLimitExhausted { page, attempts } => {
                write!(f, "rate limited on page {} after {} attempts", page, attempts)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Complete,
    Truncated(TruncationReason),
}

impl FetchStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, FetchStatus::Complete)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Complete => write!(f, "complete"),
            FetchStatus::Truncated(reason) => write!(f, "truncated: {}", reason),
        }
    }
}

/// Records gathered by one [`Fetcher::fetch_all`] run, in page order.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub pages_from_cache: u32,
    pub pages_from_network: u32,
    pub status: FetchStatus,
}

impl FetchOutcome {
    pub fn pages_visited(&self) -> u32 {
        self.pages_from_cache + self.pages_from_network
    }
}

pub struct Fetcher<S> {
    source: S,
    cache: PageCache,
    endpoint: String,
    page_limit: u32,
    page_delay: Duration,
    rate_limit: RateLimitPolicy,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(
        source: S,
        cache: PageCache,
        config: &SourceConfig,
        rate_limit: &RateLimitConfig,
    ) -> Self {
        Self {
            source,
            cache,
            endpoint: config.endpoint.clone(),
            page_limit: config.page_limit,
            page_delay: config.page_delay(),
            rate_limit: RateLimitPolicy::new(rate_limit),
        }
    }

    /// Walk the page chain from the configured endpoint.
    ///
    /// Only cache storage failures are returned as errors; everything the
    /// network does ends the walk with a [`FetchStatus::Truncated`] outcome
    /// carrying the records gathered so far.
    pub async fn fetch_all(&self) -> Result<FetchOutcome, FetchError> {
        let mut records: Vec<Record> = Vec::new();
        let mut pages_from_cache = 0u32;
        let mut pages_from_network = 0u32;

        let mut url = Some(self.endpoint.clone());
        let mut page = 1u32;
        let mut rate_limited = 0u32;

        let status = loop {
            let Some(current) = url.clone() else {
                break FetchStatus::Complete;
            };
            if page > self.page_limit {
                break FetchStatus::Truncated(TruncationReason::PageLimitReached {
                    limit: self.page_limit,
                });
            }

            if let Some(cached) = self.cache.load(page).await? {
                info!(
                    page,
                    records = cached.records.len(),
                    "Page already cached, skipping download"
                );
                records.extend(cached.records);
                pages_from_cache += 1;
                match cached.cursor {
                    Some(cursor) => url = cursor.next.filter(|next| !next.is_empty()),
                    None => warn!(
                        page,
                        "Cached page has no cursor; continuing from the current URL"
                    ),
                }
                page += 1;
                continue;
            }

            info!(page, url = %current, "Downloading page");

            let response = match self.source.get_page(&current).await {
                Ok(response) => response,
                Err(e) => {
                    error!(page, error = %e, "Connection error, stopping fetch");
                    break FetchStatus::Truncated(TruncationReason::Transport {
                        page,
                        message: e.to_string(),
                    });
                }
            };

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                match self.rate_limit.delay_for(rate_limited) {
                    Some(delay) => {
                        warn!(
                            page,
                            attempt = rate_limited,
                            delay_ms = delay.as_millis() as u64,
                            "Rate limited, backing off before retrying page"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        error!(
                            page,
                            attempts = rate_limited,
                            max_retries = self.rate_limit.max_retries(),
                            "Rate limit retries exhausted, stopping fetch"
                        );
                        break FetchStatus::Truncated(TruncationReason::RateLimitExhausted {
                            page,
                            attempts: rate_limited,
                        });
                    }
                }
            }
            rate_limited = 0;

            if response.status != StatusCode::OK {
                error!(page, status = %response.status, "Unexpected HTTP status, stopping fetch");
                break FetchStatus::Truncated(TruncationReason::HttpStatus {
                    page,
                    status: response.status.as_u16(),
                });
            }

            let envelope: PageEnvelope = match serde_json::from_slice(&response.body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!(page, error = %e, "Response is not a page envelope, stopping fetch");
                    break FetchStatus::Truncated(TruncationReason::MalformedPage {
                        page,
                        message: e.to_string(),
                    });
                }
            };

            let next = envelope.next.filter(|next| !next.is_empty());
            self.cache.store(page, &envelope.results, next.as_deref()).await?;

            records.extend(envelope.results);
            pages_from_network += 1;
            url = next;
            page += 1;

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        };

        info!(
            records = records.len(),
            pages = pages_from_cache + pages_from_network,
            status = %status,
            "Download finished"
        );

        Ok(FetchOutcome {
            records,
            pages_from_cache,
            pages_from_network,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use opendal::{services, Operator};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every requested URL.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<PageResponse, TransportError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<PageResponse, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn get_page(&self, url: &str) -> Result<PageResponse, TransportError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("script exhausted")))
        }
    }

    /// Answers every request with a page pointing at itself.
    struct EndlessSource;

    #[async_trait]
    impl PageSource for EndlessSource {
        async fn get_page(&self, url: &str) -> Result<PageResponse, TransportError> {
            Ok(ok_page(json!([{ "url": url }]), Some(url)))
        }
    }

    fn ok_page(results: serde_json::Value, next: Option<&str>) -> PageResponse {
        PageResponse {
            status: StatusCode::OK,
            body: Bytes::from(
                serde_json::to_vec(&json!({ "results": results, "next": next })).unwrap(),
            ),
        }
    }

    fn status(code: StatusCode) -> PageResponse {
        PageResponse {
            status: code,
            body: Bytes::new(),
        }
    }

    fn memory_cache() -> PageCache {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        PageCache::new(op, "raw")
    }

    fn fetcher<S: PageSource>(source: S, cache: PageCache, page_limit: u32) -> Fetcher<S> {
        let config = SourceConfig {
            endpoint: "http://api.test/data".to_string(),
            page_limit,
            page_delay_ms: 0,
            ..Default::default()
        };
        let rate_limit = RateLimitConfig {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            max_retries: 2,
            ..Default::default()
        };
        Fetcher::new(source, cache, &config, &rate_limit)
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records
            .iter()
            .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn follows_chain_until_next_is_null() {
        let source = ScriptedSource::new(vec![
            Ok(ok_page(
                json!([{"id": 1}, {"id": 2}]),
                Some("http://api.test/data?page=2"),
            )),
            Ok(ok_page(json!([{"id": 3}]), Some("http://api.test/data?page=3"))),
            Ok(ok_page(json!([{"id": 4}]), None)),
        ]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.status, FetchStatus::Complete);
        assert_eq!(ids(&outcome.records), vec![1, 2, 3, 4]);
        assert_eq!(outcome.pages_from_network, 3);
        assert_eq!(
            f.source.requests(),
            vec![
                "http://api.test/data",
                "http://api.test/data?page=2",
                "http://api.test/data?page=3",
            ]
        );
    }

    #[tokio::test]
    async fn ceiling_stops_endless_chain() {
        let f = fetcher(EndlessSource, memory_cache(), 5);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(outcome.pages_visited(), 5);
        assert_eq!(
            outcome.status,
            FetchStatus::Truncated(TruncationReason::PageLimitReached { limit: 5 })
        );
    }

    #[tokio::test]
    async fn rate_limited_page_is_retried_once_cached_once() {
        let cache = memory_cache();
        let source = ScriptedSource::new(vec![
            Ok(status(StatusCode::TOO_MANY_REQUESTS)),
            Ok(ok_page(json!([{"id": 7}]), None)),
        ]);
        let f = fetcher(source, cache.clone(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.status, FetchStatus::Complete);
        assert_eq!(ids(&outcome.records), vec![7]);
        assert_eq!(
            f.source.requests(),
            vec!["http://api.test/data", "http://api.test/data"]
        );

        let cached = cache.load(1).await.unwrap().unwrap();
        assert_eq!(ids(&cached.records), vec![7]);
        assert!(cache.load(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rate_limit_exhaustion_is_reported() {
        let source = ScriptedSource::new(vec![
            Ok(ok_page(json!([{"id": 1}]), Some("http://api.test/data?page=2"))),
            Ok(status(StatusCode::TOO_MANY_REQUESTS)),
            Ok(status(StatusCode::TOO_MANY_REQUESTS)),
            Ok(status(StatusCode::TOO_MANY_REQUESTS)),
        ]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(ids(&outcome.records), vec![1]);
        match &outcome.status {
            FetchStatus::Truncated(reason) => {
                assert_eq!(
                    reason,
                    &TruncationReason::RateLimitExhausted {
                        page: 2,
                        attempts: 3
                    }
                );
                assert!(reason.is_fatal());
            }
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_error_keeps_partial_records() {
        let source = ScriptedSource::new(vec![
            Ok(ok_page(json!([{"id": 1}]), Some("http://api.test/data?page=2"))),
            Ok(status(StatusCode::INTERNAL_SERVER_ERROR)),
        ]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(ids(&outcome.records), vec![1]);
        assert_eq!(
            outcome.status,
            FetchStatus::Truncated(TruncationReason::HttpStatus {
                page: 2,
                status: 500
            })
        );
    }

    #[tokio::test]
    async fn transport_error_keeps_partial_records() {
        let source = ScriptedSource::new(vec![
            Ok(ok_page(json!([{"id": 1}]), Some("http://api.test/data?page=2"))),
            Err(TransportError::new("connection refused")),
        ]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(ids(&outcome.records), vec![1]);
        assert!(matches!(
            outcome.status,
            FetchStatus::Truncated(TruncationReason::Transport { page: 2, .. })
        ));
        assert!(!outcome.status.is_complete());
    }

    #[tokio::test]
    async fn malformed_body_truncates() {
        let source = ScriptedSource::new(vec![Ok(PageResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(b"<html>maintenance</html>"),
        })]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert!(outcome.records.is_empty());
        assert!(matches!(
            outcome.status,
            FetchStatus::Truncated(TruncationReason::MalformedPage { page: 1, .. })
        ));
    }

    #[tokio::test]
    async fn cached_pages_skip_the_network_and_follow_cursor() {
        let cache = memory_cache();
        let page_one: Vec<Record> = vec![json!({"id": 1}).as_object().unwrap().clone()];
        cache
            .store(1, &page_one, Some("http://api.test/data?page=2"))
            .await
            .unwrap();

        let source = ScriptedSource::new(vec![Ok(ok_page(json!([{"id": 2}]), None))]);
        let f = fetcher(source, cache, 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(ids(&outcome.records), vec![1, 2]);
        assert_eq!(outcome.pages_from_cache, 1);
        assert_eq!(outcome.pages_from_network, 1);
        assert_eq!(f.source.requests(), vec!["http://api.test/data?page=2"]);
    }

    #[tokio::test]
    async fn cached_page_without_cursor_keeps_current_url() {
        let op = Operator::new(services::Memory::default()).unwrap().finish();
        op.write("raw/gastos_page_1.json", br#"[{"id": 1}]"#.to_vec()).await.unwrap();
        let cache = PageCache::new(op, "raw");

        let source = ScriptedSource::new(vec![Ok(ok_page(json!([{"id": 2}]), None))]);
        let f = fetcher(source, cache, 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.status, FetchStatus::Complete);
        assert_eq!(ids(&outcome.records), vec![1, 2]);
        assert_eq!(outcome.pages_from_cache, 1);
        // Page 2 is requested from the endpoint, the only URL known so far
        assert_eq!(f.source.requests(), vec!["http://api.test/data"]);
    }

    #[tokio::test]
    async fn fully_cached_chain_needs_no_network() {
        let cache = memory_cache();
        let record = |id: i64| json!({ "id": id }).as_object().unwrap().clone();
        cache
            .store(1, &[record(1)], Some("http://api.test/data?page=2"))
            .await
            .unwrap();
        cache.store(2, &[record(2)], None).await.unwrap();

        let source = ScriptedSource::new(vec![]);
        let f = fetcher(source, cache, 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.status, FetchStatus::Complete);
        assert_eq!(ids(&outcome.records), vec![1, 2]);
        assert!(f.source.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_next_string_ends_chain() {
        let source = ScriptedSource::new(vec![Ok(ok_page(json!([{"id": 1}]), Some("")))]);
        let f = fetcher(source, memory_cache(), 1000);

        let outcome = f.fetch_all().await.unwrap();
        assert_eq!(outcome.status, FetchStatus::Complete);
        assert_eq!(f.source.requests().len(), 1);
    }
}
