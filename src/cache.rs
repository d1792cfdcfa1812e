//! Whole-response cache for the index listing.
//!
//! Entries are keyed by path and page number, shared by every visitor, and
//! only expire by age or eviction. Creating or editing posts does not touch
//! them.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::{Body, Bytes},
    extract::{Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::AppResult;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
/// Past this many live entries the oldest snapshot makes room.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub content: Bytes,
    pub content_type: Option<HeaderValue>,
    pub populated_at: Instant,
    pub ttl: Duration,
}

impl CachedPage {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.populated_at) >= self.ttl
    }
}

#[derive(Clone)]
pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    entries: Arc<RwLock<HashMap<String, CachedPage>>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: Arc::default(),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The entry for `key` unless it has expired by `now`.
    pub async fn lookup(&self, key: &str, now: Instant) -> Option<CachedPage> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|page| !page.is_expired(now))
            .cloned()
    }

    /// Stores a fresh snapshot and sweeps whatever expired meanwhile. A full
    /// cache drops its oldest entry first.
    pub async fn populate(
        &self,
        key: String,
        content: Bytes,
        content_type: Option<HeaderValue>,
        now: Instant,
    ) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, page| !page.is_expired(now));
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, page)| page.populated_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CachedPage {
                content,
                content_type,
                populated_at: now,
                ttl: self.ttl,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn cache_control(&self) -> Option<HeaderValue> {
        HeaderValue::try_from(format!("max-age={}", self.ttl.as_secs())).ok()
    }
}

#[derive(Deserialize)]
struct PageParam {
    page: Option<String>,
}

/// The handler only reads `page`, so other parameters and spellings of the
/// same number share one entry. Numbers below one all mean the last page.
fn cache_key(uri: &Uri) -> String {
    let page = Query::<PageParam>::try_from_uri(uri)
        .ok()
        .and_then(|Query(param)| param.page);

    match page.map(|raw| raw.trim().parse::<i64>()) {
        Some(Ok(n)) if n > 1 => format!("{}?page={n}", uri.path()),
        Some(Ok(n)) if n < 1 => format!("{}?page=last", uri.path()),
        _ => uri.path().to_owned(),
    }
}

/// Route middleware: serve the snapshot while it is fresh, otherwise run
/// the handler and keep its `200 OK` body.
pub async fn cache_page(
    State(cache): State<PageCache>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if request.method() != Method::GET {
        return Ok(next.run(request).await);
    }

    let key = cache_key(request.uri());
    let now = Instant::now();

    if let Some(page) = cache.lookup(&key, now).await {
        tracing::debug!(%key, "page cache hit");
        let mut response = Body::from(page.content).into_response();
        if let Some(content_type) = page.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        if let Some(cache_control) = cache.cache_control() {
            response.headers_mut().insert(header::CACHE_CONTROL, cache_control);
        }
        return Ok(response);
    }

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return Ok(response);
    }

    let (mut parts, body) = response.into_parts();
    let content = axum::body::to_bytes(body, usize::MAX).await?;
    let content_type = parts.headers.get(header::CONTENT_TYPE).cloned();

    tracing::debug!(%key, "page cache populated");
    cache.populate(key, content.clone(), content_type, now).await;

    if let Some(cache_control) = cache.cache_control() {
        parts.headers.insert(header::CACHE_CONTROL, cache_control);
    }
    Ok(Response::from_parts(parts, Body::from(content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_measured_from_population() {
        let start = Instant::now();
        let page = CachedPage {
            content: Bytes::from_static(b"snapshot"),
            content_type: None,
            populated_at: start,
            ttl: Duration::from_secs(900),
        };

        assert!(!page.is_expired(start));
        assert!(!page.is_expired(start + Duration::from_secs(899)));
        assert!(page.is_expired(start + Duration::from_secs(900)));
        assert!(page.is_expired(start + Duration::from_secs(3600)));
    }

    #[test]
    fn clock_going_backwards_does_not_expire() {
        let start = Instant::now() + Duration::from_secs(60);
        let page = CachedPage {
            content: Bytes::new(),
            content_type: None,
            populated_at: start,
            ttl: Duration::from_secs(1),
        };
        assert!(!page.is_expired(start - Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn lookup_serves_snapshot_until_expiry() {
        let cache = PageCache::new(Duration::from_secs(900));
        let start = Instant::now();

        cache
            .populate("/".to_owned(), Bytes::from_static(b"v1"), None, start)
            .await;

        let hit = cache.lookup("/", start + Duration::from_secs(10)).await.unwrap();
        assert_eq!(hit.content, Bytes::from_static(b"v1"));
        assert!(cache.lookup("/?page=2", start).await.is_none());
        assert!(cache.lookup("/", start + Duration::from_secs(900)).await.is_none());
    }

    #[tokio::test]
    async fn populate_sweeps_expired_entries() {
        let cache = PageCache::new(Duration::from_secs(60));
        let start = Instant::now();

        cache.populate("/".to_owned(), Bytes::new(), None, start).await;
        let later = start + Duration::from_secs(61);
        cache.populate("/?page=2".to_owned(), Bytes::new(), None, later).await;

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn full_cache_evicts_the_oldest_entry() {
        let cache = PageCache::new(Duration::from_secs(900)).with_max_entries(2);
        let start = Instant::now();

        for (n, key) in ["/", "/?page=2", "/?page=3"].into_iter().enumerate() {
            let at = start + Duration::from_secs(n as u64);
            cache.populate(key.to_owned(), Bytes::new(), None, at).await;
        }

        let now = start + Duration::from_secs(10);
        assert_eq!(cache.len().await, 2);
        assert!(cache.lookup("/", now).await.is_none());
        assert!(cache.lookup("/?page=2", now).await.is_some());
        assert!(cache.lookup("/?page=3", now).await.is_some());

        // refreshing a present key evicts nothing
        cache.populate("/?page=3".to_owned(), Bytes::new(), None, now).await;
        assert_eq!(cache.len().await, 2);
    }

    #[test]
    fn key_keeps_only_the_page_number() {
        let key = |uri: &str| cache_key(&uri.parse().unwrap());

        assert_eq!(key("/"), "/");
        assert_eq!(key("/?junk=1"), "/");
        assert_eq!(key("/?page=1&junk=2"), "/");
        assert_eq!(key("/?page=abc"), "/");
        assert_eq!(key("/?page=%202"), "/?page=2");
        assert_eq!(key("/?junk=x&page=2"), "/?page=2");
        assert_eq!(key("/?page=0"), "/?page=last");
        assert_eq!(key("/?page=-4"), "/?page=last");
    }
}
