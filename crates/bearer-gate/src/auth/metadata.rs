//! Issuer metadata cache.
//!
//! Fetches the OpenID Connect discovery document (`issuer`, `jwks_uri`) and
//! the JWKS it points at, and memoizes the result as an immutable snapshot.
//!
//! # Concurrency
//!
//! - The snapshot is an `Arc<IssuerMetadata>` swapped under a short write
//!   lock; readers clone the `Arc` and never see a half-built snapshot
//! - [`IssuerMetadataCache::request_refresh`] only sets an atomic flag; the
//!   next [`IssuerMetadataCache::get`] performs the fetch
//! - Fetches are single-flight: concurrent callers that miss wait for one
//!   fetch and share its result
//! - Failures are never cached; the next call retries

use crate::auth::keys::{keys_from_values, SigningKey};
use crate::observability::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Issuer identifier and signing keys from the discovery endpoint.
#[derive(Debug, Clone, Default)]
pub struct IssuerMetadata {
    pub issuer: String,
    pub signing_keys: Vec<SigningKey>,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata request failed: {0}")]
    Fetch(String),

    #[error("Metadata endpoint returned status {0}")]
    Status(u16),

    #[error("Metadata document is invalid: {0}")]
    Parse(String),
}

/// Where issuer metadata comes from.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self) -> Result<IssuerMetadata, MetadataError>;
}

/// Discovery document fields used by the gate.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Fetches metadata from an OpenID Connect discovery URL.
pub struct OidcDiscoveryClient {
    discovery_url: String,
    http_client: reqwest::Client,
}

impl OidcDiscoveryClient {
    /// Create a client for `discovery_url` with the given request timeout.
    pub fn new(discovery_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gate.auth.metadata", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            discovery_url,
            http_client,
        }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, MetadataError> {
        let response = self.http_client.get(url).send().await.map_err(|e| {
            tracing::warn!(target: "gate.auth.metadata", url = %url, error = %e, "Metadata request failed");
            MetadataError::Fetch(e.to_string())
        })?;

        if !response.status().is_success() {
            tracing::warn!(
                target: "gate.auth.metadata",
                url = %url,
                status = %response.status(),
                "Metadata endpoint returned error"
            );
            return Err(MetadataError::Status(response.status().as_u16()));
        }

        response.json::<T>().await.map_err(|e| {
            tracing::warn!(target: "gate.auth.metadata", url = %url, error = %e, "Failed to parse metadata response");
            MetadataError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl MetadataSource for OidcDiscoveryClient {
    #[instrument(skip_all, fields(url = %self.discovery_url))]
    async fn fetch(&self) -> Result<IssuerMetadata, MetadataError> {
        let discovery: DiscoveryDocument = self.get_json(&self.discovery_url).await?;
        let jwks: JwksDocument = self.get_json(&discovery.jwks_uri).await?;

        let signing_keys = keys_from_values(jwks.keys);

        tracing::info!(
            target: "gate.auth.metadata",
            issuer = %discovery.issuer,
            key_count = signing_keys.len(),
            "Issuer metadata fetched"
        );

        Ok(IssuerMetadata {
            issuer: discovery.issuer,
            signing_keys,
        })
    }
}

struct Snapshot {
    metadata: Arc<IssuerMetadata>,
    fetched_at: Instant,
}

/// Lazily fetched, explicitly refreshable issuer metadata.
pub struct IssuerMetadataCache {
    source: Arc<dyn MetadataSource>,
    snapshot: RwLock<Option<Snapshot>>,
    refresh_requested: AtomicBool,
    fetch_lock: Mutex<()>,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
}

impl IssuerMetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>, refresh_interval: Duration) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            refresh_requested: AtomicBool::new(false),
            fetch_lock: Mutex::new(()),
            refresh_interval,
            min_refresh_interval: Duration::ZERO,
        }
    }

    /// Defer requested refreshes until the snapshot is at least `interval`
    /// old. Zero (the default) honors a request on the next [`get`](Self::get).
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Return the current snapshot, fetching it first if the cache is empty,
    /// stale, or a refresh was requested.
    ///
    /// # Errors
    ///
    /// Returns the fetch error for this attempt. Nothing is cached on failure.
    #[instrument(skip_all)]
    pub async fn get(&self) -> Result<Arc<IssuerMetadata>, MetadataError> {
        if let Some(metadata) = self.current().await {
            return Ok(metadata);
        }

        let _fetch_guard = self.fetch_lock.lock().await;

        // Another caller may have fetched while we waited
        if let Some(metadata) = self.current().await {
            tracing::trace!(target: "gate.auth.metadata", "Using metadata fetched by concurrent caller");
            return Ok(metadata);
        }

        let forced = self.refresh_requested.swap(false, Ordering::AcqRel);
        tracing::debug!(target: "gate.auth.metadata", forced, "Fetching issuer metadata");

        // Re-arms the refresh if this fetch fails or is cancelled
        let mut pending = PendingRefresh {
            flag: &self.refresh_requested,
            armed: forced,
        };

        match self.source.fetch().await {
            Ok(metadata) => {
                pending.armed = false;
                metrics::record_metadata_fetch("success");
                let metadata = Arc::new(metadata);
                let mut snapshot = self.snapshot.write().await;
                *snapshot = Some(Snapshot {
                    metadata: Arc::clone(&metadata),
                    fetched_at: Instant::now(),
                });
                Ok(metadata)
            }
            Err(e) => {
                metrics::record_metadata_fetch("error");
                Err(e)
            }
        }
    }

    /// Mark the cached snapshot stale. The next [`get`](Self::get) re-fetches.
    ///
    /// Idempotent and non-blocking.
    pub fn request_refresh(&self) {
        if !self.refresh_requested.swap(true, Ordering::AcqRel) {
            metrics::record_metadata_refresh_requested();
            tracing::debug!(target: "gate.auth.metadata", "Issuer metadata refresh requested");
        }
    }

    pub fn is_refresh_pending(&self) -> bool {
        self.refresh_requested.load(Ordering::Acquire)
    }

    /// Current snapshot, unless it is stale or a refresh is due.
    async fn current(&self) -> Option<Arc<IssuerMetadata>> {
        let snapshot = self.snapshot.read().await;
        let snapshot = snapshot.as_ref()?;
        let age = snapshot.fetched_at.elapsed();

        if age >= self.refresh_interval {
            return None;
        }
        if self.refresh_requested.load(Ordering::Acquire) && age >= self.min_refresh_interval {
            return None;
        }

        Some(Arc::clone(&snapshot.metadata))
    }
}

struct PendingRefresh<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Source that counts fetches and can be told to fail.
    struct CountingSource {
        fetches: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataSource for CountingSource {
        async fn fetch(&self) -> Result<IssuerMetadata, MetadataError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(MetadataError::Fetch("connection refused".to_string()));
            }
            Ok(IssuerMetadata {
                issuer: format!("https://issuer.example/{n}"),
                signing_keys: Vec::new(),
            })
        }
    }

    fn cache_with(source: Arc<CountingSource>) -> IssuerMetadataCache {
        IssuerMetadataCache::new(source, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_first_get_fetches_then_caches() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source));

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(source.fetches(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.issuer, "https://issuer.example/1");
    }

    #[tokio::test]
    async fn test_request_refresh_causes_one_refetch() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source));

        cache.get().await.unwrap();
        cache.request_refresh();
        cache.request_refresh();
        assert!(cache.is_refresh_pending());

        let refreshed = cache.get().await.unwrap();
        cache.get().await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(refreshed.issuer, "https://issuer.example/2");
        assert!(!cache.is_refresh_pending());
    }

    #[tokio::test]
    async fn test_refresh_before_first_get_fetches_once() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source));

        cache.request_refresh();
        cache.request_refresh();
        cache.get().await.unwrap();
        cache.get().await.unwrap();

        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_refresh_does_not_affect_held_snapshot() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source));

        let old = cache.get().await.unwrap();
        cache.request_refresh();
        let new = cache.get().await.unwrap();

        assert_eq!(old.issuer, "https://issuer.example/1");
        assert_eq!(new.issuer, "https://issuer.example/2");
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let source = Arc::new(CountingSource::new());
        source.fail.store(true, Ordering::SeqCst);
        let cache = cache_with(Arc::clone(&source));

        assert!(matches!(cache.get().await, Err(MetadataError::Fetch(_))));

        source.fail.store(false, Ordering::SeqCst);
        let metadata = cache.get().await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(metadata.issuer, "https://issuer.example/2");
    }

    #[tokio::test]
    async fn test_failed_forced_refresh_stays_pending() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source));

        cache.get().await.unwrap();
        cache.request_refresh();
        source.fail.store(true, Ordering::SeqCst);

        assert!(cache.get().await.is_err());
        assert!(cache.is_refresh_pending());

        source.fail.store(false, Ordering::SeqCst);
        let metadata = cache.get().await.unwrap();
        assert_eq!(metadata.issuer, "https://issuer.example/3");
    }

    #[tokio::test]
    async fn test_cancelled_forced_refresh_stays_pending() {
        let source = Arc::new(CountingSource::with_delay(Duration::from_millis(100)));
        let cache = cache_with(Arc::clone(&source));
        cache.get().await.unwrap();
        cache.request_refresh();

        let cancelled = tokio::time::timeout(Duration::from_millis(10), cache.get()).await;

        assert!(cancelled.is_err());
        assert!(cache.is_refresh_pending());

        let metadata = cache.get().await.unwrap();
        assert_eq!(metadata.issuer, "https://issuer.example/3");
        assert!(!cache.is_refresh_pending());
    }

    #[tokio::test]
    async fn test_min_refresh_interval_defers_requested_refresh() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(Arc::clone(&source))
            .with_min_refresh_interval(Duration::from_millis(50));

        cache.get().await.unwrap();
        cache.request_refresh();
        let deferred = cache.get().await.unwrap();

        assert_eq!(source.fetches(), 1);
        assert_eq!(deferred.issuer, "https://issuer.example/1");
        assert!(cache.is_refresh_pending());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let refreshed = cache.get().await.unwrap();

        assert_eq!(source.fetches(), 2);
        assert_eq!(refreshed.issuer, "https://issuer.example/2");
        assert!(!cache.is_refresh_pending());
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_refetched() {
        let source = Arc::new(CountingSource::new());
        let cache = IssuerMetadataCache::new(
            Arc::clone(&source) as Arc<dyn MetadataSource>,
            Duration::ZERO,
        );

        cache.get().await.unwrap();
        cache.get().await.unwrap();

        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = Arc::new(CountingSource::with_delay(Duration::from_millis(50)));
        let cache = Arc::new(cache_with(Arc::clone(&source)));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get().await.unwrap() })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        assert_eq!(source.fetches(), 1);
        for result in results {
            assert_eq!(result.unwrap().issuer, "https://issuer.example/1");
        }
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_snapshots_across_refresh() {
        let source = Arc::new(CountingSource::with_delay(Duration::from_millis(5)));
        let cache = Arc::new(cache_with(Arc::clone(&source)));
        cache.get().await.unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    if i % 8 == 0 {
                        cache.request_refresh();
                    }
                    cache.get().await.unwrap()
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            let metadata = result.unwrap();
            assert!(metadata.issuer.starts_with("https://issuer.example/"));
            assert!(metadata.signing_keys.is_empty());
        }
    }

    #[test]
    fn test_discovery_client_keeps_url() {
        let client = OidcDiscoveryClient::new(
            "http://localhost:9000/.well-known/openid-configuration".to_string(),
            Duration::from_secs(5),
        );
        assert_eq!(
            client.discovery_url(),
            "http://localhost:9000/.well-known/openid-configuration"
        );
    }
}
