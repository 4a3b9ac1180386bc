//! Client cache
//!
//! Configured HTTP clients are reused per distinct connection configuration.
//! Entries use a sliding idle expiry: every hit resets the idle timer, and a
//! client idle for longer than the configured period (one hour by default)
//! is evicted by the cache's housekeeping.
//!
//! Concurrent misses on the same fingerprint may both construct a client; the
//! last insert wins. Clients hold configuration only, so the loser is simply
//! dropped.

use crate::config::ConnectionOptions;
use crate::errors::{Error, Result};
use moka::future::Cache;
use moka::notification::RemovalCause;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, trace};

const USER_AGENT_PREFIX: &str = "servicenow-connector-rust";

/// Client cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached clients
    pub max_entries: u64,
    /// Sliding idle timeout for cached clients in seconds
    pub idle_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::DEFAULT_CLIENT_CACHE_MAX_ENTRIES,
            idle_timeout_secs: crate::DEFAULT_CLIENT_IDLE_SECS,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    inner: Arc<CacheStatsInner>,
}

#[derive(Debug, Default)]
struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(CacheStatsInner::default()),
        }
    }

    /// Get the number of cache hits
    pub fn hits(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    /// Get the number of cache misses
    pub fn misses(&self) -> u64 {
        self.inner.misses.load(Ordering::Relaxed)
    }

    /// Get the number of clients inserted
    pub fn insertions(&self) -> u64 {
        self.inner.insertions.load(Ordering::Relaxed)
    }

    /// Get the number of clients evicted for capacity
    pub fn evictions(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    /// Get the number of clients expired after idling
    pub fn expirations(&self) -> u64 {
        self.inner.expirations.load(Ordering::Relaxed)
    }

    /// Get the hit rate as a percentage (0.0-100.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    /// Reset all statistics to zero
    pub fn reset(&self) {
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        self.inner.insertions.store(0, Ordering::Relaxed);
        self.inner.evictions.store(0, Ordering::Relaxed);
        self.inner.expirations.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        let _ = self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        let _ = self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insertion(&self) {
        let _ = self.inner.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        let _ = self.inner.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expiration(&self) {
        let _ = self.inner.expirations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Constructs HTTP clients for a connection configuration
pub trait HttpClientFactory: Send + Sync {
    /// Build a client configured from the connection-level options
    fn create_client(&self, options: &ConnectionOptions) -> Result<reqwest::Client>;
}

/// Default factory backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestClientFactory {
    user_agent: String,
}

impl ReqwestClientFactory {
    /// Create a factory; `suffix` is appended to the user agent
    pub fn new(suffix: Option<String>) -> Self {
        let user_agent = match suffix {
            Some(suffix) => format!("{}/{} {}", USER_AGENT_PREFIX, crate::VERSION, suffix),
            None => format!("{}/{}", USER_AGENT_PREFIX, crate::VERSION),
        };
        Self { user_agent }
    }
}

impl Default for ReqwestClientFactory {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpClientFactory for ReqwestClientFactory {
    fn create_client(&self, options: &ConnectionOptions) -> Result<reqwest::Client> {
        if options.connection_timeout_seconds == 0 {
            return Err(Error::Config(
                "Connection timeout must be greater than zero seconds".to_string(),
            ));
        }

        let redirect = if options.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(Duration::from_secs(options.connection_timeout_seconds))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(redirect)
            .cookie_store(options.automatic_cookie_handling)
            .danger_accept_invalid_certs(options.allow_invalid_certificate)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }
}

/// A configured HTTP client held by the cache
#[derive(Clone)]
pub struct CachedClient {
    fingerprint: Arc<str>,
    http: reqwest::Client,
    created_at: OffsetDateTime,
    last_accessed: Arc<AtomicI64>,
}

impl CachedClient {
    fn new(fingerprint: &str, http: reqwest::Client) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            fingerprint: Arc::from(fingerprint),
            http,
            created_at: now,
            last_accessed: Arc::new(AtomicI64::new(unix_nanos(now))),
        }
    }

    fn touch(&self) {
        self.last_accessed
            .store(unix_nanos(OffsetDateTime::now_utc()), Ordering::Relaxed);
    }

    /// Fingerprint this client was cached under
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Underlying HTTP client
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// When the client was constructed
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// When the client was last handed out by the cache
    pub fn last_accessed(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(
            self.last_accessed.load(Ordering::Relaxed),
        ))
        .unwrap_or(self.created_at)
    }
}

fn unix_nanos(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos()).unwrap_or(i64::MAX)
}

impl fmt::Debug for CachedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedClient")
            .field("created_at", &self.created_at)
            .field("last_accessed", &self.last_accessed())
            .finish()
    }
}

/// Compute the cache key for a set of connection options
///
/// Fields are joined with `:` in a fixed order. The bearer token is excluded
/// because it is applied per request, so token rotation reuses the client.
pub(crate) fn compute_key(options: &ConnectionOptions) -> String {
    use secrecy::ExposeSecret;

    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}:{}",
        options.authentication,
        escape_segment(&options.username),
        escape_segment(options.password.expose_secret()),
        options.connection_timeout_seconds,
        options.follow_redirects,
        options.allow_invalid_certificate,
        options.allow_invalid_response_content_type_charset,
        options.throw_exception_on_error_response,
        options.automatic_cookie_handling,
    )
}

// Free-text segments may contain the separator.
fn escape_segment(value: &str) -> String {
    value.replace('\\', "\\\\").replace(':', "\\:")
}

/// Injectable cache of configured HTTP clients
///
/// Construct one per process (or per host) and share it between
/// [`Client`](crate::Client)s with
/// [`ClientBuilder::client_cache`](crate::ClientBuilder::client_cache).
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct ClientCache {
    clients: Cache<String, CachedClient>,
    factory: Arc<dyn HttpClientFactory>,
    stats: CacheStats,
    config: CacheConfig,
}

impl fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCache")
            .field("config", &self.config)
            .field("entry_count", &self.clients.entry_count())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ClientCache {
    /// Create a cache building clients with [`ReqwestClientFactory`]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_factory(config, Arc::new(ReqwestClientFactory::default()))
    }

    /// Create a cache with a custom client factory
    pub fn with_factory(config: CacheConfig, factory: Arc<dyn HttpClientFactory>) -> Self {
        let stats = CacheStats::new();
        let listener_stats = stats.clone();

        let clients = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_idle(Duration::from_secs(config.idle_timeout_secs))
            .eviction_listener(move |_key, _client: CachedClient, cause| match cause {
                RemovalCause::Expired => {
                    trace!("Cached HTTP client expired after idling");
                    listener_stats.record_expiration();
                }
                RemovalCause::Size => {
                    trace!("Cached HTTP client evicted for capacity");
                    listener_stats.record_eviction();
                }
                _ => {}
            })
            .build();

        Self {
            clients,
            factory,
            stats,
            config,
        }
    }

    /// Return the cached client for these options, constructing it on a miss
    ///
    /// A hit refreshes the entry's idle timer.
    pub async fn get_or_create(&self, options: &ConnectionOptions) -> Result<CachedClient> {
        self.lookup(options).await.map(|(client, _)| client)
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting whether it was a hit
    pub(crate) async fn lookup(&self, options: &ConnectionOptions) -> Result<(CachedClient, bool)> {
        let key = compute_key(options);

        if let Some(client) = self.clients.get(&key).await {
            client.touch();
            self.stats.record_hit();
            trace!("Client cache hit");
            return Ok((client, true));
        }

        self.stats.record_miss();
        trace!("Client cache miss");

        let http = self.factory.create_client(options)?;
        let client = CachedClient::new(&key, http);
        self.clients.insert(key, client.clone()).await;
        self.stats.record_insertion();
        debug!(
            timeout_secs = options.connection_timeout_seconds,
            follow_redirects = options.follow_redirects,
            cookies = options.automatic_cookie_handling,
            "Created HTTP client"
        );

        Ok((client, false))
    }

    /// Drop the client cached for these options, if any
    pub async fn invalidate(&self, options: &ConnectionOptions) {
        self.clients.invalidate(&compute_key(options)).await;
    }

    /// Approximate number of cached clients
    pub fn entry_count(&self) -> u64 {
        self.clients.entry_count()
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Drop every cached client and run pending housekeeping
    pub async fn shutdown(&self) {
        self.clients.invalidate_all();
        self.clients.run_pending_tasks().await;
        debug!("Client cache drained");
    }
}
