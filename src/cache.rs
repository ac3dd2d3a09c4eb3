use crate::quote_provider::{FundQuote, QuoteProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Time source for cache expiry, injectable so tests can drive the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    stored_at: Instant,
    quote: FundQuote,
}

/// Per-code TTL cache in front of a [`QuoteProvider`].
///
/// Fetch failures are absorbed here: the caller always receives a
/// `FundQuote`, degraded when the upstream call failed. Failure records are
/// cached like successful ones (so a failing upstream is not hammered more
/// than once per TTL window) unless `cache_failures` is disabled.
pub struct QuoteCache {
    provider: Arc<dyn QuoteProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cache_failures: bool,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QuoteCache {
    pub fn new(provider: Arc<dyn QuoteProvider>, ttl: Duration, cache_failures: bool) -> Self {
        Self::with_clock(provider, ttl, cache_failures, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn QuoteProvider>,
        ttl: Duration,
        cache_failures: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            clock,
            ttl,
            cache_failures,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached quote when the entry is younger than the TTL,
    /// otherwise fetches and stores a fresh one. An entry exactly at the TTL
    /// is stale.
    pub async fn get_or_fetch(&self, code: &str) -> FundQuote {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(code) {
            if self.clock.now().duration_since(entry.stored_at) < self.ttl {
                debug!(code, "cache hit");
                return entry.quote.clone();
            }
        }
        debug!(code, "cache miss");

        match self.provider.fetch_quote(code).await {
            Ok(quote) => {
                entries.insert(
                    code.to_string(),
                    CacheEntry {
                        stored_at: self.clock.now(),
                        quote: quote.clone(),
                    },
                );
                quote
            }
            Err(err) => {
                warn!(code, error = %err, "upstream fetch failed");
                let quote = FundQuote::unavailable(code, err.category());
                if self.cache_failures {
                    entries.insert(
                        code.to_string(),
                        CacheEntry {
                            stored_at: self.clock.now(),
                            quote: quote.clone(),
                        },
                    );
                }
                quote
            }
        }
    }

    /// Drops entries older than the TTL. Superseded entries are otherwise
    /// never removed, so the map grows with the set of distinct codes queried.
    pub async fn purge_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < self.ttl);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "purged expired quotes");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
