//! Per-visitor admission control.
//!
//! Every visitor key owns one fixed-window token bucket. Buckets are created on
//! the first request from a key and removed by a background sweep once their
//! window start is older than [`STALE_AFTER`].

use dashmap::DashMap;
use prometheus::Gauge;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::metrics::RATE_LIMIT_BUCKETS;

/// Buckets whose window started longer ago than this are evicted.
pub const STALE_AFTER: Duration = Duration::from_secs(60 * 60);

// Shared limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Bucket capacity, also reported to clients as the limit.
    pub burst_size: u32,
    /// A bucket refills to full capacity once this much time passes.
    /// A zero window refills on every call.
    pub window_size: Duration,
    /// How often the eviction sweep runs.
    pub cleanup_interval: Duration,
}

// Token bucket - tracks requests per visitor
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: u32,
    window_start: Instant,
    window_size: Duration,
}

impl TokenBucket {
    pub fn new(capacity: u32, window_size: Duration, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            window_start: now,
            window_size,
        }
    }

    fn window_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window_size
    }

    /// Take one token, refilling first if the window has lapsed.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        if self.window_elapsed(now) {
            self.tokens = self.capacity;
            self.window_start = now;
        }

        if self.tokens > 0 {
            self.tokens -= 1;
            return true;
        }

        false
    }

    /// Tokens available at `now`, without touching the bucket.
    pub fn remaining(&self, now: Instant) -> u32 {
        if self.window_elapsed(now) {
            self.capacity
        } else {
            self.tokens
        }
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}

struct Sweeper {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Admission controller keyed by visitor id.
///
/// Check-and-decrement for a key happens while holding that key's map entry,
/// so concurrent requests for the same visitor are serialized.
pub struct RateLimiter {
    buckets: Arc<DashMap<String, TokenBucket>>,
    config: RateLimiterConfig,
    sweeper: Mutex<Option<Sweeper>>,
    // tracks `buckets.len()` after every insert and sweep
    buckets_gauge: Gauge,
}

impl RateLimiter {
    /// Build a limiter without a background sweep.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            config,
            sweeper: Mutex::new(None),
            buckets_gauge: RATE_LIMIT_BUCKETS.clone(),
        }
    }

    /// Report the bucket count to `gauge` instead of the global one.
    pub fn with_gauge(mut self, gauge: Gauge) -> Self {
        self.buckets_gauge = gauge;
        self
    }

    /// Build a limiter and spawn its eviction sweep. Must be called inside a tokio runtime.
    pub fn start(config: RateLimiterConfig) -> Self {
        let limiter = Self::new(config);
        limiter.spawn_cleanup();
        limiter
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn allow(&self, key: &str) -> bool {
        let now = Instant::now();

        // look up without allocating a key for returning visitors
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return bucket.try_consume(now);
        }

        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| {
            TokenBucket::new(self.config.burst_size, self.config.window_size, now)
        });
        let allowed = bucket.try_consume(now);
        // len() takes every shard lock, release ours first
        drop(bucket);

        self.buckets_gauge.set(self.len() as f64);
        allowed
    }

    /// Snapshot of the tokens left for `key`, or `None` if the key has no bucket.
    pub fn remaining_tokens(&self, key: &str) -> Option<u32> {
        let now = Instant::now();
        self.buckets.get(key).map(|bucket| bucket.remaining(now))
    }

    /// Remove every bucket whose window started more than [`STALE_AFTER`] before `now`.
    /// Returns how many were removed.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let evicted = evict_stale(&self.buckets, now);
        self.buckets_gauge.set(self.len() as f64);
        evicted
    }

    /// Spawn the background sweep. Does nothing if one is already running.
    pub fn spawn_cleanup(&self) {
        let mut sweeper = match self.sweeper.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sweeper.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let buckets = Arc::clone(&self.buckets);
        let gauge = self.buckets_gauge.clone();
        let period = self.config.cleanup_interval;
        let handle = tokio::spawn(cleanup_loop(buckets, gauge, period, stop_rx));

        *sweeper = Some(Sweeper { stop_tx, handle });
    }

    /// Stop the sweep and wait for it to exit. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let sweeper = match self.sweeper.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(Sweeper { stop_tx, handle }) = sweeper else {
            return;
        };

        // the receiver only goes away if the task already ended
        let _ = stop_tx.send(());
        if let Err(e) = handle.await {
            warn!("Rate limiter sweep ended abnormally: {}", e);
        }
        info!("Rate limiter sweep stopped");
    }
}

fn evict_stale(buckets: &DashMap<String, TokenBucket>, now: Instant) -> usize {
    let before = buckets.len();
    buckets.retain(|_, bucket| now.saturating_duration_since(bucket.window_start()) <= STALE_AFTER);
    before.saturating_sub(buckets.len())
}

// Eviction sweep - runs every cleanup interval until told to stop
async fn cleanup_loop(
    buckets: Arc<DashMap<String, TokenBucket>>,
    gauge: Gauge,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let period = if period.is_zero() {
        warn!("Cleanup interval of zero, sweeping every second instead");
        Duration::from_secs(1)
    } else {
        period
    };

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Rate limiter sweep started (interval: {:?})", period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = evict_stale(&buckets, Instant::now());
                gauge.set(buckets.len() as f64);
                debug!(evicted, remaining = buckets.len(), "Rate limiter sweep");
            }
            _ = &mut stop_rx => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn config(burst_size: u32, window_secs: u64) -> RateLimiterConfig {
        RateLimiterConfig {
            burst_size,
            window_size: Duration::from_secs(window_secs),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_allows_burst_then_denies() {
        let limiter = RateLimiter::new(config(3, 60));

        assert!(limiter.allow("alice"));
        assert!(limiter.allow("alice"));
        assert!(limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(config(1, 60));

        assert!(limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
        assert!(limiter.allow("bob"));
        assert_eq!(limiter.len(), 2);
    }

    fn gauge() -> Gauge {
        Gauge::new("test_rate_limit_buckets", "buckets in this test").unwrap()
    }

    #[test]
    fn test_gauge_follows_bucket_count() {
        let gauge = gauge();
        let limiter = RateLimiter::new(config(1, 60)).with_gauge(gauge.clone());

        limiter.allow("alice");
        limiter.allow("bob");
        // returning and denied visitors leave the count alone
        limiter.allow("alice");
        assert_eq!(gauge.get(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_updates_gauge() {
        let gauge = gauge();
        let limiter = RateLimiter::new(config(5, 60)).with_gauge(gauge.clone());
        limiter.spawn_cleanup();
        limiter.allow("alice");
        assert_eq!(gauge.get(), 1.0);

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;

        assert!(limiter.is_empty());
        assert_eq!(gauge.get(), 0.0);
        limiter.shutdown().await;
    }

    #[test]
    fn test_zero_burst_always_denies() {
        let limiter = RateLimiter::new(config(0, 60));

        assert!(!limiter.allow("alice"));
        assert!(!limiter.allow("alice"));
        assert_eq!(limiter.remaining_tokens("alice"), Some(0));
    }

    #[test]
    fn test_zero_window_refills_every_call() {
        let limiter = RateLimiter::new(config(1, 0));

        for _ in 0..5 {
            assert!(limiter.allow("alice"));
        }
    }

    #[test]
    fn test_remaining_tokens_distinguishes_missing_bucket() {
        let limiter = RateLimiter::new(config(2, 60));

        assert_eq!(limiter.remaining_tokens("alice"), None);
        limiter.allow("alice");
        assert_eq!(limiter.remaining_tokens("alice"), Some(1));
        limiter.allow("alice");
        assert_eq!(limiter.remaining_tokens("alice"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset_after_window_elapses() {
        let limiter = RateLimiter::new(config(2, 10));

        assert!(limiter.allow("alice"));
        assert!(limiter.allow("alice"));
        assert!(!limiter.allow("alice"));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!limiter.allow("alice"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.remaining_tokens("alice"), Some(2));
        assert!(limiter.allow("alice"));
        assert_eq!(limiter.remaining_tokens("alice"), Some(1));
    }

    #[test]
    fn test_concurrent_allow_never_over_admits() {
        let limiter = Arc::new(RateLimiter::new(config(50, 3600)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..100).filter(|_| limiter.allow("shared")).count())
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(limiter.remaining_tokens("shared"), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_stale_removes_old_buckets_only() {
        let limiter = RateLimiter::new(config(5, 60));
        limiter.allow("old");

        tokio::time::advance(Duration::from_secs(30 * 60)).await;
        limiter.allow("new");

        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        let evicted = limiter.evict_stale(Instant::now());

        assert_eq!(evicted, 1);
        assert_eq!(limiter.remaining_tokens("old"), None);
        assert!(limiter.remaining_tokens("new").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_evicts_idle_visitors() {
        let limiter = RateLimiter::start(config(5, 60));
        limiter.allow("alice");
        assert_eq!(limiter.len(), 1);

        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;

        assert!(limiter.is_empty());
        limiter.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let limiter = RateLimiter::start(config(5, 60));

        limiter.shutdown().await;
        limiter.shutdown().await;

        // the limiter keeps admitting after the sweep is gone
        assert!(limiter.allow("alice"));
    }

    #[tokio::test]
    async fn test_shutdown_without_sweep_is_noop() {
        let limiter = RateLimiter::new(config(5, 60));
        limiter.shutdown().await;
    }
}
