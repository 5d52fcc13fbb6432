//! TTL caching shared across data sources.
//!
//! Two disciplines live here: a plain [`CacheEntry`] wrapper (value plus
//! fetch timestamp) used by the station registry, and [`PointCache`], a
//! per-location cache with a parallel *negative* cache that remembers recent
//! fetch failures so a flapping upstream is not hammered once per query.
//!
//! All time arithmetic goes through an injected [`Clock`] so TTL behaviour is
//! testable without sleeping.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Time source. Production code uses [`SystemClock`]; tests inject a manual
/// clock and advance it explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached value with its fetch time. Valid while `now - fetched_at < ttl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, fetched_at: DateTime<Utc>) -> Self {
        CacheEntry { value, fetched_at }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

/// A recorded fetch failure. While fresh, it suppresses retry entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FailureEntry {
    pub failed_at: DateTime<Utc>,
}

impl FailureEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.failed_at < ttl
    }
}

/// Outcome of a [`PointCache::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum PointLookup<T> {
    /// A fresh positive entry.
    Hit(T),
    /// A fresh failure entry: do not fetch, report "no data".
    RecentFailure,
    /// Nothing cached; the caller should fetch and record the outcome.
    Miss,
}

/// Cache key: raw coordinates snapped to the source grid's native resolution,
/// so nearby queries share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey {
    lat_idx: i32,
    lon_idx: i32,
}

/// Per-location cache with positive and negative TTLs.
///
/// Entries are immutable once written, so concurrent reads are safe; writes
/// are last-writer-wins, which is acceptable because two fetches of the same
/// snapped key are expected to return equivalent values.
pub struct PointCache<T> {
    resolution_deg: f64,
    ttl: Duration,
    failure_ttl: Duration,
    entries: RwLock<HashMap<PointKey, CacheEntry<T>>>,
    failures: RwLock<HashMap<PointKey, FailureEntry>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> PointCache<T> {
    pub fn new(resolution_deg: f64, ttl: Duration, failure_ttl: Duration) -> Self {
        Self::with_clock(resolution_deg, ttl, failure_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        resolution_deg: f64,
        ttl: Duration,
        failure_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        PointCache {
            resolution_deg,
            ttl,
            failure_ttl,
            entries: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn key(&self, lat: f64, lon: f64) -> PointKey {
        PointKey {
            lat_idx: (lat / self.resolution_deg).round() as i32,
            lon_idx: (lon / self.resolution_deg).round() as i32,
        }
    }

    /// Positive cache first, then the negative cache. Stale entries on either
    /// side are ignored (and cleaned up on the next write).
    pub fn lookup(&self, lat: f64, lon: f64) -> PointLookup<T> {
        let key = self.key(lat, lon);
        let now = self.clock.now();

        if let Some(entry) = self.entries.read().get(&key) {
            if entry.is_fresh(now, self.ttl) {
                return PointLookup::Hit(entry.value.clone());
            }
        }
        if let Some(failure) = self.failures.read().get(&key) {
            if failure.is_fresh(now, self.failure_ttl) {
                return PointLookup::RecentFailure;
            }
        }
        PointLookup::Miss
    }

    /// Record a successful fetch; clears any failure entry for the key.
    pub fn record_success(&self, lat: f64, lon: f64, value: T) {
        let key = self.key(lat, lon);
        let now = self.clock.now();
        self.entries.write().insert(key, CacheEntry::new(value, now));
        self.failures.write().remove(&key);
    }

    /// Record a failed fetch; queries for this key return
    /// [`PointLookup::RecentFailure`] until the failure TTL lapses.
    pub fn record_failure(&self, lat: f64, lon: f64) {
        let key = self.key(lat, lon);
        let now = self.clock.now();
        self.failures.write().insert(key, FailureEntry { failed_at: now });
    }
}


#[cfg(test)]
mod tests {
    use super::test_clock::ManualClock;
    use super::*;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    fn cache_with(clock: Arc<ManualClock>) -> PointCache<f64> {
        PointCache::with_clock(0.25, Duration::hours(6), Duration::hours(1), clock)
    }

    #[test]
    fn nearby_coordinates_share_a_key() {
        let cache = cache_with(clock());
        assert_eq!(cache.key(34.05, -120.01), cache.key(34.1, -119.95));
        assert_ne!(cache.key(34.05, -120.01), cache.key(34.5, -120.01));
    }

    #[test]
    fn hit_until_ttl_lapses() {
        let clock = clock();
        let cache = cache_with(clock.clone());
        cache.record_success(34.05, -120.0, 17.5);

        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::Hit(17.5));

        clock.advance(Duration::hours(7));
        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::Miss);
    }

    #[test]
    fn recent_failure_suppresses_retry_within_its_ttl() {
        let clock = clock();
        let cache = cache_with(clock.clone());
        cache.record_failure(34.05, -120.0);

        // A live failure entry means: do not fetch again.
        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::RecentFailure);

        clock.advance(Duration::minutes(59));
        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::RecentFailure);

        clock.advance(Duration::minutes(2));
        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::Miss);
    }

    #[test]
    fn success_clears_a_prior_failure() {
        let clock = clock();
        let cache = cache_with(clock.clone());
        cache.record_failure(34.05, -120.0);
        cache.record_success(34.05, -120.0, 16.0);

        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::Hit(16.0));

        // Even after the positive entry expires, the old failure stays gone.
        clock.advance(Duration::hours(7));
        assert_eq!(cache.lookup(34.05, -120.0), PointLookup::Miss);
    }
}
