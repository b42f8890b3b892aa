/// Response cache for upstream API calls.
///
/// ## Design
///
/// **Keys** are built explicitly from the call's identity plus its
/// arguments (`CacheKey { function: "list_measures", args: ["1491TH"] }`),
/// so tests can construct, inspect and invalidate entries directly.
///
/// **Expiry:** every entry lives for one TTL, which the service sets equal to
/// the refresh interval. An entry is never returned at or after its expiry;
/// the next call replaces it with exactly one fresh fetch.
///
/// **Failures are not cached.** A failed fetch leaves the slot empty so the
/// next refresh retries instead of serving an empty result for a whole TTL.
///
/// **Locking:** each key owns its own mutex slot. The map lock is only held
/// long enough to find the slot, and the slot lock is held across the fetch,
/// so at most one fetch per key is ever in flight while different keys
/// proceed in parallel.

use crate::ingest::flood_api::FloodDataSource;
use crate::model::{FloodApiError, Measure, RawReading, ReadingsTarget, Station};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Keys and entries
// ---------------------------------------------------------------------------

/// Identity of a cached call: which function, with which arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub function: &'static str,
    pub args: Vec<String>,
}

impl CacheKey {
    pub fn new<I, A>(function: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            function,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

/// Lock a mutex, recovering the data if another thread panicked while
/// holding it. Cache contents stay valid across a panicking fetch because
/// the slot is only written after a fetch returns.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

/// Memoizes fallible fetches by key for a fixed time-to-live.
pub struct TtlCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &CacheKey) -> Slot<V> {
        let mut slots = lock(&self.slots);
        slots.entry(key.clone()).or_default().clone()
    }

    /// Returns the cached value for `key`, or runs `fetch` and stores its
    /// result for one TTL. Errors from `fetch` are returned and not stored.
    pub fn get_or_try_fetch<E, F>(&self, key: &CacheKey, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.get_or_try_fetch_at(key, Instant::now(), fetch)
    }

    /// Same as [`get_or_try_fetch`](Self::get_or_try_fetch) with an explicit
    /// clock reading.
    pub fn get_or_try_fetch_at<E, F>(&self, key: &CacheKey, now: Instant, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref() {
            if now < cached.expires_at {
                tracing::trace!(function = key.function, args = ?key.args, "cache hit");
                return Ok(cached.value.clone());
            }
            tracing::debug!(function = key.function, args = ?key.args, "cache entry expired");
        }

        *entry = None;
        let value = fetch()?;
        *entry = Some(Entry {
            value: value.clone(),
            expires_at: now + self.ttl,
        });

        Ok(value)
    }

    /// Live value for `key` without fetching.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<V> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let entry = lock(&slot);
        entry
            .as_ref()
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Drop the entry for `key` so the next call fetches.
    pub fn invalidate(&self, key: &CacheKey) {
        let slot = lock(&self.slots).get(key).cloned();
        if let Some(slot) = slot {
            *lock(&slot) = None;
        }
    }

    pub fn clear(&self) {
        let slots: Vec<Slot<V>> = lock(&self.slots).values().cloned().collect();
        for slot in slots {
            *lock(&slot) = None;
        }
    }

    /// Removes expired entries and unused slots; returns how many entries
    /// were evicted. Slots busy with an in-flight fetch are left alone.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut slots = lock(&self.slots);
        let mut evicted = 0;

        slots.retain(|_, slot| {
            let Ok(mut entry) = slot.try_lock() else {
                return true;
            };
            if entry.as_ref().is_some_and(|cached| now >= cached.expires_at) {
                *entry = None;
                evicted += 1;
            }
            let in_use = Arc::strong_count(slot) > 1;
            entry.is_some() || in_use
        });

        evicted
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// CachedSource
// ---------------------------------------------------------------------------

/// Wraps a data source so every call goes through a TTL cache.
///
/// One instance is shared by the refresh worker and the HTTP endpoint, which
/// makes the cache process-wide.
pub struct CachedSource<S> {
    inner: S,
    stations: TtlCache<Vec<Station>>,
    measures: TtlCache<Vec<Measure>>,
    readings: TtlCache<Vec<RawReading>>,
}

impl<S: FloodDataSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            stations: TtlCache::new(ttl),
            measures: TtlCache::new(ttl),
            readings: TtlCache::new(ttl),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.stations.ttl()
    }

    pub fn stations_key() -> CacheKey {
        CacheKey::new("list_stations", Vec::<String>::new())
    }

    pub fn measures_key(station_id: &str) -> CacheKey {
        CacheKey::new("list_measures", [station_id])
    }

    /// Readings are keyed by target only; the `since` bound is recomputed
    /// inside each fetch.
    pub fn readings_key(target: &ReadingsTarget) -> CacheKey {
        CacheKey::new("list_readings", [target.kind(), target.id()])
    }

    /// Forget everything, e.g. on an explicit user refresh.
    pub fn clear(&self) {
        self.stations.clear();
        self.measures.clear();
        self.readings.clear();
    }

    /// Stored responses across all three endpoints.
    pub fn len(&self) -> usize {
        self.stations.len() + self.measures.len() + self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        self.stations.purge_expired_at(now)
            + self.measures.purge_expired_at(now)
            + self.readings.purge_expired_at(now)
    }
}

impl<S: FloodDataSource> FloodDataSource for CachedSource<S> {
    fn fetch_stations(&self) -> Result<Vec<Station>, FloodApiError> {
        self.stations
            .get_or_try_fetch(&Self::stations_key(), || self.inner.fetch_stations())
    }

    fn fetch_measures(&self, station_id: &str) -> Result<Vec<Measure>, FloodApiError> {
        self.measures.get_or_try_fetch(&Self::measures_key(station_id), || {
            self.inner.fetch_measures(station_id)
        })
    }

    fn fetch_readings(&self, target: &ReadingsTarget) -> Result<Vec<RawReading>, FloodApiError> {
        self.readings
            .get_or_try_fetch(&Self::readings_key(target), || self.inner.fetch_readings(target))
    }

    fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }
}

impl<S: FloodDataSource + ?Sized> FloodDataSource for Arc<S> {
    fn fetch_stations(&self) -> Result<Vec<Station>, FloodApiError> {
        (**self).fetch_stations()
    }

    fn fetch_measures(&self, station_id: &str) -> Result<Vec<Measure>, FloodApiError> {
        (**self).fetch_measures(station_id)
    }

    fn fetch_readings(&self, target: &ReadingsTarget) -> Result<Vec<RawReading>, FloodApiError> {
        (**self).fetch_readings(target)
    }

    fn purge_expired(&self) -> usize {
        (**self).purge_expired()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
