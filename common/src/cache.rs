//! Shared, time-based cache of thermostat state.
//!
//! Several logical sensors read the same physical device. The cache keeps the
//! latest snapshot per host and only calls the fetch closure again once the
//! stored reading is older than the stale window.
//!
//! A short-lived map lock hands out one slot per host. The slot lock is held
//! across check, fetch and update, so two callers for the same host never
//! fetch concurrently while unrelated hosts do not wait on each other.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
    time::Instant,
};

use parking_lot::Mutex;
use tracing::debug;

use crate::device::TstatSnapshot;

pub const STALE_WINDOW_MS: u64 = 10_000;

#[derive(Debug)]
pub struct CachedReading<T> {
    pub snapshot: Arc<T>,
    pub fetched_at_ms: u64,
}

impl<T> Clone for CachedReading<T> {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            fetched_at_ms: self.fetched_at_ms,
        }
    }
}

type Slot<T> = Arc<Mutex<Option<CachedReading<T>>>>;

pub struct StateCache<T = TstatSnapshot> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    stale_window_ms: u64,
}

impl<T> Default for StateCache<T> {
    fn default() -> Self {
        Self::with_stale_window(STALE_WINDOW_MS)
    }
}

impl<T> StateCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_window(stale_window_ms: u64) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            stale_window_ms,
        }
    }

    pub fn stale_window_ms(&self) -> u64 {
        self.stale_window_ms
    }

    /// Returns the cached snapshot for `host`, fetching a fresh one when the
    /// entry is missing or stale. Time is read after the slot lock is taken.
    pub fn get_state<E, F>(&self, host: &str, fetch: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.get_state_with(host, monotonic_ms, fetch)
    }

    pub fn get_state_at<E, F>(&self, host: &str, now_ms: u64, fetch: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.get_state_with(host, || now_ms, fetch)
    }

    /// Cached reading for `host` without triggering a fetch.
    pub fn peek(&self, host: &str) -> Option<CachedReading<T>> {
        let slot = self.slots.lock().get(host).cloned()?;
        let entry = slot.lock();
        entry.clone()
    }

    /// Hosts that currently hold a successful reading, sorted by host.
    pub fn readings(&self) -> Vec<(String, CachedReading<T>)> {
        let slots: Vec<(String, Slot<T>)> = self
            .slots
            .lock()
            .iter()
            .map(|(host, slot)| (host.clone(), Arc::clone(slot)))
            .collect();

        let mut readings: Vec<_> = slots
            .into_iter()
            .filter_map(|(host, slot)| {
                let entry = slot.lock();
                entry.clone().map(|reading| (host, reading))
            })
            .collect();
        readings.sort_by(|a, b| a.0.cmp(&b.0));
        readings
    }

    pub fn len(&self) -> usize {
        self.readings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, host: &str) -> Slot<T> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(host) {
            return Arc::clone(slot);
        }
        let slot: Slot<T> = Arc::new(Mutex::new(None));
        slots.insert(host.to_string(), Arc::clone(&slot));
        slot
    }

    fn get_state_with<E, N, F>(&self, host: &str, now: N, fetch: F) -> Result<Arc<T>, E>
    where
        N: FnOnce() -> u64,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(host);
        let mut entry = slot.lock();
        let now_ms = now();

        if let Some(reading) = entry.as_ref() {
            let age_ms = now_ms.saturating_sub(reading.fetched_at_ms);
            if age_ms <= self.stale_window_ms {
                debug!(host, age_ms, "serving cached thermostat state");
                return Ok(Arc::clone(&reading.snapshot));
            }
        }

        // A failed fetch returns here and leaves the previous entry in place.
        let snapshot = Arc::new(fetch()?);
        debug!(host, now_ms, "refreshed thermostat state");
        *entry = Some(CachedReading {
            snapshot: Arc::clone(&snapshot),
            fetched_at_ms: now_ms,
        });
        Ok(snapshot)
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Barrier,
        },
        thread,
        time::Duration,
    };

    #[derive(Debug, PartialEq)]
    struct Reading(u32);

    fn counting_fetch(
        calls: &AtomicUsize,
        value: u32,
    ) -> impl FnOnce() -> Result<Reading, String> + '_ {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Reading(value))
        }
    }

    #[test]
    fn fetches_once_within_stale_window() {
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_state_at("10.0.0.1", 1_000, counting_fetch(&calls, 1))
            .unwrap();
        let second = cache
            .get_state_at("10.0.0.1", 6_000, counting_fetch(&calls, 2))
            .unwrap();
        let third = cache
            .get_state_at("10.0.0.1", 11_000, counting_fetch(&calls, 3))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(*third, Reading(1));
    }

    #[test]
    fn refetches_once_reading_is_stale() {
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);

        cache
            .get_state_at("10.0.0.1", 1_000, counting_fetch(&calls, 1))
            .unwrap();
        let refreshed = cache
            .get_state_at("10.0.0.1", 11_001, counting_fetch(&calls, 2))
            .unwrap();
        let cached = cache
            .get_state_at("10.0.0.1", 12_000, counting_fetch(&calls, 3))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*refreshed, Reading(2));
        assert!(Arc::ptr_eq(&refreshed, &cached));
        assert_eq!(cache.peek("10.0.0.1").unwrap().fetched_at_ms, 11_001);
    }

    #[test]
    fn failed_fetch_keeps_previous_entry() {
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);

        cache
            .get_state_at("10.0.0.1", 1_000, counting_fetch(&calls, 1))
            .unwrap();
        let err = cache
            .get_state_at("10.0.0.1", 20_000, || Err::<Reading, _>("timeout".to_string()))
            .unwrap_err();
        assert_eq!(err, "timeout");

        let entry = cache.peek("10.0.0.1").unwrap();
        assert_eq!(entry.fetched_at_ms, 1_000);
        assert_eq!(*entry.snapshot, Reading(1));

        // Still stale, so the next call retries instead of serving old data.
        let retried = cache
            .get_state_at("10.0.0.1", 20_500, counting_fetch(&calls, 2))
            .unwrap();
        assert_eq!(*retried, Reading(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_first_fetch_leaves_no_entry() {
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);

        assert!(cache
            .get_state_at("10.0.0.1", 1_000, || Err::<Reading, _>("refused"))
            .is_err());
        assert!(cache.peek("10.0.0.1").is_none());
        assert!(cache.is_empty());

        cache
            .get_state_at("10.0.0.1", 1_001, counting_fetch(&calls, 7))
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn devices_are_cached_independently() {
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);

        let one = cache
            .get_state_at("10.0.0.1", 1_000, counting_fetch(&calls, 1))
            .unwrap();
        let two = cache
            .get_state_at("10.0.0.2", 1_000, counting_fetch(&calls, 2))
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*one, Reading(1));
        assert_eq!(*two, Reading(2));

        let hosts: Vec<String> = cache.readings().into_iter().map(|(host, _)| host).collect();
        assert_eq!(hosts, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    }

    #[test]
    fn concurrent_callers_share_one_fetch() {
        const CALLERS: usize = 8;
        let cache = StateCache::<Reading>::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(CALLERS);

        let results: Vec<Arc<Reading>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache
                            .get_state_at("10.0.0.5", 5_000, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                Ok::<_, String>(Reading(42))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), CALLERS);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn slow_fetch_does_not_block_other_devices() {
        let cache = StateCache::<Reading>::new();
        let slow_started = Barrier::new(2);

        thread::scope(|scope| {
            let slow = scope.spawn(|| {
                cache
                    .get_state_at("10.0.0.1", 1_000, || {
                        slow_started.wait();
                        thread::sleep(Duration::from_millis(200));
                        Ok::<_, String>(Reading(1))
                    })
                    .unwrap()
            });

            slow_started.wait();
            let started = Instant::now();
            let fast = cache
                .get_state_at("10.0.0.2", 1_000, || Ok::<_, String>(Reading(2)))
                .unwrap();
            assert!(started.elapsed() < Duration::from_millis(150));
            assert_eq!(*fast, Reading(2));
            assert_eq!(*slow.join().unwrap(), Reading(1));
        });
    }
}
