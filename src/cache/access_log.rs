//! Access Event Log
//!
//! Append-only, retention-windowed record of cache operations. Appends take
//! their own short lock, separate from the cache store's entry lock, and
//! prune expired events from the front as they go.

use crate::cache::events::AccessEvent;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default retention window: 24 hours
pub const DEFAULT_RETENTION_SECS: u64 = 24 * 60 * 60;

/// Default hard cap on retained events
pub const DEFAULT_MAX_EVENTS: usize = 100_000;

/// Longest accepted retention window: 10 years
const MAX_RETENTION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Bounded, time-windowed log of access events
#[derive(Debug)]
pub struct AccessEventLog {
    /// Events in insertion order (oldest at front)
    events: Mutex<VecDeque<AccessEvent>>,
    /// How long events are kept
    retention: Duration,
    /// Hard cap on retained events
    max_events: usize,
    /// Events appended since creation
    recorded: AtomicU64,
    /// Events discarded by retention or the cap
    pruned: AtomicU64,
}

impl AccessEventLog {
    /// Create a log with default retention and cap
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_RETENTION_SECS, DEFAULT_MAX_EVENTS)
    }

    /// Create a log with explicit retention (seconds) and cap
    pub fn with_limits(retention_secs: u64, max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            retention: Duration::seconds(retention_secs.min(MAX_RETENTION_SECS) as i64),
            max_events: max_events.max(1),
            recorded: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
        }
    }

    /// Append an event, discarding events that fell out of the window
    ///
    /// An event already older than the window is dropped on arrival. Events
    /// that arrive out of order can sit behind newer ones; they are swept
    /// when the cap is reached and never returned by the readers.
    pub fn record(&self, event: AccessEvent) {
        let cutoff = self.cutoff();
        let mut pruned = 0u64;
        {
            let mut events = self.events.lock();
            if event.timestamp < cutoff {
                pruned += 1;
            } else {
                events.push_back(event);
            }

            if events.len() > self.max_events {
                let before = events.len();
                events.retain(|e| e.timestamp >= cutoff);
                pruned += (before - events.len()) as u64;
            }
            while let Some(front) = events.front() {
                if front.timestamp < cutoff || events.len() > self.max_events {
                    events.pop_front();
                    pruned += 1;
                } else {
                    break;
                }
            }
        }

        self.recorded.fetch_add(1, Ordering::Relaxed);
        if pruned > 0 {
            self.pruned.fetch_add(pruned, Ordering::Relaxed);
        }
    }

    /// Append a batch of events
    pub fn record_all(&self, events: impl IntoIterator<Item = AccessEvent>) {
        for event in events {
            self.record(event);
        }
    }

    /// Events with `since <= timestamp <= until`, ordered by timestamp
    pub fn filter(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<AccessEvent> {
        let since = since.max(self.cutoff());
        let mut selected: Vec<AccessEvent> = {
            let events = self.events.lock();
            events
                .iter()
                .filter(|e| e.timestamp >= since && e.timestamp <= until)
                .cloned()
                .collect()
        };
        // Concurrent writers can append slightly out of order
        selected.sort_by_key(|e| e.timestamp);
        selected
    }

    /// Events from the last `window`, ordered by timestamp
    pub fn recent(&self, window: std::time::Duration) -> Vec<AccessEvent> {
        let now = Utc::now();
        let window = Duration::from_std(window).unwrap_or(self.retention);
        self.filter(now - window, now)
    }

    /// Every event inside the retention window, ordered by timestamp
    pub fn snapshot(&self) -> Vec<AccessEvent> {
        let cutoff = self.cutoff();
        let mut all: Vec<AccessEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();
        all.sort_by_key(|e| e.timestamp);
        all
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the log holds no events
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Total events appended since creation
    pub fn total_recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Total events discarded by retention or the cap
    pub fn total_pruned(&self) -> u64 {
        self.pruned.load(Ordering::Relaxed)
    }

    /// Retention window
    pub fn retention(&self) -> std::time::Duration {
        self.retention.to_std().unwrap_or_default()
    }

    /// Drop every retained event
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.retention
    }
}

impl Default for AccessEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheKey;
    use crate::cache::events::AccessEventKind;

    fn event_at(kind: AccessEventKind, name: &str, ts: DateTime<Utc>) -> AccessEvent {
        AccessEvent::at(kind, CacheKey::from_content(name.as_bytes()), ts)
    }

    #[test]
    fn test_record_and_filter() {
        let log = AccessEventLog::new();
        let now = Utc::now();

        log.record(event_at(AccessEventKind::Hit, "a", now - Duration::minutes(30)));
        log.record(event_at(AccessEventKind::Miss, "b", now - Duration::minutes(10)));
        log.record(event_at(AccessEventKind::Set, "b", now - Duration::minutes(5)));

        assert_eq!(log.len(), 3);
        let window = log.filter(now - Duration::minutes(15), now);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].kind, AccessEventKind::Miss);
        assert_eq!(window[1].kind, AccessEventKind::Set);
    }

    #[test]
    fn test_filter_orders_by_timestamp() {
        let log = AccessEventLog::new();
        let now = Utc::now();

        log.record(event_at(AccessEventKind::Hit, "late", now - Duration::seconds(1)));
        log.record(event_at(AccessEventKind::Hit, "early", now - Duration::seconds(20)));

        let events = log.filter(now - Duration::minutes(1), now);
        assert!(events[0].timestamp < events[1].timestamp);
        assert_eq!(events[0].key, CacheKey::from_content(b"early"));
    }

    #[test]
    fn test_retention_prunes_old_events() {
        let log = AccessEventLog::with_limits(60, 1000);
        let now = Utc::now();

        log.record(event_at(AccessEventKind::Hit, "old", now - Duration::minutes(10)));
        log.record(event_at(AccessEventKind::Hit, "new", now));

        assert_eq!(log.len(), 1);
        assert_eq!(log.total_recorded(), 2);
        assert_eq!(log.total_pruned(), 1);
    }

    #[test]
    fn test_out_of_order_events_respect_retention() {
        let log = AccessEventLog::with_limits(60, 3);
        let now = Utc::now();

        log.record(event_at(AccessEventKind::Hit, "fresh-1", now));
        // Stale on arrival
        log.record(event_at(AccessEventKind::Hit, "stale", now - Duration::minutes(10)));
        assert_eq!(log.len(), 1);
        assert_eq!(log.total_pruned(), 1);

        // Live when recorded, then ages out while newer events sit in front
        let aging = now - Duration::seconds(59);
        log.record(event_at(AccessEventKind::Hit, "fresh-2", now));
        log.record(event_at(AccessEventKind::Hit, "aging", aging));
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(log.snapshot().iter().all(|e| e.timestamp >= now - Duration::seconds(60)));
        assert_eq!(log.snapshot().len(), 2);
        assert_eq!(log.filter(now - Duration::hours(1), Utc::now()).len(), 2);

        // Reaching the cap sweeps the aged event instead of a live one
        log.record(event_at(AccessEventKind::Hit, "fresh-3", Utc::now()));
        log.record(event_at(AccessEventKind::Hit, "fresh-4", Utc::now()));
        let keys: Vec<CacheKey> = log.snapshot().iter().map(|e| e.key).collect();
        assert_eq!(log.len(), 3);
        assert!(!keys.contains(&CacheKey::from_content(b"aging")));
    }

    #[test]
    fn test_concurrent_appends() {
        let log = std::sync::Arc::new(AccessEventLog::with_limits(3600, 10_000));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = std::sync::Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let name = format!("w{}-{}", worker, i);
                        log.record(AccessEvent::hit(CacheKey::from_content(name.as_bytes())));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 4000);
        assert_eq!(log.total_recorded(), 4000);
        let snapshot = log.snapshot();
        assert!(snapshot.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_event_cap() {
        let log = AccessEventLog::with_limits(3600, 3);
        for i in 0..5 {
            log.record(AccessEvent::hit(CacheKey::from_content(format!("k{}", i).as_bytes())));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_pruned(), 2);
    }

    #[test]
    fn test_recent_and_clear() {
        let log = AccessEventLog::new();
        let now = Utc::now();
        log.record(event_at(AccessEventKind::Hit, "a", now - Duration::hours(2)));
        log.record(event_at(AccessEventKind::Hit, "b", now));

        assert_eq!(log.recent(std::time::Duration::from_secs(3600)).len(), 1);

        log.clear();
        assert!(log.is_empty());
    }
}
