//! Monotonic counters shared by the queue, dispatcher, and coordinator
//! (spec §4.6). Updated under atomics rather than the queue's buffer mutex —
//! "Stats counters are updated under their own mutex; builders do not touch
//! the queue's mutex" (spec §5) is honored by giving each counter its own
//! atomic cell instead of a shared lock on the hot enqueue path.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    traces_created: AtomicU64,
    spans_created: AtomicU64,
    generations_created: AtomicU64,
    events_enqueued: AtomicU64,
    events_submitted: AtomicU64,
    events_failed: AtomicU64,
    events_dropped: AtomicU64,
    last_activity_millis: AtomicI64,
}

/// A consistent point-in-time snapshot of [`Stats`].
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub traces_created: u64,
    pub spans_created: u64,
    pub generations_created: u64,
    pub events_enqueued: u64,
    pub events_submitted: u64,
    pub events_failed: u64,
    pub events_dropped: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Stats {
    pub fn record_trace_created(&self) {
        self.traces_created.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_span_created(&self) {
        self.spans_created.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_generation_created(&self) {
        self.generations_created.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_submitted(&self, n: u64) {
        self.events_submitted.fetch_add(n, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_failed(&self, n: u64) {
        self.events_failed.fetch_add(n, Ordering::Relaxed);
        self.touch();
    }

    pub fn record_dropped(&self, n: u64) {
        self.events_dropped.fetch_add(n, Ordering::Relaxed);
    }

    fn touch(&self) {
        self.last_activity_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let millis = self.last_activity_millis.load(Ordering::Relaxed);
        let last_activity = if millis == 0 {
            None
        } else {
            DateTime::from_timestamp_millis(millis)
        };
        StatsSnapshot {
            traces_created: self.traces_created.load(Ordering::Relaxed),
            spans_created: self.spans_created.load(Ordering::Relaxed),
            generations_created: self.generations_created.load(Ordering::Relaxed),
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_submitted: self.events_submitted.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            last_activity,
        }
    }
}
