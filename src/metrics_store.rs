// Live metrics publish/subscribe store.
// Keeps the latest LiveMetrics plus a bounded per-minute violation series, and pushes
// a fresh snapshot to every subscriber on each publish. Late subscribers get the
// current snapshot immediately.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::models::{AnalyticsSnapshot, LiveMetrics};

/// Width of one series bucket.
pub const DEFAULT_BUCKET_WIDTH_MS: u64 = 60_000;
/// Number of buckets retained (one hour at the default width).
pub const DEFAULT_RETENTION_BUCKETS: usize = 60;

/// Rolling series of (bucket start, violation count), oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeries {
    bucket_width_ms: u64,
    capacity: usize,
    buckets: VecDeque<(u64, u32)>,
}

impl TimeSeries {
    pub fn new(bucket_width_ms: u64, capacity: usize) -> Self {
        Self {
            bucket_width_ms: bucket_width_ms.max(1),
            capacity: capacity.max(1),
            buckets: VecDeque::with_capacity(capacity.max(1) + 1),
        }
    }

    /// Start of the bucket containing `ts`.
    pub fn bucket_start(&self, ts: u64) -> u64 {
        ts - ts % self.bucket_width_ms
    }

    /// Overwrites the last bucket when `ts` falls in it, otherwise appends and evicts
    /// the oldest bucket past capacity. A `ts` older than the last bucket (clock stepped
    /// back) also overwrites the last bucket, so bucket starts never decrease.
    pub fn record(&mut self, ts: u64, violations: u32) {
        let bucket = self.bucket_start(ts);
        if let Some(last) = self.buckets.back_mut()
            && bucket <= last.0
        {
            if bucket < last.0 {
                tracing::debug!(
                    operation = "record",
                    bucket,
                    last_bucket = last.0,
                    "timestamp older than last bucket; folding into last bucket"
                );
            }
            last.1 = violations;
            return;
        }
        self.buckets.push_back((bucket, violations));
        if self.buckets.len() > self.capacity {
            self.buckets.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.buckets.iter().map(|(ts, _)| *ts).collect()
    }

    pub fn values(&self) -> Vec<u32> {
        self.buckets.iter().map(|(_, v)| *v).collect()
    }
}

type Subscriber = Arc<dyn Fn(&AnalyticsSnapshot) + Send + Sync>;

struct Inner {
    latest: Option<LiveMetrics>,
    series: TimeSeries,
    subscribers: BTreeMap<u64, Subscriber>,
    next_id: u64,
}

impl Inner {
    fn snapshot_of(&self, metrics: LiveMetrics) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            metrics,
            timestamps: self.series.timestamps(),
            violations_series: self.series.values(),
        }
    }
}

/// Cheap to clone; clones share the same state.
///
/// Callbacks run synchronously on the publishing thread, in registration order, after
/// the store's lock is released, so a callback may itself subscribe or unsubscribe.
#[derive(Clone)]
pub struct MetricsStore {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_WIDTH_MS, DEFAULT_RETENTION_BUCKETS)
    }
}

impl MetricsStore {
    pub fn new(bucket_width_ms: u64, retention_buckets: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                latest: None,
                series: TimeSeries::new(bucket_width_ms, retention_buckets),
                subscribers: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Records `metrics` as the latest value, updates the series and notifies every subscriber.
    pub fn publish(&self, metrics: LiveMetrics) {
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock();
            inner.latest = Some(metrics);
            inner
                .series
                .record(metrics.timestamp, metrics.violating_count);
            let snapshot = inner.snapshot_of(metrics);
            let subscribers: Vec<Subscriber> = inner.subscribers.values().cloned().collect();
            (snapshot, subscribers)
        };
        tracing::debug!(
            operation = "publish",
            subscribers = subscribers.len(),
            violating = metrics.violating_count,
            "metrics published"
        );
        for callback in subscribers {
            callback(&snapshot);
        }
    }

    /// Registers `callback`. If anything was published already, it is called once
    /// right away with the current snapshot. Dropping the returned handle unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&AnalyticsSnapshot) + Send + Sync + 'static,
    {
        let callback: Subscriber = Arc::new(callback);
        let (id, current) = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.insert(id, callback.clone());
            let current = inner.latest.map(|m| inner.snapshot_of(m));
            (id, current)
        };
        if let Some(snapshot) = current {
            callback(&snapshot);
        }
        Subscription {
            id,
            store: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Forwards every delivered snapshot into a broadcast channel for async consumers.
    /// The receiver already holds the current snapshot when one exists.
    pub fn subscribe_channel(
        &self,
        capacity: usize,
    ) -> (broadcast::Receiver<AnalyticsSnapshot>, Subscription) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        let subscription = self.subscribe(move |snapshot| {
            // No receivers left is fine; the subscription is dropped with its owner.
            let _ = tx.send(snapshot.clone());
        });
        (rx, subscription)
    }

    /// Current snapshot; zeroed metrics stamped at `now` before the first publish.
    pub fn snapshot(&self, now: u64) -> AnalyticsSnapshot {
        let inner = self.inner.lock();
        let metrics = inner.latest.unwrap_or_else(|| LiveMetrics::empty(now));
        inner.snapshot_of(metrics)
    }

    pub fn latest(&self) -> Option<LiveMetrics> {
        self.inner.lock().latest
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Handle returned by [`MetricsStore::subscribe`]. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Option<Weak<Mutex<Inner>>>,
}

impl Subscription {
    /// Removes the callback. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if let Some(store) = self.store.take().and_then(|weak| weak.upgrade()) {
            store.lock().subscribers.remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.store.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
