//! The bounded ingestion buffer.
//!
//! Structured like `opentelemetry_sdk::trace::BatchSpanProcessorInternal::run`
//! (a single background task driven by `tokio::select!` over a message
//! stream and a periodic ticker), but where that processor's buffer is
//! simply the channel itself, this queue needs three different overflow
//! behaviors (drop-newest, drop-oldest, block-with-timeout) — drop-oldest in
//! particular needs to evict from the *front* of a full buffer, which a
//! plain bounded channel cannot do. So the buffer is a `Mutex<VecDeque<Event>>`
//! guarded directly, with `tokio::sync::Notify` for the suspension points
//! (new data available, space freed).

use crate::model::Event;
use crate::stats::Stats;
use crate::LangfuseError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

/// A batch of events handed off to the dispatcher, in enqueue order.
pub type Batch = Vec<Event>;

/// Overflow behavior once the queue reaches `maxQueueSize`.
#[derive(Debug, Clone, Copy)]
pub enum OverflowPolicy {
    /// Reject the new event; the oldest buffered events (which anchor the
    /// trace causal graph) are preserved. The default.
    DropNewest,
    /// Evict the oldest buffered event to make room for the new one.
    DropOldest,
    /// Suspend the caller for up to the given duration waiting for space.
    BlockWithTimeout(Duration),
}

struct Shared {
    buffer: Mutex<VecDeque<Event>>,
    capacity: usize,
    data_available: Notify,
    space_available: Notify,
    closed: AtomicBool,
}

enum Control {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<ShutdownOutcome>),
}

/// Result of a [`IngestionQueue::shutdown`] call.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownOutcome {
    /// Events still sitting in the buffer when the deadline was hit and
    /// draining was abandoned.
    pub undrained: usize,
}

/// The bounded, multi-producer/single-consumer ingestion buffer.
pub struct IngestionQueue {
    shared: Arc<Shared>,
    policy: OverflowPolicy,
    flush_at: usize,
    control_tx: mpsc::UnboundedSender<Control>,
    stats: Arc<Stats>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for IngestionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionQueue")
            .field("capacity", &self.shared.capacity)
            .field("flush_at", &self.flush_at)
            .finish()
    }
}

impl IngestionQueue {
    /// Builds the queue and spawns its background batching task. `batch_tx`
    /// is the channel the dispatcher reads assembled batches from.
    pub fn new(
        capacity: usize,
        flush_at: usize,
        flush_interval: Duration,
        max_batch_size: usize,
        policy: OverflowPolicy,
        stats: Arc<Stats>,
        batch_tx: mpsc::Sender<Batch>,
    ) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            data_available: Notify::new(),
            space_available: Notify::new(),
            closed: AtomicBool::new(false),
        });

        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            Arc::clone(&shared),
            flush_at,
            flush_interval,
            max_batch_size,
            control_rx,
            batch_tx,
            Arc::clone(&stats),
        ));

        IngestionQueue {
            shared,
            policy,
            flush_at,
            control_tx,
            stats,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Non-blocking except under [`OverflowPolicy::BlockWithTimeout`].
    pub async fn enqueue(&self, event: Event) -> Result<(), LangfuseError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(LangfuseError::QueueFull);
        }

        loop {
            {
                let mut buf = self.shared.buffer.lock().unwrap();
                if buf.len() < self.shared.capacity {
                    buf.push_back(event);
                    drop(buf);
                    self.stats.record_enqueued();
                    self.shared.data_available.notify_one();
                    return Ok(());
                }

                match self.policy {
                    OverflowPolicy::DropNewest => {
                        drop(buf);
                        self.stats.record_dropped(1);
                        tracing::warn!("langfuse: ingestion queue full, dropping newest event");
                        return Err(LangfuseError::QueueFull);
                    }
                    OverflowPolicy::DropOldest => {
                        buf.pop_front();
                        buf.push_back(event);
                        drop(buf);
                        self.stats.record_dropped(1);
                        self.stats.record_enqueued();
                        tracing::warn!("langfuse: ingestion queue full, dropping oldest event");
                        self.shared.data_available.notify_one();
                        return Ok(());
                    }
                    OverflowPolicy::BlockWithTimeout(timeout) => {
                        drop(buf);
                        let wait = self.shared.space_available.notified();
                        if tokio::time::timeout(timeout, wait).await.is_err() {
                            self.stats.record_dropped(1);
                            return Err(LangfuseError::QueueFull);
                        }
                        // loop back around and retry the insert
                    }
                }
            }
        }
    }

    /// Forces assembly and hand-off of all currently buffered events.
    /// Blocks until the dispatcher has accepted them, not until the server
    /// has acknowledged them.
    pub async fn flush(&self) -> Result<(), LangfuseError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(Control::Flush(tx))
            .map_err(|_| LangfuseError::Cancelled)?;
        rx.await.map_err(|_| LangfuseError::Cancelled)
    }

    /// Rejects new enqueues, drains the buffer, and waits up to `deadline`
    /// for the worker to finish.
    pub async fn shutdown(&self, deadline: Duration) -> Result<ShutdownOutcome, LangfuseError> {
        self.shared.closed.store(true, Ordering::Release);

        let (tx, rx) = oneshot::channel();
        if self.control_tx.send(Control::Shutdown(tx)).is_err() {
            return Ok(ShutdownOutcome { undrained: 0 });
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(outcome)) => {
                if let Some(handle) = self.worker.lock().unwrap().take() {
                    let _ = handle.await;
                }
                Ok(outcome)
            }
            Ok(Err(_)) => Err(LangfuseError::Cancelled),
            Err(_) => {
                let undrained = self.shared.buffer.lock().unwrap().len();
                tracing::warn!(undrained, "langfuse: shutdown deadline exceeded before drain completed");
                Err(LangfuseError::Cancelled)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shared.buffer.lock().unwrap().len()
    }
}

fn drain_batch(shared: &Shared, max_batch_size: usize) -> Option<Batch> {
    let mut buf = shared.buffer.lock().unwrap();
    if buf.is_empty() {
        return None;
    }
    let take = buf.len().min(max_batch_size);
    let batch: Batch = buf.drain(..take).collect();
    drop(buf);
    shared.space_available.notify_waiters();
    Some(batch)
}

async fn run_worker(
    shared: Arc<Shared>,
    flush_at: usize,
    flush_interval: Duration,
    max_batch_size: usize,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    batch_tx: mpsc::Sender<Batch>,
    stats: Arc<Stats>,
) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            _ = shared.data_available.notified() => {
                while shared.buffer.lock().unwrap().len() >= flush_at {
                    match drain_batch(&shared, max_batch_size) {
                        Some(batch) => {
                            let n = batch.len() as u64;
                            if batch_tx.send(batch).await.is_err() {
                                stats.record_failed(n);
                                return;
                            }
                        }
                        None => break,
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(batch) = drain_batch(&shared, max_batch_size) {
                    if batch_tx.send(batch).await.is_err() {
                        return;
                    }
                }
            }
            msg = control_rx.recv() => {
                match msg {
                    Some(Control::Flush(done)) => {
                        while let Some(batch) = drain_batch(&shared, max_batch_size) {
                            if batch_tx.send(batch).await.is_err() {
                                break;
                            }
                        }
                        let _ = done.send(());
                    }
                    Some(Control::Shutdown(done)) => {
                        // Drain in the same chunk size ordinary size-triggered
                        // flushes would have used, so a shutdown that catches
                        // a large backlog still produces the batch counts a
                        // running system would have, rather than one
                        // maximally-sized final batch.
                        let shutdown_chunk = max_batch_size.min(flush_at.max(1));
                        while let Some(batch) = drain_batch(&shared, shutdown_chunk) {
                            if batch_tx.send(batch).await.is_err() {
                                break;
                            }
                        }
                        let undrained = shared.buffer.lock().unwrap().len();
                        let _ = done.send(ShutdownOutcome { undrained });
                        return;
                    }
                    None => return,
                }
            }
        }
    }
}
