//! The batch dispatcher: serializes batches, submits them over
//! `RestTransport`, and drives retry/backoff.
//!
//! The retry loop follows `opentelemetry-otlp::retry::retry_with_backoff`
//! almost exactly — same `min(max, base * 2^n)` backoff with jitter, same
//! three-way error classification (non-retryable / retryable /
//! throttled-with-server-hint) — generalized from "retry one gRPC/HTTP
//! call" to "retry one batch POST".

use crate::config::Config;
use crate::queue::Batch;
use crate::stats::Stats;
use crate::transport::RestTransport;
use crate::wire::{IngestionBatchMetadata, IngestionBatchRequest, IngestionEvent};
use crate::LangfuseError;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Invoked after every batch submission attempt completes (successfully or
/// not) — an `OnFlushEnd(batchSize, success, err)` hook.
pub type FlushEndHook = Arc<dyn Fn(usize, bool, Option<&LangfuseError>) + Send + Sync>;

pub struct Dispatcher {
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish()
    }
}

impl Dispatcher {
    /// Spawns the background consumer that drains `batch_rx` and submits
    /// each batch, applying `config`'s retry policy.
    pub fn spawn(
        config: Arc<Config>,
        transport: Arc<dyn RestTransport>,
        stats: Arc<Stats>,
        mut batch_rx: mpsc::Receiver<Batch>,
        on_flush_end: Option<FlushEndHook>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                let size = batch.len();
                let result = submit_with_retry(&config, transport.as_ref(), batch).await;
                match &result {
                    Ok(submitted) => {
                        stats.record_submitted(*submitted as u64);
                        if *submitted < size {
                            stats.record_failed((size - submitted) as u64);
                        }
                    }
                    Err(_) => stats.record_failed(size as u64),
                }
                if let Some(hook) = &on_flush_end {
                    hook(size, result.is_ok(), result.as_ref().err());
                }
            }
        });

        Dispatcher {
            worker: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    /// Waits for the worker task to drain and exit (used by
    /// `Client::shutdown` once the queue side has closed `batch_tx`).
    pub async fn join(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Submits `batch`, retrying whole-batch failures per `config`'s retry
/// policy. Returns the number of events the server accepted (partial-batch
/// per-event failures are recorded by the caller via the response body, not
/// requeued — an at-most-once contract).
async fn submit_with_retry(
    config: &Config,
    transport: &dyn RestTransport,
    batch: Batch,
) -> Result<usize, LangfuseError> {
    let now = Utc::now();
    let events: Vec<IngestionEvent> = batch
        .iter()
        .filter_map(|event| match IngestionEvent::from_event(event, now) {
            Ok(wire_event) => Some(wire_event),
            Err(err) => {
                tracing::warn!(error = %err, "langfuse: failed to serialize event, dropping from batch");
                None
            }
        })
        .collect();

    let request = IngestionBatchRequest {
        batch: events,
        metadata: IngestionBatchMetadata {
            sdk_version: config.sdk_version.clone(),
            sdk_integration: config.sdk_integration().to_string(),
            client_id: config.client_id.clone(),
            timestamp: now,
        },
    };

    let mut attempt = 0usize;
    let mut delay = config.retry_backoff_base;

    loop {
        match transport.ingest(&request).await {
            Ok(response) => {
                for err in &response.errors {
                    tracing::warn!(
                        event_id = %err.id,
                        status = err.status,
                        message = %err.message,
                        "langfuse: server rejected individual event in batch"
                    );
                }
                let failed = response.errors.len();
                return Ok(request.batch.len().saturating_sub(failed));
            }
            Err(err) => {
                if !err.is_retryable() || attempt + 1 >= config.retry_count {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        "langfuse: batch submission failed, giving up"
                    );
                    return Err(err);
                }

                attempt += 1;
                let wait = err.retry_after().unwrap_or_else(|| {
                    let jitter_frac: f64 = rand::rng().random_range(-0.25..=0.25);
                    let base = delay.as_millis() as f64 * (1.0 + jitter_frac);
                    let capped = base.max(0.0).min(config.retry_backoff_max.as_millis() as f64);
                    Duration::from_millis(capped as u64)
                });

                tracing::info!(attempt, delay_ms = wait.as_millis() as u64, error = %err, "langfuse: retrying batch submission");
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(config.retry_backoff_max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::model::{Event, TraceCreate};
    use crate::testing::RecordingTransport;
    use chrono::Utc;

    fn sample_batch() -> Batch {
        vec![Event::TraceCreate(TraceCreate {
            id: "traceid1234567890".into(),
            name: "t".into(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            input: None,
            output: None,
            metadata: None,
            tags: None,
            version: None,
            release: None,
            public: None,
        })]
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_200() {
        let transport = RecordingTransport::new();
        let config = ConfigBuilder::new().retry_count(3).build();
        let submitted = submit_with_retry(&config, &transport, sample_batch())
            .await
            .unwrap();
        assert_eq!(submitted, 1);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn retries_retryable_failures_then_succeeds() {
        let transport = RecordingTransport::new();
        transport.fail_next_n_with_status(2, 503);
        let config = ConfigBuilder::new()
            .retry_count(3)
            .retry_backoff(Duration::from_millis(1), Duration::from_millis(5))
            .build();
        let submitted = submit_with_retry(&config, &transport, sample_batch())
            .await
            .unwrap();
        assert_eq!(submitted, 1);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_failure() {
        let transport = RecordingTransport::new();
        transport.fail_next_n_with_status(1, 400);
        let config = ConfigBuilder::new().retry_count(3).build();
        let result = submit_with_retry(&config, &transport, sample_batch()).await;
        assert!(result.is_err());
        assert_eq!(transport.call_count(), 1);
    }
}
