//! The top-level façade applications hold.
//!
//! Structured like `TracerProvider`/`SdkTracerProvider`: owns the processor
//! (here, the queue), the exporter (here, the dispatcher + transport), and
//! is the thing `shutdown()` is called on once at the end of a program's
//! life. Disabled mode mirrors `opentelemetry::global`'s no-op default
//! tracer provider — rather than a null client reference, the `Inner` the
//! builders hold simply has no queue, so every enqueue is a free no-op.

use crate::builder::{GenerationBuilder, SpanBuilder, TraceBuilder};
use crate::config::{Config, ConfigBuilder};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::id::{new_id, IdKind};
use crate::model::{validate_score_create, Event, ScoreCreate};
use crate::queue::{IngestionQueue, OverflowPolicy};
use crate::stats::{Stats, StatsSnapshot};
use crate::transport::{ReqwestTransport, RestTransport};
use crate::LangfuseError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared state behind every `Client` handle and every builder it spawns.
/// Builders only ever see this through an `Arc`, the way a `Span` holds a
/// cheaply-cloned `Tracer` back to its provider.
pub(crate) struct Inner {
    config: Arc<Config>,
    queue: Option<Arc<IngestionQueue>>,
    dispatcher: Option<Dispatcher>,
    transport: Option<Arc<dyn RestTransport>>,
    stats: Arc<Stats>,
}

impl Inner {
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Hands `event` to the queue, or silently drops it when disabled.
    pub(crate) async fn enqueue(&self, event: Event) -> Result<()> {
        match &self.queue {
            Some(queue) => queue.enqueue(event).await,
            None => Ok(()),
        }
    }
}

/// The number of in-flight batches the queue worker may hand the
/// dispatcher before it has to wait — sized the same conservative way as
/// `BatchConfig::max_export_batch_size`, kept small since a single batch
/// can itself carry `maxBatchSize` events.
const DISPATCH_CHANNEL_CAPACITY: usize = 8;

/// Top-level client handle. Cheap to clone; every clone shares the same
/// queue, dispatcher, and stats.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("enabled", &self.inner.config.enabled)
            .finish()
    }
}

impl Client {
    /// Starts building a `Client` with defaults drawn from the environment
    /// (the `LANGFUSE_*` variables), overridable programmatically.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Begins a new trace rooted at a freshly generated id.
    pub fn trace(&self, name: impl Into<String>) -> TraceBuilder {
        TraceBuilder::new(Arc::clone(&self.inner), name)
    }

    /// Begins a span with no explicit parent trace. A fresh trace id is
    /// generated to anchor it, matching how the upstream SDKs let a span
    /// implicitly create the trace it belongs to server-side.
    pub fn span(&self, name: impl Into<String>) -> SpanBuilder {
        SpanBuilder::new(Arc::clone(&self.inner), new_id(IdKind::Trace), None, name)
    }

    /// Begins a generation with no explicit parent trace, as [`Client::span`].
    pub fn generation(&self, name: impl Into<String>) -> GenerationBuilder {
        GenerationBuilder::new(Arc::clone(&self.inner), new_id(IdKind::Trace), None, name)
    }

    /// Validates and submits `score` synchronously via `RestTransport`,
    /// bypassing the async queue entirely.
    pub async fn score(&self, score: ScoreCreate) -> Result<()> {
        validate_score_create(&score)?;
        match &self.inner.transport {
            Some(transport) => transport.score(&score).await,
            None => Ok(()),
        }
    }

    /// Forces assembly and hand-off of all currently buffered events,
    /// waiting up to `deadline`.
    pub async fn flush(&self, deadline: Duration) -> Result<()> {
        match &self.inner.queue {
            Some(queue) => tokio::time::timeout(deadline, queue.flush())
                .await
                .map_err(|_| LangfuseError::Cancelled)?,
            None => Ok(()),
        }
    }

    /// Rejects further enqueues, drains the queue into the dispatcher, and
    /// waits for the dispatcher to finish submitting whatever it drained —
    /// the queue-then-dispatcher-then-transport order the pipeline follows.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        let queue = match &self.inner.queue {
            Some(queue) => queue,
            None => return Ok(()),
        };

        let outcome = queue.shutdown(deadline).await?;
        if let Some(dispatcher) = &self.inner.dispatcher {
            dispatcher.join().await;
        }
        if outcome.undrained > 0 {
            tracing::warn!(undrained = outcome.undrained, "langfuse: shutdown left events undrained");
            self.inner.stats.record_failed(outcome.undrained as u64);
        }
        Ok(())
    }

    /// `GET /api/public/health`.
    pub async fn health_check(&self) -> Result<()> {
        match &self.inner.transport {
            Some(transport) => transport.health().await,
            None => Ok(()),
        }
    }

    /// A consistent snapshot of the monotonic counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// `false` once the SDK has been configured with `enabled(false)`.
    pub fn is_enabled(&self) -> bool {
        self.inner.queue.is_some()
    }
}

/// Builder for [`Client`], wrapping [`ConfigBuilder`] with the ability to
/// swap in a test [`RestTransport`] — the same seam a `SpanExporter` trait
/// object gives `TracerProvider::builder().with_exporter`.
pub struct ClientBuilder {
    config: ConfigBuilder,
    transport_override: Option<Arc<dyn RestTransport>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        ClientBuilder {
            config: ConfigBuilder::new(),
            transport_override: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config = self.config.host(host);
        self
    }

    pub fn credentials(mut self, public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config = self.config.credentials(public_key, secret_key);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config = self.config.enabled(enabled);
        self
    }

    pub fn flush_at(mut self, n: usize) -> Self {
        self.config = self.config.flush_at(n);
        self
    }

    pub fn flush_interval(mut self, d: Duration) -> Self {
        self.config = self.config.flush_interval(d);
        self
    }

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.config = self.config.max_queue_size(n);
        self
    }

    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config = self.config.max_batch_size(n);
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config = self.config.overflow_policy(policy);
        self
    }

    pub fn retry_count(mut self, n: usize) -> Self {
        self.config = self.config.retry_count(n);
        self
    }

    pub fn retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config = self.config.retry_backoff(base, max);
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.config = self.config.request_timeout(d);
        self
    }

    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.config = self.config.environment(env);
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.config = self.config.release(release);
        self
    }

    /// Overrides the default `reqwest`-backed transport, for tests.
    pub fn transport(mut self, transport: Arc<dyn RestTransport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client> {
        let config = self.config.build();
        let stats = Arc::new(Stats::default());

        if !config.enabled {
            tracing::info!("langfuse: client constructed in disabled mode, all operations are no-ops");
            return Ok(Client {
                inner: Arc::new(Inner {
                    config: Arc::new(config),
                    queue: None,
                    dispatcher: None,
                    transport: None,
                    stats,
                }),
            });
        }

        let transport: Arc<dyn RestTransport> = match self.transport_override {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };

        let config = Arc::new(config);
        let (batch_tx, batch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);

        let dispatcher = Dispatcher::spawn(
            Arc::clone(&config),
            Arc::clone(&transport),
            Arc::clone(&stats),
            batch_rx,
            None,
        );

        let queue = Arc::new(IngestionQueue::new(
            config.max_queue_size,
            config.flush_at,
            config.flush_interval,
            config.max_batch_size,
            config.overflow_policy,
            Arc::clone(&stats),
            batch_tx,
        ));

        Ok(Client {
            inner: Arc::new(Inner {
                config,
                queue: Some(queue),
                dispatcher: Some(dispatcher),
                transport: Some(transport),
                stats,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScoreDataType, ScoreValue};
    use crate::testing::RecordingTransport;

    fn recording_client(transport: Arc<dyn RestTransport>) -> Client {
        Client::builder()
            .credentials("pk", "sk")
            .transport(transport)
            .flush_at(2)
            .flush_interval(Duration::from_secs(3600))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn disabled_client_never_calls_transport() {
        let client = Client::builder().enabled(false).build().unwrap();
        assert!(!client.is_enabled());
        for i in 0..1000 {
            let mut trace = client.trace(format!("t{i}"));
            trace.submit().await.unwrap();
            let mut span = trace.span("s");
            span.submit().await.unwrap();
            span.end().await.unwrap();
        }
        client.shutdown(Duration::from_secs(1)).await.unwrap();
        let stats = client.stats();
        assert_eq!(stats.events_enqueued, 0);
    }

    #[tokio::test]
    async fn happy_path_one_batch_four_events() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder()
            .credentials("pk", "sk")
            .transport(Arc::clone(&transport) as Arc<dyn RestTransport>)
            .flush_at(4)
            .flush_interval(Duration::from_secs(3600))
            .build()
            .unwrap();

        let mut trace = client.trace("T");
        trace.submit().await.unwrap();
        let mut span = trace.span("S1");
        span.input(serde_json::json!({"q": "hi"}));
        span.submit().await.unwrap();
        let mut gen = trace.generation("G1");
        gen.model("m").usage(Some(5), Some(7), None);
        gen.submit().await.unwrap();
        gen.end().await.unwrap();
        span.end().await.unwrap();
        trace.end().await.unwrap();

        client.flush(Duration::from_secs(1)).await.unwrap();
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.total_events_received(), 6);
    }

    #[tokio::test]
    async fn score_path_is_synchronous_and_bypasses_queue() {
        let transport = Arc::new(RecordingTransport::new());
        let client = recording_client(Arc::clone(&transport) as Arc<dyn RestTransport>);
        let score = ScoreCreate {
            id: None,
            trace_id: "traceid1234567890".into(),
            observation_id: None,
            name: "accuracy".into(),
            value: ScoreValue::Numeric(0.9),
            data_type: ScoreDataType::Numeric,
            source: None,
            comment: None,
            config_id: None,
            author_user_id: None,
            queue_id: None,
        };
        client.score(score).await.unwrap();
        assert_eq!(transport.total_events_received(), 0);
    }
}
