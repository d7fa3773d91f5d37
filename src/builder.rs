//! The fluent builder surface: `TraceBuilder`, `SpanBuilder`,
//! `GenerationBuilder`, and an `EventBuilder` for the `Event` observation
//! kind.
//!
//! Structured like `opentelemetry_sdk::trace::SpanBuilder`: a plain draft
//! struct filled in by chained `with_*` calls, consumed by a terminal
//! operation (there, `.start(&tracer)`; here, `submit`/`update`/`end`).
//! Builders here hold `&mut self` mutators instead of consuming `self` per
//! call, since the idempotence contract requires the *same* instance to
//! still exist for a second terminal call to fail against.

use crate::client::Inner;
use crate::error::Result;
use crate::id::{new_id, IdKind};
use crate::model::{
    validate_observation_create, validate_observation_update, validate_trace_create,
    validate_trace_update, Event, ObservationCreate, ObservationKind, ObservationLevel,
    ObservationUpdate, TraceCreate, TraceUpdate, Usage,
};
use crate::LangfuseError;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Fields common to every observation builder (Span, Generation, Event).
/// Factored out because the three share every field but `kind` and the
/// generation-only extras, the same way `SpanData` is one plain struct
/// reused by every span regardless of `SpanKind`.
struct ObservationDraft {
    id: String,
    trace_id: String,
    parent_observation_id: Option<String>,
    name: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    input: Option<JsonValue>,
    output: Option<JsonValue>,
    metadata: Option<JsonValue>,
    level: ObservationLevel,
    status_message: Option<String>,
    version: Option<String>,
}

impl ObservationDraft {
    fn new(trace_id: impl Into<String>, parent_observation_id: Option<String>, name: impl Into<String>) -> Self {
        ObservationDraft {
            id: new_id(IdKind::Observation),
            trace_id: trace_id.into(),
            parent_observation_id,
            name: name.into(),
            start_time: Utc::now(),
            end_time: None,
            input: None,
            output: None,
            metadata: None,
            level: ObservationLevel::default(),
            status_message: None,
            version: None,
        }
    }

    fn create(&self, kind: ObservationKind) -> ObservationCreate {
        ObservationCreate {
            id: self.id.clone(),
            trace_id: self.trace_id.clone(),
            kind,
            name: self.name.clone(),
            start_time: self.start_time,
            parent_observation_id: self.parent_observation_id.clone(),
            end_time: self.end_time,
            input: self.input.clone(),
            output: self.output.clone(),
            metadata: self.metadata.clone(),
            level: self.level,
            status_message: self.status_message.clone(),
            version: self.version.clone(),
            model: None,
            model_parameters: None,
            completion_start_time: None,
            usage: None,
        }
    }

    fn update(&self, kind: ObservationKind) -> ObservationUpdate {
        ObservationUpdate {
            id: self.id.clone(),
            trace_id: self.trace_id.clone(),
            kind,
            name: Some(self.name.clone()),
            start_time: Some(self.start_time),
            parent_observation_id: self.parent_observation_id.clone(),
            end_time: self.end_time,
            input: self.input.clone(),
            output: self.output.clone(),
            metadata: self.metadata.clone(),
            level: Some(self.level),
            status_message: self.status_message.clone(),
            version: self.version.clone(),
            model: None,
            model_parameters: None,
            completion_start_time: None,
            usage: None,
        }
    }
}

/// Builds and enqueues a `TraceCreate`/`TraceUpdate` record.
pub struct TraceBuilder {
    inner: Arc<Inner>,
    id: String,
    name: String,
    timestamp: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    user_id: Option<String>,
    session_id: Option<String>,
    input: Option<JsonValue>,
    output: Option<JsonValue>,
    metadata: Option<JsonValue>,
    tags: Option<Vec<String>>,
    version: Option<String>,
    release: Option<String>,
    public: Option<bool>,
    created: bool,
    finalized: bool,
}

impl TraceBuilder {
    pub(crate) fn new(inner: Arc<Inner>, name: impl Into<String>) -> Self {
        let release = inner.config().release.clone();
        TraceBuilder {
            inner,
            id: new_id(IdKind::Trace),
            name: name.into(),
            timestamp: Utc::now(),
            end_time: None,
            user_id: None,
            session_id: None,
            input: None,
            output: None,
            metadata: None,
            tags: None,
            version: None,
            release,
            public: None,
            created: false,
            finalized: false,
        }
    }

    /// The pre-generated id this trace will be submitted under.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&mut self, v: impl Into<String>) -> &mut Self {
        if !self.finalized {
            self.user_id = Some(v.into());
        }
        self
    }

    pub fn session_id(&mut self, v: impl Into<String>) -> &mut Self {
        if !self.finalized {
            self.session_id = Some(v.into());
        }
        self
    }

    pub fn input(&mut self, v: JsonValue) -> &mut Self {
        if !self.finalized {
            self.input = Some(v);
        }
        self
    }

    pub fn output(&mut self, v: JsonValue) -> &mut Self {
        if !self.finalized {
            self.output = Some(v);
        }
        self
    }

    pub fn metadata(&mut self, v: JsonValue) -> &mut Self {
        if !self.finalized {
            self.metadata = Some(v);
        }
        self
    }

    pub fn tags(&mut self, v: Vec<String>) -> &mut Self {
        if !self.finalized {
            self.tags = Some(v);
        }
        self
    }

    pub fn version(&mut self, v: impl Into<String>) -> &mut Self {
        if !self.finalized {
            self.version = Some(v.into());
        }
        self
    }

    pub fn public(&mut self, v: bool) -> &mut Self {
        if !self.finalized {
            self.public = Some(v);
        }
        self
    }

    fn as_create(&self) -> TraceCreate {
        TraceCreate {
            id: self.id.clone(),
            name: self.name.clone(),
            timestamp: self.timestamp,
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            metadata: self.metadata.clone(),
            tags: self.tags.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
            public: self.public,
        }
    }

    fn as_update(&self) -> TraceUpdate {
        TraceUpdate {
            id: self.id.clone(),
            timestamp: self.timestamp,
            name: Some(self.name.clone()),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            metadata: self.metadata.clone(),
            tags: self.tags.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
            public: self.public,
            end_time: self.end_time,
        }
    }

    /// Validates and enqueues a `trace-create` event. May be followed by a
    /// single [`TraceBuilder::update`]/[`TraceBuilder::end`] call; calling
    /// `submit` itself a second time fails.
    pub async fn submit(&mut self) -> Result<()> {
        if self.created {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.as_create();
        validate_trace_create(&record)?;
        self.inner.enqueue(Event::TraceCreate(record)).await?;
        self.inner.stats().record_trace_created();
        self.created = true;
        Ok(())
    }

    /// Validates and enqueues a `trace-update` event, without touching
    /// `endTime`. Valid whether or not [`TraceBuilder::submit`] was called
    /// first; a second `update`/`end` call fails.
    pub async fn update(&mut self) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.as_update();
        validate_trace_update(&record)?;
        self.inner.enqueue(Event::TraceUpdate(record)).await?;
        self.finalized = true;
        Ok(())
    }

    /// Sets `endTime` to now, then behaves like [`TraceBuilder::update`].
    pub async fn end(&mut self) -> Result<()> {
        self.end_at(Utc::now()).await
    }

    pub async fn end_at(&mut self, end_time: DateTime<Utc>) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        self.end_time = Some(end_time);
        self.update().await
    }

    /// Starts a span rooted at this trace.
    pub fn span(&self, name: impl Into<String>) -> SpanBuilder {
        SpanBuilder::new(Arc::clone(&self.inner), self.id.clone(), None, name)
    }

    /// Starts a generation rooted at this trace.
    pub fn generation(&self, name: impl Into<String>) -> GenerationBuilder {
        GenerationBuilder::new(Arc::clone(&self.inner), self.id.clone(), None, name)
    }

    /// Starts an event rooted at this trace.
    pub fn event(&self, name: impl Into<String>) -> EventBuilder {
        EventBuilder::new(Arc::clone(&self.inner), self.id.clone(), None, name)
    }
}

macro_rules! observation_setters {
    () => {
        pub fn input(&mut self, v: JsonValue) -> &mut Self {
            if !self.finalized {
                self.draft.input = Some(v);
            }
            self
        }

        pub fn output(&mut self, v: JsonValue) -> &mut Self {
            if !self.finalized {
                self.draft.output = Some(v);
            }
            self
        }

        pub fn metadata(&mut self, v: JsonValue) -> &mut Self {
            if !self.finalized {
                self.draft.metadata = Some(v);
            }
            self
        }

        pub fn level(&mut self, v: ObservationLevel) -> &mut Self {
            if !self.finalized {
                self.draft.level = v;
            }
            self
        }

        pub fn status_message(&mut self, v: impl Into<String>) -> &mut Self {
            if !self.finalized {
                self.draft.status_message = Some(v.into());
            }
            self
        }

        pub fn version(&mut self, v: impl Into<String>) -> &mut Self {
            if !self.finalized {
                self.draft.version = Some(v.into());
            }
            self
        }

        /// The pre-generated id this observation will be submitted under.
        pub fn id(&self) -> &str {
            &self.draft.id
        }

        pub fn trace_id(&self) -> &str {
            &self.draft.trace_id
        }
    };
}

macro_rules! observation_children {
    () => {
        pub fn child_span(&self, name: impl Into<String>) -> SpanBuilder {
            SpanBuilder::new(
                Arc::clone(&self.inner),
                self.draft.trace_id.clone(),
                Some(self.draft.id.clone()),
                name,
            )
        }

        pub fn child_generation(&self, name: impl Into<String>) -> GenerationBuilder {
            GenerationBuilder::new(
                Arc::clone(&self.inner),
                self.draft.trace_id.clone(),
                Some(self.draft.id.clone()),
                name,
            )
        }

        pub fn child_event(&self, name: impl Into<String>) -> EventBuilder {
            EventBuilder::new(
                Arc::clone(&self.inner),
                self.draft.trace_id.clone(),
                Some(self.draft.id.clone()),
                name,
            )
        }
    };
}

/// Builds and enqueues a Span observation.
pub struct SpanBuilder {
    inner: Arc<Inner>,
    draft: ObservationDraft,
    created: bool,
    finalized: bool,
}

impl SpanBuilder {
    pub(crate) fn new(
        inner: Arc<Inner>,
        trace_id: impl Into<String>,
        parent_observation_id: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        SpanBuilder {
            inner,
            draft: ObservationDraft::new(trace_id, parent_observation_id, name),
            created: false,
            finalized: false,
        }
    }

    observation_setters!();
    observation_children!();

    /// Validates and enqueues a `span-create` event. May be followed by a
    /// single [`SpanBuilder::update`]/[`SpanBuilder::end`] call; calling
    /// `submit` itself a second time fails.
    pub async fn submit(&mut self) -> Result<()> {
        if self.created {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.draft.create(ObservationKind::Span);
        validate_observation_create(&record)?;
        self.inner.enqueue(Event::ObservationCreate(record)).await?;
        self.inner.stats().record_span_created();
        self.created = true;
        Ok(())
    }

    /// Valid whether or not [`SpanBuilder::submit`] was called first; a
    /// second `update`/`end` call fails.
    pub async fn update(&mut self) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.draft.update(ObservationKind::Span);
        validate_observation_update(&record)?;
        self.inner.enqueue(Event::ObservationUpdate(record)).await?;
        self.finalized = true;
        Ok(())
    }

    pub async fn end(&mut self) -> Result<()> {
        self.end_at(Utc::now()).await
    }

    pub async fn end_at(&mut self, end_time: DateTime<Utc>) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        self.draft.end_time = Some(end_time);
        self.update().await
    }
}

/// Builds and enqueues a Generation observation (an LLM call).
pub struct GenerationBuilder {
    inner: Arc<Inner>,
    draft: ObservationDraft,
    model: Option<String>,
    model_parameters: Option<JsonValue>,
    completion_start_time: Option<DateTime<Utc>>,
    usage: Option<Usage>,
    created: bool,
    finalized: bool,
}

impl GenerationBuilder {
    pub(crate) fn new(
        inner: Arc<Inner>,
        trace_id: impl Into<String>,
        parent_observation_id: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        GenerationBuilder {
            inner,
            draft: ObservationDraft::new(trace_id, parent_observation_id, name),
            model: None,
            model_parameters: None,
            completion_start_time: None,
            usage: None,
            created: false,
            finalized: false,
        }
    }

    observation_setters!();
    observation_children!();

    pub fn model(&mut self, v: impl Into<String>) -> &mut Self {
        if !self.finalized {
            self.model = Some(v.into());
        }
        self
    }

    pub fn model_parameters(&mut self, v: JsonValue) -> &mut Self {
        if !self.finalized {
            self.model_parameters = Some(v);
        }
        self
    }

    pub fn completion_start_time(&mut self, v: DateTime<Utc>) -> &mut Self {
        if !self.finalized {
            self.completion_start_time = Some(v);
        }
        self
    }

    pub fn usage(&mut self, input: Option<u64>, output: Option<u64>, total: Option<u64>) -> &mut Self {
        if !self.finalized {
            self.usage = Some(Usage { input, output, total });
        }
        self
    }

    fn fill_generation_create(&self, mut record: ObservationCreate) -> ObservationCreate {
        record.model = self.model.clone();
        record.model_parameters = self.model_parameters.clone();
        record.completion_start_time = self.completion_start_time;
        record.usage = self.usage.clone();
        record
    }

    fn fill_generation_update(&self, mut record: ObservationUpdate) -> ObservationUpdate {
        record.model = self.model.clone();
        record.model_parameters = self.model_parameters.clone();
        record.completion_start_time = self.completion_start_time;
        record.usage = self.usage.clone();
        record
    }

    /// Validates and enqueues a `generation-create` event. May be followed
    /// by a single [`GenerationBuilder::update`]/[`GenerationBuilder::end`]
    /// call; calling `submit` itself a second time fails.
    pub async fn submit(&mut self) -> Result<()> {
        if self.created {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.fill_generation_create(self.draft.create(ObservationKind::Generation));
        validate_observation_create(&record)?;
        self.inner.enqueue(Event::ObservationCreate(record)).await?;
        self.inner.stats().record_generation_created();
        self.created = true;
        Ok(())
    }

    /// Valid whether or not [`GenerationBuilder::submit`] was called first;
    /// a second `update`/`end` call fails.
    pub async fn update(&mut self) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.fill_generation_update(self.draft.update(ObservationKind::Generation));
        validate_observation_update(&record)?;
        self.inner.enqueue(Event::ObservationUpdate(record)).await?;
        self.finalized = true;
        Ok(())
    }

    pub async fn end(&mut self) -> Result<()> {
        self.end_at(Utc::now()).await
    }

    pub async fn end_at(&mut self, end_time: DateTime<Utc>) -> Result<()> {
        if self.finalized {
            return Err(LangfuseError::AlreadySubmitted);
        }
        self.draft.end_time = Some(end_time);
        self.update().await
    }
}

/// Builds and enqueues an Event observation: an instantaneous marker with
/// no `End()` transition, since it has no duration to close.
pub struct EventBuilder {
    inner: Arc<Inner>,
    draft: ObservationDraft,
    submitted: bool,
}

impl EventBuilder {
    pub(crate) fn new(
        inner: Arc<Inner>,
        trace_id: impl Into<String>,
        parent_observation_id: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        EventBuilder {
            inner,
            draft: ObservationDraft::new(trace_id, parent_observation_id, name),
            submitted: false,
        }
    }

    observation_setters!();
    observation_children!();

    pub async fn submit(&mut self) -> Result<()> {
        if self.submitted {
            return Err(LangfuseError::AlreadySubmitted);
        }
        let record = self.draft.create(ObservationKind::Event);
        validate_observation_create(&record)?;
        self.inner.enqueue(Event::ObservationCreate(record)).await?;
        self.submitted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::testing::RecordingTransport;
    use std::sync::Arc;

    async fn test_client() -> (Client, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder()
            .credentials("pk", "sk")
            .transport(Arc::clone(&transport) as Arc<dyn crate::transport::RestTransport>)
            .flush_at(100)
            .build()
            .unwrap();
        (client, transport)
    }

    #[tokio::test]
    async fn second_end_call_is_already_submitted() {
        let (client, transport) = test_client().await;
        let mut span = client.trace("t").span("s1");
        assert!(span.end().await.is_ok());
        assert!(matches!(span.end().await, Err(LangfuseError::AlreadySubmitted)));
        client.flush(std::time::Duration::from_secs(1)).await.unwrap();
        assert_eq!(transport.total_events_received(), 1);
    }

    #[tokio::test]
    async fn child_span_inherits_trace_and_links_parent() {
        let (client, _transport) = test_client().await;
        let trace = client.trace("t");
        let mut a = trace.span("a");
        a.submit().await.unwrap();
        let b = a.child_span("b");
        assert_eq!(b.trace_id(), trace.id());
        assert_eq!(b.trace_id(), a.trace_id());
    }

    #[tokio::test]
    async fn generation_end_before_start_fails_validation() {
        let (client, _transport) = test_client().await;
        let mut gen = client.trace("t").generation("g");
        gen.model("gpt");
        let err = gen.end_at(Utc::now() - chrono::Duration::seconds(10)).await.unwrap_err();
        match err {
            LangfuseError::Validation { field, .. } => assert_eq!(field, "endTime"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_then_end_enqueues_both_create_and_update() {
        let (client, transport) = test_client().await;
        let mut trace = client.trace("t");
        trace.submit().await.unwrap();
        trace.end().await.unwrap();
        assert!(matches!(trace.submit().await, Err(LangfuseError::AlreadySubmitted)));
        assert!(matches!(trace.end().await, Err(LangfuseError::AlreadySubmitted)));

        let mut span = client.trace("t2").span("s");
        span.submit().await.unwrap();
        span.end().await.unwrap();

        let mut gen = client.trace("t3").generation("g");
        gen.submit().await.unwrap();
        gen.end().await.unwrap();

        client.flush(std::time::Duration::from_secs(1)).await.unwrap();
        assert_eq!(transport.total_events_received(), 6);
    }
}
