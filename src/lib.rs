//! Async ingestion client for the Langfuse LLM-tracing backend.
//!
//! The crate is organized the way `opentelemetry-sdk` splits its trace
//! pipeline: a record model (`model`), a builder surface
//! (`builder`), a bounded buffer (`queue`), a batch submitter (`dispatcher`),
//! a pluggable transport (`transport`), and a top-level facade (`client`)
//! that wires the rest together.
//!
//! ```no_run
//! use langfuse_sdk::Client;
//!
//! # async fn run() -> Result<(), langfuse_sdk::LangfuseError> {
//! let client = Client::builder()
//!     .credentials("pk-lf-...", "sk-lf-...")
//!     .build()?;
//!
//! let mut trace = client.trace("checkout");
//! trace.submit().await?;
//!
//! let mut generation = trace.generation("summarize-cart");
//! generation.model("gpt-4o-mini");
//! generation.submit().await?;
//! generation.end().await?;
//!
//! trace.end().await?;
//! client.flush(std::time::Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod client;
mod config;
mod dispatcher;
mod error;
mod id;
mod model;
mod queue;
mod stats;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transport;
mod wire;

pub use builder::{EventBuilder, GenerationBuilder, SpanBuilder, TraceBuilder};
pub use client::{Client, ClientBuilder};
pub use config::Config;
pub use error::{LangfuseError, Result};
pub use id::{new_id, validate_id, IdKind};
pub use model::{
    validate_observation_create, validate_observation_update, validate_score_create,
    validate_trace_create, validate_trace_update, ObservationCreate, ObservationKind,
    ObservationLevel, ObservationUpdate, ScoreCreate, ScoreDataType, ScoreValue, TraceCreate,
    TraceUpdate, Usage,
};
pub use queue::OverflowPolicy;
pub use stats::StatsSnapshot;
pub use transport::{ReqwestTransport, RestTransport};
