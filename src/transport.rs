//! `RestTransport`: the abstraction the dispatcher submits batches through,
//! swappable for testing.
//!
//! In the spirit of `opentelemetry_http::HttpClient` — "a minimal interface
//! necessary for export spans over HTTP... allows users to bring their
//! choice of http clients" — generalized here to cover the ingestion,
//! score, and health endpoints this crate needs, with a `reqwest`-backed
//! default implementation the way `impl HttpClient for reqwest::Client`
//! serves as that trait's default.

use crate::config::Config;
use crate::model::ScoreCreate;
use crate::wire::{ApiErrorBody, IngestionBatchRequest, IngestionResponse};
use crate::LangfuseError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

/// The subset of the Langfuse public API the dispatcher and coordinator
/// need. Implementors only need to honor the documented HTTP semantics —
/// the default [`ReqwestTransport`] is not the only valid one.
#[async_trait]
pub trait RestTransport: Debug + Send + Sync {
    /// `POST /api/public/ingestion`.
    async fn ingest(&self, request: &IngestionBatchRequest) -> Result<IngestionResponse, LangfuseError>;

    /// `POST /api/public/scores`.
    async fn score(&self, score: &ScoreCreate) -> Result<(), LangfuseError>;

    /// `GET /api/public/health`.
    async fn health(&self) -> Result<(), LangfuseError>;
}

/// Default [`RestTransport`] backed by `reqwest`.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    ingestion_url: Url,
    score_url: Url,
    health_url: Url,
    auth_header: String,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self, LangfuseError> {
        let public_key = config
            .public_key
            .as_deref()
            .ok_or_else(|| LangfuseError::Configuration("missing LANGFUSE_PUBLIC_KEY".into()))?;
        let secret_key = config
            .secret_key
            .as_deref()
            .ok_or_else(|| LangfuseError::Configuration("missing LANGFUSE_SECRET_KEY".into()))?;

        let base = Url::parse(&config.host)?;
        let ingestion_url = base.join("/api/public/ingestion")?;
        let score_url = base.join("/api/public/scores")?;
        let health_url = base.join("/api/public/health")?;

        let credentials = format!("{public_key}:{secret_key}");
        let auth_header = format!("Basic {}", BASE64.encode(credentials));
        let user_agent = format!("{}/{}", config.sdk_name, config.sdk_version);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(LangfuseError::from)?;

        Ok(ReqwestTransport {
            client,
            ingestion_url,
            score_url,
            health_url,
            auth_header,
            user_agent,
        })
    }

    async fn error_from_response(resp: reqwest::Response) -> LangfuseError {
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body: ApiErrorBody = resp.json().await.unwrap_or_default();
        if status == 429 {
            LangfuseError::RateLimited { retry_after }
        } else {
            LangfuseError::from_status(status, body.message)
        }
    }
}

#[async_trait]
impl RestTransport for ReqwestTransport {
    async fn ingest(&self, request: &IngestionBatchRequest) -> Result<IngestionResponse, LangfuseError> {
        let resp = self
            .client
            .post(self.ingestion_url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(request)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(resp.json::<IngestionResponse>().await?)
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    async fn score(&self, score: &ScoreCreate) -> Result<(), LangfuseError> {
        let resp = self
            .client
            .post(self.score_url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(score)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }

    async fn health(&self) -> Result<(), LangfuseError> {
        let resp = self
            .client
            .get(self.health_url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(resp).await)
        }
    }
}
