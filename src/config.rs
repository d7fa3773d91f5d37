//! Configuration surface. Loading from the environment follows the same
//! ambient-plumbing approach as `OTEL_BSP_*`/`OTEL_EXPORTER_OTLP_*`
//! env-var resolution in `BatchConfig::default()` and
//! `exporter::http::resolve_endpoint`.

use crate::queue::OverflowPolicy;
use std::env;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://cloud.langfuse.com";
pub const SDK_NAME: &str = env!("CARGO_PKG_NAME");
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
const SDK_INTEGRATION: &str = "rust";

const ENV_PUBLIC_KEY: &str = "LANGFUSE_PUBLIC_KEY";
const ENV_SECRET_KEY: &str = "LANGFUSE_SECRET_KEY";
const ENV_HOST: &str = "LANGFUSE_HOST";

/// Resolved configuration for a [`crate::Client`]. Read-only after
/// construction — mutating it after the client is built has no effect,
/// the same contract `BatchConfig` gives its own callers.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub enabled: bool,
    pub flush_at: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
    pub max_batch_size: usize,
    pub overflow_policy: OverflowPolicy,
    pub retry_count: usize,
    pub retry_backoff_base: Duration,
    pub retry_backoff_max: Duration,
    pub request_timeout: Duration,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub sdk_name: String,
    pub sdk_version: String,
    pub client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: env::var(ENV_HOST).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            public_key: env::var(ENV_PUBLIC_KEY).ok(),
            secret_key: env::var(ENV_SECRET_KEY).ok(),
            enabled: true,
            flush_at: 15,
            flush_interval: Duration::from_secs(10),
            max_queue_size: 1000,
            max_batch_size: 1000,
            overflow_policy: OverflowPolicy::DropNewest,
            retry_count: 3,
            retry_backoff_base: Duration::from_secs(1),
            retry_backoff_max: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            environment: None,
            release: None,
            sdk_name: SDK_NAME.to_string(),
            sdk_version: SDK_VERSION.to_string(),
            client_id: crate::id::new_id(crate::id::IdKind::Trace),
        }
    }
}

impl Config {
    pub fn sdk_integration(&self) -> &'static str {
        SDK_INTEGRATION
    }

    /// `true` once both API keys are present — the only thing construction
    /// requires when `enabled` is true.
    pub fn has_credentials(&self) -> bool {
        self.public_key.is_some() && self.secret_key.is_some()
    }
}

/// Fluent builder for [`Config`], in the style of `BatchConfig`'s
/// `with_*`-returning-`Self` builder. Programmatic setters always take
/// precedence over whatever [`Config::default`] picked up from the
/// environment.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn credentials(mut self, public_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.public_key = Some(public_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    pub fn flush_at(mut self, n: usize) -> Self {
        self.config.flush_at = n;
        self
    }

    pub fn flush_interval(mut self, d: Duration) -> Self {
        self.config.flush_interval = d;
        self
    }

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.config.max_queue_size = n;
        self
    }

    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.config.max_batch_size = n;
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    pub fn retry_count(mut self, n: usize) -> Self {
        self.config.retry_count = n;
        self
    }

    pub fn retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.retry_backoff_base = base;
        self.config.retry_backoff_max = max;
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.config.request_timeout = d;
        self
    }

    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.config.environment = Some(env.into());
        self
    }

    pub fn release(mut self, release: impl Into<String>) -> Self {
        self.config.release = Some(release.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
