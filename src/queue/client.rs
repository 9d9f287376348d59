//! HTTP client for the internal run API
//!
//! All traffic is JSON over POST against
//! `{base}/v2/internal/runs/{run_id}{path}` with bearer-token auth. A
//! non-success response surfaces the path, status, and body text so run
//! logs show exactly which call the orchestrator rejected.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::queue::types::{AckOutcome, Bootstrap, EnqueueItem, FailOutcome, LeaseItem, RunEvent};
use crate::queue::QueueService;
use crate::{ConfigError, ConfigResult, QueueError};

/// Environment variables consulted per setting, first non-empty wins
const BASE_URL_VARS: [&str; 2] = ["LEAFCUTTER_API_BASE_URL", "INTERNAL_API_BASE_URL"];
const RUN_ID_VARS: [&str; 2] = ["LEAFCUTTER_RUN_ID", "RUN_ID"];
const RUN_TOKEN_VARS: [&str; 2] = ["LEAFCUTTER_RUN_TOKEN", "RUN_TOKEN"];

const DEFAULT_BASE_URL: &str = "http://host.docker.internal:8000";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the internal run API
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub base_url: String,
    pub run_id: String,
    pub token: Option<String>,
}

impl QueueConfig {
    /// Read connection settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] when no run id is set.
    pub fn from_env() -> ConfigResult<Self> {
        let base_url = env_any(&BASE_URL_VARS).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let run_id = env_any(&RUN_ID_VARS).ok_or(ConfigError::MissingEnv("RUN_ID"))?;
        let token = env_any(&RUN_TOKEN_VARS);
        Ok(Self {
            base_url,
            run_id,
            token,
        })
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

/// JSON-over-HTTP client for the orchestrator run API
pub struct HttpQueueClient {
    client: Client,
    base_url: String,
    run_id: String,
    token: Option<String>,
}

impl HttpQueueClient {
    /// Create a client for the given connection settings.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(QueueError::Client)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            run_id: config.run_id,
            token: config.token,
        })
    }

    /// Fetch the run descriptor and raw input payload.
    pub async fn bootstrap(&self) -> Result<Bootstrap, QueueError> {
        self.post_json("/bootstrap", &json!({})).await
    }

    async fn post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response, QueueError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}/v2/internal/runs/{}{}", self.base_url, self.run_id, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|source| QueueError::Transport {
                path: path.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, QueueError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(path, body).await?;
        response.json().await.map_err(|source| QueueError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl QueueService for HttpQueueClient {
    async fn lease(
        &self,
        worker_id: &str,
        limit: u32,
        lease_seconds: u64,
    ) -> Result<Vec<LeaseItem>, QueueError> {
        let body = json!({
            "worker_id": worker_id,
            "limit": limit,
            "lease_seconds": lease_seconds,
        });
        let response: LeaseResponse = self.post_json("/queue/lease", &body).await?;
        debug!(leased = response.items.len(), "Leased queue items");
        Ok(response.items)
    }

    async fn ack(&self, outcome: &AckOutcome) -> Result<(), QueueError> {
        self.post("/queue/ack", outcome).await?;
        Ok(())
    }

    async fn fail(&self, outcome: &FailOutcome) -> Result<(), QueueError> {
        self.post("/queue/fail", outcome).await?;
        Ok(())
    }

    async fn enqueue(&self, items: &[EnqueueItem]) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        self.post("/queue/enqueue", &json!({ "items": items })).await?;
        Ok(())
    }

    async fn push_records(&self, records: &[Value]) -> Result<(), QueueError> {
        if records.is_empty() {
            return Ok(());
        }
        self.post("/dataset/push", &json!({ "records": records }))
            .await?;
        Ok(())
    }

    async fn emit_event(&self, event: &RunEvent) -> Result<(), QueueError> {
        self.post("/events", event).await?;
        Ok(())
    }
}

/// Lease responses may omit the items list entirely
#[derive(Debug, Deserialize)]
struct LeaseResponse {
    #[serde(default)]
    items: Vec<LeaseItem>,
}
