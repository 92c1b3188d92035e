//! HttpSink - POSTs batches to the remote collection endpoint

use contracts::{ContractError, Metric, MetricSink, SessionAuth};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Path of the metrics endpoint relative to the site URL
pub const API_ENDPOINT: &str = "api3/track_metrics/";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for HttpSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Site URL; the endpoint path is appended to it
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpSinkConfig {
    /// Create config from a site URL and the params map
    pub fn from_params(base_url: &str, params: &HashMap<String, String>) -> Result<Self, String> {
        if base_url.trim().is_empty() {
            return Err("missing site base url".to_string());
        }

        let timeout_ms = match params.get("timeout_ms") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid timeout_ms '{}': {}", raw, e))?,
            None => DEFAULT_TIMEOUT_MS,
        };

        Ok(Self {
            base_url: base_url.to_string(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Full endpoint URL
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), API_ENDPOINT)
    }
}

/// Build the request body for one batch
pub fn build_payload(session_token: &str, batch: &[Metric]) -> Value {
    json!({
        "auth_args": { "session_token": session_token },
        "metrics": batch.iter().map(Metric::payload).collect::<Vec<_>>(),
    })
}

/// Sink that sends each batch in a single JSON request
pub struct HttpSink {
    name: String,
    endpoint: String,
    client: reqwest::Client,
    session: Arc<dyn SessionAuth>,
}

impl HttpSink {
    /// Create a new HttpSink
    pub fn new(
        name: impl Into<String>,
        config: HttpSinkConfig,
        session: Arc<dyn SessionAuth>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint(),
            name,
            client,
            session,
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        base_url: &str,
        params: &HashMap<String, String>,
        session: Arc<dyn SessionAuth>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = HttpSinkConfig::from_params(base_url, params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name, config, session)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MetricSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_sink_deliver",
        skip(self, batch),
        fields(sink = %self.name, batch = batch.len())
    )]
    async fn deliver(&self, batch: &[Metric]) -> Result<(), ContractError> {
        let token = self
            .session
            .session_token()
            .ok_or_else(|| ContractError::sink_delivery(&self.name, "no session token"))?;

        let payload = build_payload(&token, batch);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ContractError::sink_delivery(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContractError::sink_delivery(
                &self.name,
                format!("endpoint returned {}", status),
            ));
        }

        debug!(sink = %self.name, status = %status, count = batch.len(), "Batch posted");
        Ok(())
    }
}
