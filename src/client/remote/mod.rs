//! # Remote Gateway
//!
//! Uniform HTTP wrapper around the scripted backend, used by the read path,
//! the immediate write attempt and queue replay alike.
//!
//! - every call has a deadline; running past it is a [`GatewayError::Timeout`]
//! - a response counts only if the status is 2xx, the content-type is JSON
//!   and the body says `success: true`
//! - a successful call marks the connection connected; a failed one marks it
//!   disconnected (only when it was connected, to avoid notification storms)
//!
//! [`HttpTransport`] does the HTTP work and knows nothing about connection
//! state, so the connectivity monitor can probe through it without a cycle.

pub mod actions;

use crate::client::offline::{MutationKind, MutationReplayer, QueuedMutation};
use crate::client::sync::connection::ConnectionMonitor;
use crate::shared::config::{AppConfig, ConfigError};
use crate::shared::models::{AlertsData, DieselEntry, InventorySnapshot, Machine};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Normalized remote failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Transport(String),
    #[error("server responded with HTTP {status}")]
    Status { status: u16 },
    #[error("expected a JSON response but got '{content_type}'")]
    NotJson { content_type: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The backend answered properly but refused the request
    #[error("{0}")]
    Rejected(String),
}

impl GatewayError {
    /// Whether the failure says anything about backend reachability
    pub fn is_connectivity_failure(&self) -> bool {
        !matches!(self, GatewayError::Rejected(_))
    }
}

/// Deadline-bound JSON-over-HTTP calls to the endpoint
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&config.endpoint_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.endpoint_url, e)))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "request_timeout",
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            timeout: config.request_timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn action_url(&self, action: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action);
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// GET ?action=...
    pub async fn get(&self, action: &str, params: &[(&str, String)]) -> Result<Value, GatewayError> {
        let url = self.action_url(action, params);
        self.execute(self.client.get(url)).await
    }

    /// POST ?action=... with a JSON body that also carries `action`
    pub async fn post(&self, action: &str, body: &Value) -> Result<Value, GatewayError> {
        let url = self.action_url(action, &[]);
        let mut body = body.clone();
        if let Value::Object(map) = &mut body {
            map.insert("action".to_string(), Value::String(action.to_string()));
        }
        self.execute(self.client.post(url).json(&body)).await
    }

    /// Fast liveness check; returns the round-trip latency
    pub async fn ping(&self) -> Result<Duration, GatewayError> {
        let started = Instant::now();
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        self.get(
            actions::TEST_BACKEND,
            &[("fast", "true".to_string()), ("t", cache_buster)],
        )
        .await?;
        Ok(started.elapsed())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.timeout)),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request.send().await.map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16() });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !is_json_content_type(&content_type) {
            return Err(GatewayError::NotJson { content_type });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        check_envelope(body)
    }

    fn map_reqwest(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime == "application/json" || mime.ends_with("+json") || mime == "text/json"
}

/// Every response carries `success`; `false` is a refusal with an optional message
fn check_envelope(body: Value) -> Result<Value, GatewayError> {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(body),
        Some(false) => {
            let message = body
                .get("message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("Request failed")
                .to_string();
            Err(GatewayError::Rejected(message))
        }
        None => Err(GatewayError::Malformed("response has no success flag".to_string())),
    }
}

fn field<T: DeserializeOwned>(body: &Value, name: &str) -> Result<T, GatewayError> {
    let value = body
        .get(name)
        .cloned()
        .ok_or_else(|| GatewayError::Malformed(format!("response has no '{}'", name)))?;
    serde_json::from_value(value).map_err(|e| GatewayError::Malformed(format!("'{}': {}", name, e)))
}

/// Transport plus connection bookkeeping
#[derive(Debug, Clone)]
pub struct RemoteGateway {
    transport: HttpTransport,
    connection: Arc<ConnectionMonitor>,
}

impl RemoteGateway {
    pub fn new(transport: HttpTransport, connection: Arc<ConnectionMonitor>) -> Self {
        Self { transport, connection }
    }

    async fn observe(&self, result: Result<Value, GatewayError>) -> Result<Value, GatewayError> {
        match &result {
            Ok(_) => self.connection.mark_connected().await,
            Err(err) if err.is_connectivity_failure() => {
                self.connection.mark_disconnected(err.to_string()).await;
            }
            Err(_) => {}
        }
        result
    }

    pub async fn get(&self, action: &str, params: &[(&str, String)]) -> Result<Value, GatewayError> {
        let result = self.transport.get(action, params).await;
        self.observe(result).await
    }

    pub async fn post(&self, action: &str, body: &Value) -> Result<Value, GatewayError> {
        let result = self.transport.post(action, body).await;
        self.observe(result).await
    }

    pub async fn fetch_machines(&self) -> Result<Vec<Machine>, GatewayError> {
        let body = self.get(actions::GET_MACHINES, &[]).await?;
        field(&body, "machines")
    }

    pub async fn fetch_logs(&self) -> Result<Vec<DieselEntry>, GatewayError> {
        let body = self.get(actions::GET_LOGS, &[]).await?;
        field(&body, "logs")
    }

    pub async fn fetch_inventory(&self) -> Result<InventorySnapshot, GatewayError> {
        let body = self.get(actions::GET_INVENTORY, &[]).await?;
        Ok(InventorySnapshot {
            transactions: field(&body, "transactions")?,
            current_stock: field(&body, "currentStock")?,
        })
    }

    pub async fn fetch_alerts(&self) -> Result<AlertsData, GatewayError> {
        let mut body = self.get(actions::GET_ALERTS, &[]).await?;
        if let Value::Object(map) = &mut body {
            map.remove("success");
            map.remove("message");
        }
        serde_json::from_value(body).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    /// Apply one mutation remotely; shared by immediate writes and replay
    pub async fn send_mutation(&self, kind: MutationKind, payload: &Value) -> Result<(), GatewayError> {
        self.post(actions::action_for(kind), payload).await.map(|_| ())
    }
}

#[async_trait]
impl MutationReplayer for RemoteGateway {
    async fn replay(&self, mutation: &QueuedMutation) -> Result<(), GatewayError> {
        self.send_mutation(mutation.kind, &mutation.payload).await
    }
}
