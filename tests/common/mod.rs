//! Common test utilities and helpers
//!
//! - `TestBackend`: a wiremock stand-in for the scripted endpoint
//! - engine builders over an in-memory or on-disk cache
//! - record fixtures

use dieselsync::client::local_cache::{CacheKey, CacheStore};
use dieselsync::client::sync::{NetworkInfo, SubscriptionObserver, SyncEngine};
use dieselsync::shared::config::{AppConfig, AppConfigBuilder, BackoffStrategy};
use dieselsync::shared::models::{Extra, Machine, UsageUnit};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock of the scripted endpoint at `{uri}/exec`
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/exec", self.server.uri())
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }

    pub async fn on_get(&self, action: &str, body: Value) {
        Mock::given(method("GET"))
            .and(path("/exec"))
            .and(query_param("action", action))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// `testBackend` answers with a JSON success envelope
    pub async fn healthy(&self) {
        self.on_get("testBackend", json!({"success": true, "message": "ok"})).await;
    }

    /// Every GET answers 200 with an HTML page, like a captive portal
    pub async fn serving_html(&self) {
        Mock::given(method("GET"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html><body>Sign in</body></html>", "text/html"))
            .mount(&self.server)
            .await;
    }

    pub async fn accept_writes(&self) {
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&self.server)
            .await;
    }

    /// The backend answers properly but refuses every write
    pub async fn reject_writes(&self, message: &str) {
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": message})))
            .mount(&self.server)
            .await;
    }

    /// Refuse only the next write; mount before `accept_writes`
    pub async fn reject_next_write(&self, message: &str) {
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": message})))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    pub async fn fail_writes(&self) {
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
    }

    /// `action` of every POST, in arrival order
    pub async fn posted_actions(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.method.as_str() == "POST")
            .filter_map(|request| serde_json::from_slice::<Value>(&request.body).ok())
            .filter_map(|body| body.get("action").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

/// Short timeouts, no pacing and no backoff, so tests are fast and deterministic
pub fn test_config(endpoint: &str) -> AppConfig {
    test_config_builder(endpoint).build().expect("test config is valid")
}

pub fn test_config_builder(endpoint: &str) -> AppConfigBuilder {
    AppConfig::builder()
        .endpoint_url(endpoint)
        .request_timeout(Duration::from_secs(2))
        .probe_interval(Duration::from_secs(3600))
        .auto_sync_interval(Duration::from_secs(3600))
        .reconnect_debounce(Duration::from_millis(10))
        .drain_item_delay(Duration::ZERO)
        .backoff(BackoffStrategy::Immediate)
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub network: Arc<SubscriptionObserver>,
}

/// Engine over a fresh in-memory cache; background tasks are not started
pub async fn harness(backend: &TestBackend, network: NetworkInfo) -> Harness {
    let cache = Arc::new(CacheStore::in_memory().await.expect("in-memory cache"));
    harness_with_cache(test_config(&backend.endpoint()), cache, network).await
}

pub async fn harness_with_cache(config: AppConfig, cache: Arc<CacheStore>, network: NetworkInfo) -> Harness {
    let network = Arc::new(SubscriptionObserver::new(network));
    let engine = SyncEngine::new(config, cache, network.clone())
        .await
        .expect("engine builds");
    Harness { engine, network }
}

pub fn machine(name: &str, plate: &str, unit: UsageUnit, standard_avg: Option<f64>) -> Machine {
    Machine {
        id: format!("m-{}", plate.to_ascii_lowercase()),
        name: name.to_string(),
        plate: plate.to_string(),
        machine_type: "Excavator".to_string(),
        unit,
        ownership: None,
        standard_avg,
        initial_reading: 0.0,
        last_reading: Some(100.0),
        status: Some("active".to_string()),
        created_at: None,
        updated_at: None,
        extra: Extra::new(),
    }
}

pub async fn seed_machines(engine: &SyncEngine, machines: &[Machine]) {
    engine
        .cache()
        .set(CacheKey::Machines, machines, None)
        .await
        .expect("seed machines");
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
