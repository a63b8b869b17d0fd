//! # Sync Engine
//!
//! The single entry point for every domain read and write.
//!
//! ## Architecture
//!
//! - **Connection**: [`ConnectionMonitor`] merges device reachability with the
//!   backend probe into one [`ConnectionState`]
//! - **Network observers**: event-driven or polling reachability behind
//!   [`NetworkObserver`]
//! - **Reads** (`reads.rs`): remote first when connected, cache and demo
//!   fallbacks otherwise
//! - **Writes** (`writes.rs`): validate, apply locally, try the backend, queue
//!   on failure
//! - **Background** (`background.rs`): reconnect drains, liveness probe,
//!   periodic drains
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dieselsync::client::local_cache::CacheStore;
//! use dieselsync::client::sync::network_monitor::{NetworkInfo, SubscriptionObserver};
//! use dieselsync::client::sync::SyncEngine;
//! use dieselsync::shared::config::AppConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::builder().endpoint_url("https://script.example.com/exec").build()?;
//! let cache = Arc::new(CacheStore::open("/tmp/dieselsync/cache.db".as_ref()).await?);
//! let network = Arc::new(SubscriptionObserver::new(NetworkInfo::online("wifi")));
//!
//! let engine = SyncEngine::new(config, cache, network.clone()).await?;
//! engine.start();
//!
//! let machines = engine.get_machines().await;
//! println!("{} machines from {:?}", machines.data.len(), machines.source);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod calculations;
pub mod connection;
pub mod demo;
pub mod metrics;
pub mod network_monitor;
mod reads;
pub mod validation;
mod writes;

pub use connection::{ConnectionMonitor, ConnectionState, ListenerHandle};
pub use metrics::DrainMetrics;
pub use network_monitor::{NetworkInfo, NetworkObserver, ObserverMode, SubscriptionObserver};
pub use writes::{DeleteOptions, DeletionRecord};

use crate::client::config::Config;
use crate::client::local_cache::{CacheError, CacheStore};
use crate::client::offline::{
    DrainMode, DrainReport, OfflineQueue, QueueStatus, RetryPolicy, WriteLedger, WriteRecord, WriteStage,
};
use crate::client::remote::{GatewayError, HttpTransport, RemoteGateway};
use crate::shared::config::{AppConfig, ConfigError};
use crate::shared::error::SharedError;
use crate::shared::response::ServiceResponse;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;

/// Failures inside the engine; never returned from the caller-facing API
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Validation(#[from] SharedError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Owns the sync core: cache, connection, queue and background tasks
///
/// Construct once and hand the `Arc` to whoever needs it.
pub struct SyncEngine {
    config: AppConfig,
    cache: Arc<CacheStore>,
    connection: Arc<ConnectionMonitor>,
    gateway: RemoteGateway,
    queue: OfflineQueue,
    ledger: WriteLedger,
    network: Arc<dyn NetworkObserver>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("endpoint", &self.config.endpoint_url)
            .field("network_mode", &self.network.mode())
            .field("queue", &self.queue)
            .finish()
    }
}

impl SyncEngine {
    /// Wire the components together; background tasks start with [`SyncEngine::start`]
    pub async fn new(
        config: AppConfig,
        cache: Arc<CacheStore>,
        network: Arc<dyn NetworkObserver>,
    ) -> Result<Arc<Self>, SyncError> {
        match cache.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "expired cache entries purged"),
            Err(e) => tracing::warn!(error = %e, "could not purge expired cache entries"),
        }

        let transport = HttpTransport::new(&config)?;
        let connection = Arc::new(ConnectionMonitor::restore(Arc::clone(&cache), transport.clone()).await);
        connection.set_network(network.current()).await;

        let gateway = RemoteGateway::new(transport, Arc::clone(&connection));
        let queue = OfflineQueue::load(
            Arc::clone(&cache),
            RetryPolicy::from_config(&config),
            config.drain_item_delay,
        )
        .await?;

        let pending = queue.len().await;
        tracing::info!(
            endpoint = %config.endpoint_url,
            network_mode = ?network.mode(),
            pending,
            "sync engine ready"
        );

        Ok(Arc::new(Self {
            config,
            cache,
            connection,
            gateway,
            queue,
            ledger: WriteLedger::new(),
            network,
            tasks: Mutex::new(Vec::new()),
        }))
    }

    /// Open the on-disk cache, pick a network observer and start background tasks
    ///
    /// `platform` is the host's reachability event source, if it has one;
    /// without it reachability is polled.
    pub async fn open(config: &Config, platform: Option<Arc<SubscriptionObserver>>) -> Result<Arc<Self>, SyncError> {
        let app = config.app().clone();
        let cache = Arc::new(CacheStore::open(&config.cache_path()).await?);
        let endpoint = reqwest::Url::parse(&app.endpoint_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", app.endpoint_url, e)))?;
        let network =
            network_monitor::select_observer(platform, &endpoint, app.network_poll_interval, app.request_timeout);

        let engine = Self::new(app, cache, network).await?;
        engine.start();
        Ok(engine)
    }

    /// Spawn the background tasks; calling it again is a no-op
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        if !tasks.is_empty() {
            return;
        }
        tasks.extend(background::spawn_all(self));
        tracing::info!(tasks = tasks.len(), "background sync started");
    }

    /// Stop the background tasks; in-flight calls are cancelled
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        tracing::info!("background sync stopped");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn network_mode(&self) -> ObserverMode {
        self.network.mode()
    }

    /// Probe the backend now; true when it answered
    pub async fn check_connection(&self) -> bool {
        self.connection.probe_backend().await
    }

    pub async fn connection_status(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub fn add_connection_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.connection.add_listener(listener)
    }

    /// Go back to showing demo data when nothing is cached
    pub async fn reset_real_data_flag(&self) {
        tracing::info!("real-data flag reset");
        self.connection.reset_real_data().await;
    }

    pub async fn offline_queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    /// Writes that have not reached a terminal stage yet
    pub async fn pending_writes(&self) -> Vec<WriteRecord> {
        self.ledger.pending().await
    }

    /// Replay everything now, ignoring backoff
    pub async fn drain_queue(&self) -> DrainReport {
        self.run_drain(DrainMode::Manual).await
    }

    /// Move failed mutations back into the queue with a fresh budget, then drain
    pub async fn retry_failed_items(&self) -> DrainReport {
        match self.queue.requeue_failed().await {
            Ok(requeued) => {
                for mutation in &requeued {
                    self.ledger.restart(&mutation.id, mutation.kind).await;
                }
                if !requeued.is_empty() {
                    tracing::info!(count = requeued.len(), "failed mutations requeued");
                }
            }
            Err(e) => tracing::error!(error = %e, "could not requeue failed mutations"),
        }
        self.run_drain(DrainMode::Manual).await
    }

    /// Drop every pending and failed mutation
    pub async fn clear_offline_queue(&self) -> ServiceResponse {
        match self.queue.clear().await {
            Ok((pending, failed)) => {
                self.ledger.clear().await;
                ServiceResponse::ok(format!(
                    "Cleared {} pending and {} failed changes",
                    pending, failed
                ))
            }
            Err(e) => {
                tracing::error!(error = %e, "could not clear offline queue");
                ServiceResponse::failure(format!("Could not clear the offline queue: {}", e))
            }
        }
    }

    pub(crate) async fn run_drain(&self, mode: DrainMode) -> DrainReport {
        let report = match self.queue.drain(&self.gateway, &self.connection, mode).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "drain could not persist the queue");
                return DrainReport::default();
            }
        };

        for id in &report.replayed {
            self.track(id, WriteStage::Confirmed).await;
        }
        for id in &report.exhausted {
            self.track(id, WriteStage::RetryExhausted).await;
        }
        self.ledger.prune_terminal().await;
        report
    }

    /// Advance a write's lifecycle; writes restored from disk have no record
    async fn track(&self, mutation_id: &str, stage: WriteStage) {
        if let Err(e) = self.ledger.advance(mutation_id, stage).await {
            tracing::debug!(mutation_id, error = %e, "write lifecycle not tracked");
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
