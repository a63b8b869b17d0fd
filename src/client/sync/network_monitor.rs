//! # Network Monitor
//!
//! Device-level reachability, behind one [`NetworkObserver`] interface with
//! two interchangeable strategies:
//!
//! - [`SubscriptionObserver`]: event-driven; the host platform pushes every
//!   reachability change through [`SubscriptionObserver::publish`].
//! - [`PollingObserver`]: degraded mode for platforms without change events;
//!   polls a [`ReachabilityCheck`] on a short fixed interval.
//!
//! Consumers only ever see a `watch` channel, so the sync core does not care
//! which strategy is active.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Device reachability as reported by the platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub reachable: bool,
    pub network_type: Option<String>,
}

impl NetworkInfo {
    pub fn online(network_type: impl Into<String>) -> Self {
        Self {
            reachable: true,
            network_type: Some(network_type.into()),
        }
    }

    pub fn offline() -> Self {
        Self {
            reachable: false,
            network_type: Some("none".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverMode {
    Subscription,
    Polling,
}

/// Source of reachability changes
pub trait NetworkObserver: Send + Sync {
    fn mode(&self) -> ObserverMode;

    fn current(&self) -> NetworkInfo;

    /// Receiver that wakes on every change
    fn subscribe(&self) -> watch::Receiver<NetworkInfo>;
}

/// Event-driven observer fed by the host platform
#[derive(Debug)]
pub struct SubscriptionObserver {
    tx: watch::Sender<NetworkInfo>,
}

impl SubscriptionObserver {
    pub fn new(initial: NetworkInfo) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Report a platform reachability event; identical reports are ignored
    pub fn publish(&self, info: NetworkInfo) {
        publish_if_changed(&self.tx, info);
    }
}

impl NetworkObserver for SubscriptionObserver {
    fn mode(&self) -> ObserverMode {
        ObserverMode::Subscription
    }

    fn current(&self) -> NetworkInfo {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkInfo> {
        self.tx.subscribe()
    }
}

fn publish_if_changed(tx: &watch::Sender<NetworkInfo>, info: NetworkInfo) -> bool {
    tx.send_if_modified(|current| {
        if *current == info {
            false
        } else {
            tracing::debug!(reachable = info.reachable, network_type = ?info.network_type, "network reachability changed");
            *current = info;
            true
        }
    })
}

/// One reachability measurement, used by the polling observer
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn check(&self) -> NetworkInfo;
}

/// Reachability by opening a TCP connection to the endpoint's host
#[derive(Debug, Clone)]
pub struct TcpReachability {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Target the host and port the endpoint URL points at
    pub fn for_endpoint(endpoint: &Url, timeout: Duration) -> Option<Self> {
        let host = endpoint.host_str()?.to_string();
        let port = endpoint.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl ReachabilityCheck for TcpReachability {
    async fn check(&self) -> NetworkInfo {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => NetworkInfo::online("unknown"),
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, error = %e, "reachability check failed");
                NetworkInfo::offline()
            }
            Err(_) => NetworkInfo::offline(),
        }
    }
}

/// Degraded-mode observer: polls on a fixed interval
pub struct PollingObserver {
    tx: Arc<watch::Sender<NetworkInfo>>,
    task: JoinHandle<()>,
}

impl PollingObserver {
    /// Start polling; must be called inside a Tokio runtime
    pub fn start(check: Arc<dyn ReachabilityCheck>, interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(NetworkInfo::default());
        let tx = Arc::new(tx);
        let poll_tx = Arc::clone(&tx);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let info = check.check().await;
                publish_if_changed(&poll_tx, info);
            }
        });

        Self { tx, task }
    }
}

impl NetworkObserver for PollingObserver {
    fn mode(&self) -> ObserverMode {
        ObserverMode::Polling
    }

    fn current(&self) -> NetworkInfo {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkInfo> {
        self.tx.subscribe()
    }
}

impl Drop for PollingObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for PollingObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingObserver")
            .field("current", &*self.tx.borrow())
            .finish()
    }
}

/// Prefer the platform's event source; fall back to polling the endpoint host
pub fn select_observer(
    platform: Option<Arc<SubscriptionObserver>>,
    endpoint: &Url,
    poll_interval: Duration,
    timeout: Duration,
) -> Arc<dyn NetworkObserver> {
    if let Some(observer) = platform {
        tracing::info!("using subscription-based network observer");
        return observer;
    }

    tracing::warn!("no network event source available, falling back to polling");
    let check: Arc<dyn ReachabilityCheck> = match TcpReachability::for_endpoint(endpoint, timeout) {
        Some(tcp) => Arc::new(tcp),
        None => Arc::new(AssumeReachable),
    };
    Arc::new(PollingObserver::start(check, poll_interval))
}

/// Used when the endpoint has no host to dial; the backend probe still gates `is_connected`
struct AssumeReachable;

#[async_trait]
impl ReachabilityCheck for AssumeReachable {
    async fn check(&self) -> NetworkInfo {
        NetworkInfo::online("unknown")
    }
}
