//! # Connection State
//!
//! One authoritative [`ConnectionState`], merged from device reachability and
//! the backend liveness probe. Every change is persisted to the local store
//! and fanned out to registered listeners.
//!
//! `is_connected` means the backend answered; it can only be true while the
//! internet is reachable. `has_real_data` only ever goes from false to true,
//! unless the caller resets it explicitly.

use crate::client::local_cache::{CacheKey, CacheStore};
use crate::client::remote::HttpTransport;
use crate::client::sync::network_monitor::NetworkInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::RwLock;

const NO_INTERNET: &str = "No internet connection";

/// Merged connectivity snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Backend reachable (implies `is_internet_reachable`)
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    pub last_checked: DateTime<Utc>,
    /// Round trip of the most recent successful probe
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub network_type: Option<String>,
    /// A remote read has succeeded at least once on this install
    pub has_real_data: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: false,
            last_checked: Utc::now(),
            latency_ms: None,
            error: None,
            network_type: None,
            has_real_data: false,
        }
    }
}

impl ConnectionState {
    fn normalize(&mut self) {
        if !self.is_internet_reachable {
            self.is_connected = false;
        }
    }
}

type Listener = Arc<dyn Fn(&ConnectionState) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Returned by [`ConnectionMonitor::add_listener`]
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    listeners: Weak<ListenerList>,
}

impl ListenerHandle {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            let mut listeners = listeners.lock().unwrap_or_else(|p| p.into_inner());
            listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the connection state and its observers
pub struct ConnectionMonitor {
    state: RwLock<ConnectionState>,
    listeners: Arc<ListenerList>,
    next_listener_id: AtomicU64,
    cache: Arc<CacheStore>,
    transport: HttpTransport,
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("ConnectionMonitor")
            .field("listeners", &listeners)
            .field("endpoint", &self.transport.endpoint().as_str())
            .finish()
    }
}

impl ConnectionMonitor {
    /// Create a monitor, carrying `has_real_data` over from the persisted state
    ///
    /// Everything else starts pessimistic: not connected until a probe or a
    /// data call says otherwise.
    pub async fn restore(cache: Arc<CacheStore>, transport: HttpTransport) -> Self {
        let persisted = match cache.get::<ConnectionState>(CacheKey::ConnectionStatus).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "could not read persisted connection state");
                None
            }
        };

        let state = ConnectionState {
            has_real_data: persisted.as_ref().is_some_and(|s| s.has_real_data),
            network_type: persisted.and_then(|s| s.network_type),
            ..ConnectionState::default()
        };

        Self {
            state: RwLock::new(state),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(1),
            cache,
            transport,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected
    }

    pub async fn is_internet_reachable(&self) -> bool {
        self.state.read().await.is_internet_reachable
    }

    pub async fn has_real_data(&self) -> bool {
        self.state.read().await.has_real_data
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        listeners.push((id, Arc::new(listener)));
        ListenerHandle {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Apply one mutation atomically, then persist and notify
    async fn update<F>(&self, mutate: F) -> ConnectionState
    where
        F: FnOnce(&mut ConnectionState),
    {
        let snapshot = {
            let mut state = self.state.write().await;
            mutate(&mut state);
            state.last_checked = Utc::now();
            state.normalize();
            state.clone()
        };

        if let Err(e) = self.cache.set(CacheKey::ConnectionStatus, &snapshot, None).await {
            tracing::warn!(error = %e, "could not persist connection state");
        }
        self.notify(&snapshot);
        snapshot
    }

    fn notify(&self, state: &ConnectionState) {
        let listeners: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(state))).is_err() {
                tracing::error!("connection listener panicked; ignoring");
            }
        }
    }

    /// Record a device reachability report
    ///
    /// Returns true when reachability just came back (false -> true), which
    /// is the caller's cue to schedule a debounced backend probe.
    pub async fn set_network(&self, info: NetworkInfo) -> bool {
        let was_reachable = self.is_internet_reachable().await;
        let came_back = !was_reachable && info.reachable;
        self.update(|state| {
            state.is_internet_reachable = info.reachable;
            state.network_type = info.network_type;
            if !info.reachable {
                state.is_connected = false;
                state.latency_ms = None;
                state.error = Some(NO_INTERNET.to_string());
            }
        })
        .await;

        if came_back {
            tracing::info!("internet reachability restored");
        } else if was_reachable && !info.reachable {
            tracing::warn!("internet reachability lost");
        }
        came_back
    }

    /// Probe backend liveness; skipped (forced offline) without internet
    pub async fn probe_backend(&self) -> bool {
        if !self.is_internet_reachable().await {
            self.update(|state| {
                state.is_connected = false;
                state.latency_ms = None;
                state.error = Some(NO_INTERNET.to_string());
            })
            .await;
            return false;
        }

        match self.transport.ping().await {
            Ok(latency) => {
                let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(latency_ms, "backend probe succeeded");
                self.update(|state| {
                    state.is_connected = true;
                    state.latency_ms = Some(latency_ms);
                    state.error = None;
                })
                .await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "backend probe failed");
                self.update(|state| {
                    state.is_connected = false;
                    state.error = Some(e.to_string());
                })
                .await;
                false
            }
        }
    }

    /// A data call succeeded: the backend is evidently alive
    pub async fn mark_connected(&self) {
        if self.is_connected().await {
            return;
        }
        tracing::info!("backend reachable again");
        self.update(|state| {
            state.is_internet_reachable = true;
            state.is_connected = true;
            state.error = None;
        })
        .await;
    }

    /// A data call failed; only a connected monitor flips
    pub async fn mark_disconnected(&self, error: impl Into<String>) {
        if !self.is_connected().await {
            return;
        }
        let error = error.into();
        tracing::warn!(error = %error, "backend unreachable");
        self.update(|state| {
            state.is_connected = false;
            state.error = Some(error);
        })
        .await;
    }

    /// A remote read succeeded; sticky from now on
    pub async fn mark_real_data(&self) {
        if self.has_real_data().await {
            return;
        }
        self.update(|state| state.has_real_data = true).await;
    }

    /// Explicitly go back to "never seen real data" (e.g. switching environments)
    pub async fn reset_real_data(&self) {
        self.update(|state| state.has_real_data = false).await;
    }
}
