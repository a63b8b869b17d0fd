//! Read-through caching, identical for every dataset.
//!
//! Connected: fetch, overlay pending writes, cache, return. A failed fetch or
//! no connection falls back to the cache, then to an empty result once real
//! data has been seen, and only before that to demo data.

use super::{demo, SyncEngine};
use crate::client::local_cache::CacheKey;
use crate::client::offline::{PendingOverlay, QueuedMutation};
use crate::client::remote::GatewayError;
use crate::shared::config::CacheTtls;
use crate::shared::models::{AlertsData, DieselEntry, InventorySnapshot, LogFilter, Machine};
use crate::shared::response::{DataSource, ReadResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// A dataset cached under one key
pub(crate) trait CachedDataset: Serialize + DeserializeOwned + PendingOverlay + Default {
    const KEY: CacheKey;

    fn ttl(ttls: &CacheTtls) -> Duration;

    /// Nothing worth showing
    fn is_blank(&self) -> bool;

    fn demo() -> Self;
}

impl CachedDataset for Vec<Machine> {
    const KEY: CacheKey = CacheKey::Machines;

    fn ttl(ttls: &CacheTtls) -> Duration {
        ttls.machines
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn demo() -> Self {
        demo::machines()
    }
}

impl CachedDataset for Vec<DieselEntry> {
    const KEY: CacheKey = CacheKey::Logs;

    fn ttl(ttls: &CacheTtls) -> Duration {
        ttls.logs
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn demo() -> Self {
        demo::logs()
    }
}

impl CachedDataset for InventorySnapshot {
    const KEY: CacheKey = CacheKey::Inventory;

    fn ttl(ttls: &CacheTtls) -> Duration {
        ttls.inventory
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn demo() -> Self {
        demo::inventory()
    }
}

impl CachedDataset for AlertsData {
    const KEY: CacheKey = CacheKey::Alerts;

    fn ttl(ttls: &CacheTtls) -> Duration {
        ttls.alerts
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn demo() -> Self {
        demo::alerts()
    }
}

impl SyncEngine {
    pub async fn get_machines(&self) -> ReadResult<Vec<Machine>> {
        self.read_through(self.gateway.fetch_machines()).await
    }

    pub async fn get_inventory(&self) -> ReadResult<InventorySnapshot> {
        self.read_through(self.gateway.fetch_inventory()).await
    }

    /// Logs, optionally filtered locally (newest first when filtered)
    pub async fn get_logs(&self, filter: Option<LogFilter>) -> ReadResult<Vec<DieselEntry>> {
        let logs = self.read_through(self.gateway.fetch_logs()).await;
        match filter {
            Some(filter) => logs.map(|logs| filter.apply(logs)),
            None => logs,
        }
    }

    pub async fn get_alerts_data(&self) -> ReadResult<AlertsData> {
        self.read_through(self.gateway.fetch_alerts()).await
    }

    async fn read_through<T, F>(&self, fetch: F) -> ReadResult<T>
    where
        T: CachedDataset,
        F: Future<Output = Result<T, GatewayError>>,
    {
        let pending = self.queue.snapshot().await;

        if !self.connection.is_connected().await {
            let reason = self.connection.state().await.error;
            return self.fallback(&pending, reason).await;
        }

        match fetch.await {
            Ok(mut data) => {
                data.overlay(&pending);
                let ttl = T::ttl(&self.config.cache_ttls);
                if let Err(e) = self.cache.set(T::KEY, &data, Some(ttl)).await {
                    tracing::warn!(key = %T::KEY, error = %e, "could not cache remote read");
                }
                self.connection.mark_real_data().await;
                ReadResult::remote(data)
            }
            Err(e) => {
                tracing::warn!(key = %T::KEY, error = %e, "remote read failed, falling back to cache");
                self.fallback(&pending, Some(e.to_string())).await
            }
        }
    }

    async fn fallback<T: CachedDataset>(&self, pending: &[QueuedMutation], error: Option<String>) -> ReadResult<T> {
        match self.cache.get::<T>(T::KEY).await {
            Ok(Some(mut cached)) => {
                cached.overlay(pending);
                if !cached.is_blank() {
                    tracing::debug!(key = %T::KEY, "serving cached data");
                    return ReadResult::degraded(cached, DataSource::Cache, error);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %T::KEY, error = %e, "cache read failed"),
        }

        let mut local = T::default();
        if local.overlay(pending) > 0 && !local.is_blank() {
            return ReadResult::degraded(local, DataSource::Cache, error);
        }

        if self.connection.has_real_data().await {
            ReadResult::degraded(T::default(), DataSource::Empty, error)
        } else {
            ReadResult::degraded(T::demo(), DataSource::Demo, error)
        }
    }
}
