//! # Offline Mutation Queue
//!
//! Durable, priority-ordered list of writes waiting for the backend.
//!
//! ## Ordering
//!
//! Higher `priority` first; equal priorities keep arrival order. The order is
//! maintained on insert, so the stored list is always the replay order.
//!
//! ## Persistence
//!
//! The whole list is written to the local store (no expiry) after every
//! change: append, removal or reorder. Exhausted mutations move to a second
//! persisted list, the failed bucket, instead of being dropped.
//!
//! ## Draining
//!
//! A drain replays a snapshot of the queue one item at a time, in order.
//! Items enqueued while a drain runs are untouched by it; the outcome of the
//! pass is merged back into the live list afterwards.
//!
//! Mutations of one kind that touch the same record replay in arrival order:
//! once an item is deferred or fails in a pass, later items for the same
//! record wait for the next pass.

use crate::client::local_cache::{CacheError, CacheKey, CacheStore};
use crate::client::offline::retry::RetryPolicy;
use crate::client::remote::GatewayError;
use crate::client::sync::connection::ConnectionMonitor;
use crate::client::sync::metrics::DrainMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// What a queued mutation does remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Entry,
    Inventory,
    Machine,
    MachineUpdate,
    MachineDelete,
    AlertUpdate,
}

impl MutationKind {
    pub const ALL: [MutationKind; 6] = [
        MutationKind::Entry,
        MutationKind::Inventory,
        MutationKind::Machine,
        MutationKind::MachineUpdate,
        MutationKind::MachineDelete,
        MutationKind::AlertUpdate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Entry => "entry",
            MutationKind::Inventory => "inventory",
            MutationKind::Machine => "machine",
            MutationKind::MachineUpdate => "machineUpdate",
            MutationKind::MachineDelete => "machineDelete",
            MutationKind::AlertUpdate => "alertUpdate",
        }
    }

    /// Business records first, destructive operations last
    ///
    /// Machine creation shares the top priority so a machine is replayed
    /// before the entries that reference it.
    pub fn default_priority(self) -> i32 {
        match self {
            MutationKind::Entry | MutationKind::Inventory | MutationKind::Machine => 10,
            MutationKind::MachineUpdate => 5,
            MutationKind::AlertUpdate => 3,
            MutationKind::MachineDelete => 1,
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: String,
    pub kind: MutationKind,
    /// Request body sent to the backend on replay
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: i32,
    /// Earliest time a scheduled drain may replay this again
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueuedMutation {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }

    /// The record this mutation targets, if its payload names one
    ///
    /// Machine names compare case-insensitively.
    pub fn entity(&self) -> Option<(MutationKind, String)> {
        let field = match self.kind {
            MutationKind::MachineUpdate | MutationKind::MachineDelete => "machineName",
            MutationKind::Machine => "name",
            MutationKind::AlertUpdate => "alertId",
            MutationKind::Entry | MutationKind::Inventory => "id",
        };
        let value = self.payload.get(field)?.as_str()?.trim();
        if value.is_empty() {
            return None;
        }
        let key = match self.kind {
            MutationKind::MachineUpdate | MutationKind::MachineDelete | MutationKind::Machine => value.to_lowercase(),
            _ => value.to_string(),
        };
        Some((self.kind, key))
    }

    /// Sorts before `other` in replay order
    fn precedes(&self, other: &QueuedMutation) -> bool {
        self.priority > other.priority || (self.priority == other.priority && self.enqueued_at <= other.enqueued_at)
    }
}

fn replay_order(a: &QueuedMutation, b: &QueuedMutation) -> std::cmp::Ordering {
    b.priority.cmp(&a.priority).then(a.enqueued_at.cmp(&b.enqueued_at))
}

/// A mutation that used up its retry budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedMutation {
    #[serde(flatten)]
    pub mutation: QueuedMutation,
    pub failed_at: DateTime<Utc>,
}

/// Applies a queued mutation remotely
#[async_trait]
pub trait MutationReplayer: Send + Sync {
    async fn replay(&self, mutation: &QueuedMutation) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Periodic drain: honours retry backoff
    Scheduled,
    /// The backend just came back: every item is attempted now
    Reconnect,
    /// User-requested: every item is attempted now
    Manual,
}

impl DrainMode {
    fn honours_backoff(self) -> bool {
        matches!(self, DrainMode::Scheduled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DrainSkip {
    AlreadyRunning,
    Offline,
    Empty,
}

/// What one drain pass did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub skipped: Option<DrainSkip>,
    pub attempted: usize,
    /// Ids confirmed by the backend
    pub replayed: Vec<String>,
    /// Failed but kept for another pass
    pub retrying: usize,
    /// Ids moved to the failed bucket
    pub exhausted: Vec<String>,
    /// Not yet due, or held behind an earlier mutation of the same record
    pub deferred: usize,
    /// The connection dropped mid-pass
    pub stopped_early: bool,
    pub remaining: usize,
}

impl DrainReport {
    fn skipped(reason: DrainSkip, remaining: usize) -> Self {
        Self {
            skipped: Some(reason),
            remaining,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub count: usize,
    pub failed: usize,
    pub is_processing: bool,
    pub by_kind: BTreeMap<MutationKind, usize>,
    pub oldest_enqueued_at: Option<DateTime<Utc>>,
    pub items: Vec<QueuedMutation>,
    pub failed_items: Vec<FailedMutation>,
    pub metrics: DrainMetrics,
}

enum Outcome {
    Replayed,
    Retry(QueuedMutation),
    Exhausted(QueuedMutation),
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct OfflineQueue {
    items: RwLock<Vec<QueuedMutation>>,
    failed: RwLock<Vec<FailedMutation>>,
    draining: AtomicBool,
    sequence: AtomicU64,
    metrics: Mutex<DrainMetrics>,
    cache: Arc<CacheStore>,
    policy: RetryPolicy,
    item_delay: Duration,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .field("policy", &self.policy)
            .field("item_delay", &self.item_delay)
            .finish()
    }
}

impl OfflineQueue {
    /// Restore the queue and the failed bucket from the local store
    pub async fn load(cache: Arc<CacheStore>, policy: RetryPolicy, item_delay: Duration) -> Result<Self, CacheError> {
        let mut items: Vec<QueuedMutation> = cache.get(CacheKey::OfflineQueue).await?.unwrap_or_default();
        items.sort_by(replay_order);
        let failed: Vec<FailedMutation> = cache.get(CacheKey::FailedMutations).await?.unwrap_or_default();

        if !items.is_empty() || !failed.is_empty() {
            tracing::info!(pending = items.len(), failed = failed.len(), "restored offline queue");
        }

        Ok(Self {
            items: RwLock::new(items),
            failed: RwLock::new(failed),
            draining: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            metrics: Mutex::new(DrainMetrics::default()),
            cache,
            policy,
            item_delay,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `{kind}_{millis}_{sequence}_{random}`; unique for the life of the process
    pub fn generate_id(&self, kind: MutationKind) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        format!("{}_{}_{}_{}", kind.as_str(), Utc::now().timestamp_millis(), seq, suffix)
    }

    /// A fresh mutation with the kind's default priority and budget; not yet queued
    pub fn new_mutation(&self, kind: MutationKind, payload: Value) -> QueuedMutation {
        QueuedMutation {
            id: self.generate_id(kind),
            kind,
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
            max_retries: self.policy.budget_for(kind),
            priority: kind.default_priority(),
            next_attempt_at: None,
            last_error: None,
        }
    }

    pub async fn enqueue(&self, kind: MutationKind, payload: Value) -> Result<QueuedMutation, CacheError> {
        let mutation = self.new_mutation(kind, payload);
        self.push(mutation.clone()).await?;
        Ok(mutation)
    }

    /// Insert in replay order and persist
    pub async fn push(&self, mutation: QueuedMutation) -> Result<(), CacheError> {
        let mut items = self.items.write().await;
        let at = items.partition_point(|existing| existing.precedes(&mutation));
        tracing::info!(
            mutation_id = %mutation.id,
            kind = %mutation.kind,
            priority = mutation.priority,
            position = at,
            "mutation queued"
        );
        items.insert(at, mutation);
        self.cache.set(CacheKey::OfflineQueue, &*items, None).await
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Pending mutations in replay order
    pub async fn snapshot(&self) -> Vec<QueuedMutation> {
        self.items.read().await.clone()
    }

    pub async fn failed(&self) -> Vec<FailedMutation> {
        self.failed.read().await.clone()
    }

    pub fn metrics(&self) -> DrainMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub async fn status(&self) -> QueueStatus {
        let items = self.snapshot().await;
        let failed_items = self.failed().await;

        let mut by_kind = BTreeMap::new();
        for item in &items {
            *by_kind.entry(item.kind).or_insert(0) += 1;
        }

        QueueStatus {
            count: items.len(),
            failed: failed_items.len(),
            is_processing: self.is_draining(),
            by_kind,
            oldest_enqueued_at: items.iter().map(|m| m.enqueued_at).min(),
            items,
            failed_items,
            metrics: self.metrics(),
        }
    }

    /// Replay queued mutations in order, one at a time
    ///
    /// Returns immediately if a drain is already running or the backend is
    /// not connected. Stops early if the connection drops mid-pass; items not
    /// reached keep their retry count.
    pub async fn drain(
        &self,
        replayer: &dyn MutationReplayer,
        connection: &ConnectionMonitor,
        mode: DrainMode,
    ) -> Result<DrainReport, CacheError> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("drain already running, request dropped");
            return Ok(DrainReport::skipped(DrainSkip::AlreadyRunning, self.len().await));
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = self.snapshot().await;
        if snapshot.is_empty() {
            return Ok(DrainReport::skipped(DrainSkip::Empty, 0));
        }
        if !connection.is_connected().await {
            tracing::debug!(pending = snapshot.len(), "offline, drain skipped");
            return Ok(DrainReport::skipped(DrainSkip::Offline, snapshot.len()));
        }

        let started = Instant::now();
        tracing::info!(pending = snapshot.len(), ?mode, "draining offline queue");

        let mut report = DrainReport::default();
        let mut outcomes: HashMap<String, Outcome> = HashMap::new();
        let now = Utc::now();
        let mut held: HashSet<(MutationKind, String)> = HashSet::new();

        for item in snapshot {
            let entity = item.entity();
            let blocked = entity.as_ref().map_or(false, |key| held.contains(key));
            if blocked || (mode.honours_backoff() && !item.is_due(now)) {
                tracing::debug!(mutation_id = %item.id, blocked, "mutation deferred");
                held.extend(entity);
                report.deferred += 1;
                continue;
            }
            if !connection.is_connected().await {
                tracing::warn!(mutation_id = %item.id, "connection lost, stopping drain");
                report.stopped_early = true;
                break;
            }
            if report.attempted > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            report.attempted += 1;

            match replayer.replay(&item).await {
                Ok(()) => {
                    tracing::info!(mutation_id = %item.id, kind = %item.kind, "queued mutation replayed");
                    report.replayed.push(item.id.clone());
                    outcomes.insert(item.id, Outcome::Replayed);
                }
                Err(e) => {
                    let mut item = item;
                    item.retry_count += 1;
                    item.last_error = Some(e.to_string());

                    if item.retry_count >= item.max_retries {
                        tracing::error!(
                            mutation_id = %item.id,
                            kind = %item.kind,
                            retry_count = item.retry_count,
                            error = %e,
                            "retry budget exhausted, moving mutation to failed bucket"
                        );
                        report.exhausted.push(item.id.clone());
                        outcomes.insert(item.id.clone(), Outcome::Exhausted(item));
                    } else {
                        item.next_attempt_at = Some(self.policy.next_attempt_at(item.retry_count, Utc::now()));
                        tracing::warn!(
                            mutation_id = %item.id,
                            kind = %item.kind,
                            retry_count = item.retry_count,
                            error = %e,
                            "queued mutation replay failed"
                        );
                        report.retrying += 1;
                        held.extend(item.entity());
                        outcomes.insert(item.id.clone(), Outcome::Retry(item));
                    }
                }
            }
        }

        report.remaining = self.merge(outcomes).await?;

        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_pass(&report, started.elapsed());
        }
        tracing::info!(
            replayed = report.replayed.len(),
            retrying = report.retrying,
            exhausted = report.exhausted.len(),
            deferred = report.deferred,
            remaining = report.remaining,
            "drain finished"
        );
        Ok(report)
    }

    /// Fold a pass's outcomes into the live list; returns the new length
    async fn merge(&self, mut outcomes: HashMap<String, Outcome>) -> Result<usize, CacheError> {
        if outcomes.is_empty() {
            return Ok(self.len().await);
        }

        let mut exhausted = Vec::new();
        let remaining = {
            let mut items = self.items.write().await;
            let current = std::mem::take(&mut *items);
            for item in current {
                match outcomes.remove(&item.id) {
                    None => items.push(item),
                    Some(Outcome::Retry(updated)) => items.push(updated),
                    Some(Outcome::Replayed) => {}
                    Some(Outcome::Exhausted(dead)) => exhausted.push(dead),
                }
            }
            items.sort_by(replay_order);
            self.cache.set(CacheKey::OfflineQueue, &*items, None).await?;
            items.len()
        };

        if !exhausted.is_empty() {
            let failed_at = Utc::now();
            let mut failed = self.failed.write().await;
            failed.extend(exhausted.into_iter().map(|mutation| FailedMutation { mutation, failed_at }));
            self.cache.set(CacheKey::FailedMutations, &*failed, None).await?;
        }

        Ok(remaining)
    }

    /// Move every failed mutation back into the queue with a fresh budget
    pub async fn requeue_failed(&self) -> Result<Vec<QueuedMutation>, CacheError> {
        let revived = {
            let mut failed = self.failed.write().await;
            let revived: Vec<QueuedMutation> = failed.drain(..).map(|f| f.mutation).collect();
            self.cache.set(CacheKey::FailedMutations, &*failed, None).await?;
            revived
        };

        let mut requeued = Vec::with_capacity(revived.len());
        for mut mutation in revived {
            mutation.retry_count = 0;
            mutation.max_retries = self.policy.budget_for(mutation.kind);
            mutation.next_attempt_at = None;
            mutation.last_error = None;
            requeued.push(mutation.clone());
            self.push(mutation).await?;
        }
        Ok(requeued)
    }

    /// Drop everything, pending and failed; returns (pending, failed) counts
    pub async fn clear(&self) -> Result<(usize, usize), CacheError> {
        let pending = {
            let mut items = self.items.write().await;
            let n = items.len();
            items.clear();
            self.cache.set(CacheKey::OfflineQueue, &*items, None).await?;
            n
        };
        let failed = {
            let mut failed = self.failed.write().await;
            let n = failed.len();
            failed.clear();
            self.cache.set(CacheKey::FailedMutations, &*failed, None).await?;
            n
        };
        tracing::warn!(pending, failed, "offline queue cleared");
        Ok((pending, failed))
    }
}
