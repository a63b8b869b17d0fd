//! # Write Lifecycle
//!
//! Every write moves through
//! `Validated -> AppliedLocally -> {SentImmediately | Queued} -> {Confirmed | RetryExhausted}`.
//! The ledger tracks the stage of each write by mutation id and refuses any
//! transition outside that graph; a write never goes back from `Queued` to
//! `AppliedLocally`.
//!
//! A failed mutation that is requeued by hand starts a new lifecycle at
//! `Queued`.

use crate::client::offline::queue::MutationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteStage {
    Validated,
    AppliedLocally,
    SentImmediately,
    Queued,
    Confirmed,
    RetryExhausted,
}

impl WriteStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, WriteStage::Confirmed | WriteStage::RetryExhausted)
    }

    pub fn can_advance_to(self, next: WriteStage) -> bool {
        use WriteStage::*;
        matches!(
            (self, next),
            (Validated, AppliedLocally)
                | (AppliedLocally, SentImmediately)
                | (AppliedLocally, Queued)
                | (SentImmediately, Confirmed)
                | (Queued, Confirmed)
                | (Queued, RetryExhausted)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("no write with id {0}")]
    Unknown(String),
    #[error("illegal write transition {from:?} -> {to:?}")]
    IllegalTransition { from: WriteStage, to: WriteStage },
}

/// Stage history of one write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRecord {
    pub mutation_id: String,
    pub kind: MutationKind,
    pub stage: WriteStage,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<WriteStage>,
}

#[derive(Debug, Default)]
pub struct WriteLedger {
    records: RwLock<HashMap<String, WriteRecord>>,
}

impl WriteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a write that just passed validation
    pub async fn begin(&self, mutation_id: &str, kind: MutationKind) {
        self.insert(mutation_id, kind, WriteStage::Validated).await;
    }

    /// Track a requeued write as a fresh lifecycle at `Queued`
    pub async fn restart(&self, mutation_id: &str, kind: MutationKind) {
        self.insert(mutation_id, kind, WriteStage::Queued).await;
    }

    async fn insert(&self, mutation_id: &str, kind: MutationKind, stage: WriteStage) {
        let now = Utc::now();
        let record = WriteRecord {
            mutation_id: mutation_id.to_string(),
            kind,
            stage,
            started_at: now,
            updated_at: now,
            history: vec![stage],
        };
        self.records.write().await.insert(mutation_id.to_string(), record);
    }

    pub async fn advance(&self, mutation_id: &str, next: WriteStage) -> Result<WriteStage, LifecycleError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(mutation_id)
            .ok_or_else(|| LifecycleError::Unknown(mutation_id.to_string()))?;

        if !record.stage.can_advance_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: record.stage,
                to: next,
            });
        }
        record.stage = next;
        record.updated_at = Utc::now();
        record.history.push(next);
        Ok(next)
    }

    pub async fn stage(&self, mutation_id: &str) -> Option<WriteStage> {
        self.records.read().await.get(mutation_id).map(|r| r.stage)
    }

    pub async fn get(&self, mutation_id: &str) -> Option<WriteRecord> {
        self.records.read().await.get(mutation_id).cloned()
    }

    /// Writes not yet in a terminal stage, oldest first
    pub async fn pending(&self) -> Vec<WriteRecord> {
        let records = self.records.read().await;
        let mut pending: Vec<WriteRecord> = records.values().filter(|r| !r.stage.is_terminal()).cloned().collect();
        pending.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        pending
    }

    /// Forget finished writes; returns how many
    pub async fn prune_terminal(&self) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.stage.is_terminal());
        before - records.len()
    }

    pub async fn forget(&self, mutation_id: &str) {
        self.records.write().await.remove(mutation_id);
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}
