//! # Reconciliation
//!
//! Remote reads replace the cached dataset wholesale, which would hide every
//! write still waiting in the offline queue. Before a dataset is cached or
//! returned, the pending mutations are replayed onto it locally so optimistic
//! writes stay visible until the backend confirms them.
//!
//! Records carry their locally-assigned id, so an overlay never duplicates a
//! record the backend already has.

use crate::client::offline::queue::{MutationKind, QueuedMutation};
use crate::client::remote::actions::{AlertStatusPayload, MachineDeletePayload, MachineEditPayload};
use crate::shared::models::{AlertsData, DieselEntry, InventoryEntry, InventorySnapshot, Machine};
use serde::de::DeserializeOwned;

/// A dataset pending mutations can be replayed onto
pub trait PendingOverlay {
    /// Apply every relevant mutation, in the order they were made; returns how many applied
    fn overlay(&mut self, pending: &[QueuedMutation]) -> usize {
        let mut ordered: Vec<&QueuedMutation> = pending.iter().collect();
        ordered.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));
        ordered.into_iter().filter(|m| self.apply_one(m)).count()
    }

    /// Apply one mutation if it concerns this dataset and is not already reflected
    fn apply_one(&mut self, mutation: &QueuedMutation) -> bool;
}

fn decode<T: DeserializeOwned>(mutation: &QueuedMutation) -> Option<T> {
    match serde_json::from_value(mutation.payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(mutation_id = %mutation.id, kind = %mutation.kind, error = %e, "undecodable queued payload");
            None
        }
    }
}

impl PendingOverlay for Vec<DieselEntry> {
    fn apply_one(&mut self, mutation: &QueuedMutation) -> bool {
        if mutation.kind != MutationKind::Entry {
            return false;
        }
        let Some(entry) = decode::<DieselEntry>(mutation) else {
            return false;
        };
        if self.iter().any(|e| !entry.id.is_empty() && e.id == entry.id) {
            return false;
        }
        self.push(entry);
        true
    }
}

impl PendingOverlay for Vec<Machine> {
    fn apply_one(&mut self, mutation: &QueuedMutation) -> bool {
        match mutation.kind {
            MutationKind::Machine => {
                let Some(machine) = decode::<Machine>(mutation) else {
                    return false;
                };
                if self.iter().any(|m| m.matches_name(&machine.name)) {
                    return false;
                }
                self.push(machine);
                true
            }
            MutationKind::MachineUpdate => {
                let Some(edit) = decode::<MachineEditPayload>(mutation) else {
                    return false;
                };
                match self.iter_mut().find(|m| m.matches_name(&edit.machine_name)) {
                    Some(machine) => {
                        machine.apply(&edit.updates);
                        machine.updated_at = Some(edit.updated_at);
                        true
                    }
                    None => false,
                }
            }
            MutationKind::MachineDelete => {
                let Some(delete) = decode::<MachineDeletePayload>(mutation) else {
                    return false;
                };
                let before = self.len();
                self.retain(|m| !m.matches_name(&delete.machine_name));
                self.len() != before
            }
            _ => false,
        }
    }
}

impl PendingOverlay for InventorySnapshot {
    fn apply_one(&mut self, mutation: &QueuedMutation) -> bool {
        if mutation.kind != MutationKind::Inventory {
            return false;
        }
        let Some(entry) = decode::<InventoryEntry>(mutation) else {
            return false;
        };
        if self.transactions.iter().any(|t| !entry.id.is_empty() && t.id == entry.id) {
            return false;
        }
        self.record(entry);
        true
    }
}

impl PendingOverlay for AlertsData {
    fn apply_one(&mut self, mutation: &QueuedMutation) -> bool {
        if mutation.kind != MutationKind::AlertUpdate {
            return false;
        }
        let Some(update) = decode::<AlertStatusPayload>(mutation) else {
            return false;
        };
        match self.alerts.iter_mut().find(|a| a.id == update.alert_id) {
            Some(alert) if alert.status != update.status => {
                alert.status = update.status;
                true
            }
            _ => false,
        }
    }
}
