//! Domain records mirrored between the local cache and the remote store.
//!
//! The sync core treats these as payloads. It only computes or stamps the
//! fields it owns (`usage`, `rate`, ids and timestamps); everything else the
//! backend sends rides along in each record's `extra` map untouched.

pub mod alert;
pub mod entry;
pub mod inventory;
pub mod machine;

pub use alert::{Alert, AlertsData};
pub use entry::{DieselEntry, LogFilter, NewEntry};
pub use inventory::{InventoryEntry, InventoryKind, InventorySnapshot, NewInventory};
pub use machine::{Machine, MachineUpdate, NewMachine, UsageUnit};

/// Opaque fields carried through from the backend
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Generate a locally-assigned record id, so reconciliation can deduplicate
pub fn local_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
