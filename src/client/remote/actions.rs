//! Action names and payload shapes of the remote scripted endpoint.

use crate::client::offline::MutationKind;
use crate::shared::models::MachineUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TEST_BACKEND: &str = "testBackend";
pub const GET_MACHINES: &str = "getMachines";
pub const GET_INVENTORY: &str = "getInventory";
pub const GET_LOGS: &str = "getLogsEnhanced";
pub const GET_ALERTS: &str = "getAlertsData";

pub const SUBMIT_ENTRY: &str = "submitEntryEnhanced";
pub const ADD_INVENTORY: &str = "addInventory";
pub const ADD_MACHINE: &str = "addMachineEnhanced";
pub const EDIT_MACHINE: &str = "editMachine";
pub const DELETE_MACHINE: &str = "deleteMachine";
pub const UPDATE_ALERT_STATUS: &str = "updateAlertStatus";

/// Remote action that applies a mutation kind
pub fn action_for(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::Entry => SUBMIT_ENTRY,
        MutationKind::Inventory => ADD_INVENTORY,
        MutationKind::Machine => ADD_MACHINE,
        MutationKind::MachineUpdate => EDIT_MACHINE,
        MutationKind::MachineDelete => DELETE_MACHINE,
        MutationKind::AlertUpdate => UPDATE_ALERT_STATUS,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineEditPayload {
    pub machine_name: String,
    pub updates: MachineUpdate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeletePayload {
    pub machine_name: String,
    pub force: bool,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatusPayload {
    pub alert_id: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}
