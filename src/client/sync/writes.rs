//! Optimistic writes.
//!
//! Each write is validated, applied to the local cache, then sent to the
//! backend if connected. Anything not confirmed on the spot is queued, and
//! the caller still gets `success: true`: the write is durable locally.

use super::{calculations, validation, SyncEngine, SyncError};
use crate::client::local_cache::CacheKey;
use crate::client::offline::{MutationKind, QueuedMutation, WriteStage};
use crate::client::remote::actions::{AlertStatusPayload, MachineDeletePayload, MachineEditPayload};
use crate::shared::error::SharedError;
use crate::shared::models::alert::{CONSUMPTION_ANOMALY, STATUS_OPEN};
use crate::shared::models::{
    local_id, Alert, AlertsData, DieselEntry, Extra, InventoryEntry, InventorySnapshot, Machine, MachineUpdate,
    NewEntry, NewInventory, NewMachine,
};
use crate::shared::response::ServiceResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Delete even if log entries reference the machine
    pub force: bool,
}

impl DeleteOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// One entry of the append-only deletion audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRecord {
    pub machine_name: String,
    /// The record as it was cached; `None` if the machine list was not cached
    pub machine: Option<Machine>,
    pub deleted_at: DateTime<Utc>,
    pub forced: bool,
    pub reference_count: usize,
    pub mutation_id: String,
}

enum Dispatch {
    Sent,
    Queued,
}

impl SyncEngine {
    pub async fn submit_entry(&self, entry: NewEntry) -> ServiceResponse {
        self.boundary("submit entry", self.try_submit_entry(entry)).await
    }

    pub async fn add_inventory(&self, entry: NewInventory) -> ServiceResponse {
        self.boundary("add inventory", self.try_add_inventory(entry)).await
    }

    pub async fn add_machine(&self, machine: NewMachine) -> ServiceResponse {
        self.boundary("add machine", self.try_add_machine(machine)).await
    }

    pub async fn update_machine(&self, name: &str, updates: MachineUpdate) -> ServiceResponse {
        self.boundary("update machine", self.try_update_machine(name, updates)).await
    }

    /// Refuses with `requires_confirmation` while logs reference the machine, unless forced
    pub async fn delete_machine(&self, name: &str, options: DeleteOptions) -> ServiceResponse {
        self.boundary("delete machine", self.try_delete_machine(name, options)).await
    }

    pub async fn update_alert_status(&self, alert_id: &str, status: &str) -> ServiceResponse {
        self.boundary("update alert", self.try_update_alert_status(alert_id, status)).await
    }

    /// Oldest first
    pub async fn deletion_audit(&self) -> Vec<DeletionRecord> {
        match self.cache.get(CacheKey::DeletionAudit).await {
            Ok(trail) => trail.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read deletion audit");
                Vec::new()
            }
        }
    }

    /// Re-create the most recently deleted machine with this name
    pub async fn restore_deleted_machine(&self, name: &str) -> ServiceResponse {
        let trail = self.deletion_audit().await;
        let snapshot = trail
            .iter()
            .rev()
            .filter(|record| record.machine_name.eq_ignore_ascii_case(name.trim()))
            .find_map(|record| record.machine.as_ref());

        match snapshot {
            Some(machine) => {
                tracing::info!(machine = %machine.name, "restoring deleted machine");
                self.add_machine(NewMachine::from(machine)).await
            }
            None => ServiceResponse::failure(format!("No deleted machine named {} in the audit trail", name.trim())),
        }
    }

    /// Converts every internal error into a failed response
    async fn boundary<F>(&self, operation: &'static str, write: F) -> ServiceResponse
    where
        F: Future<Output = Result<ServiceResponse, SyncError>>,
    {
        match write.await {
            Ok(response) => response,
            Err(SyncError::Validation(e)) => {
                tracing::debug!(operation, field = ?e.field(), error = %e, "write rejected by validation");
                e.into()
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "write failed");
                ServiceResponse::failure(format!("Could not {}: {}", operation, e))
            }
        }
    }

    async fn begin(&self, kind: MutationKind, payload: &impl Serialize) -> Result<QueuedMutation, SyncError> {
        let mutation = self.queue.new_mutation(kind, serde_json::to_value(payload)?);
        self.ledger.begin(&mutation.id, kind).await;
        Ok(mutation)
    }

    /// Try the backend if connected; queue otherwise or on any failure
    async fn dispatch(&self, mutation: QueuedMutation) -> Result<Dispatch, SyncError> {
        self.track(&mutation.id, WriteStage::AppliedLocally).await;

        if self.connection.is_connected().await {
            match self.gateway.send_mutation(mutation.kind, &mutation.payload).await {
                Ok(()) => {
                    tracing::info!(mutation_id = %mutation.id, kind = %mutation.kind, "write confirmed by backend");
                    self.track(&mutation.id, WriteStage::SentImmediately).await;
                    self.track(&mutation.id, WriteStage::Confirmed).await;
                    self.ledger.forget(&mutation.id).await;
                    return Ok(Dispatch::Sent);
                }
                Err(e) => {
                    tracing::warn!(mutation_id = %mutation.id, kind = %mutation.kind, error = %e, "immediate write failed, queueing");
                }
            }
        }

        // tracked as queued first: a running drain may confirm it as soon as it is pushed
        let id = mutation.id.clone();
        self.track(&id, WriteStage::Queued).await;
        if let Err(e) = self.queue.push(mutation).await {
            self.ledger.forget(&id).await;
            return Err(e.into());
        }
        Ok(Dispatch::Queued)
    }

    fn respond(dispatch: Dispatch, mutation_id: String, sent: &str, queued: &str) -> ServiceResponse {
        match dispatch {
            Dispatch::Sent => ServiceResponse {
                mutation_id: Some(mutation_id),
                ..ServiceResponse::ok(sent)
            },
            Dispatch::Queued => ServiceResponse::ok(queued).queued_as(mutation_id),
        }
    }

    async fn try_submit_entry(&self, input: NewEntry) -> Result<ServiceResponse, SyncError> {
        let machines: Option<Vec<Machine>> = self.cache.get(CacheKey::Machines).await?;
        let machine = validation::validate_entry(&input, machines.as_deref())?.cloned();

        let unit = machine.as_ref().map(|m| m.unit).unwrap_or_default();
        let usage = calculations::compute_usage(input.start_reading, input.end_reading);
        let rate = calculations::compute_rate(unit, usage, input.diesel_filled);
        let now = Utc::now();

        let entry = DieselEntry {
            id: local_id("log"),
            machine_name: machine
                .as_ref()
                .map(|m| m.name.clone())
                .unwrap_or_else(|| input.machine_name.trim().to_string()),
            start_reading: input.start_reading,
            end_reading: input.end_reading,
            diesel_filled: input.diesel_filled,
            usage,
            rate,
            remarks: input.remarks,
            phone: input.phone,
            image_url: input.image_url,
            timestamp: now,
            extra: Extra::new(),
        };
        let mutation = self.begin(MutationKind::Entry, &entry).await?;
        let ttls = self.config.cache_ttls;

        self.cache
            .update::<Vec<DieselEntry>, _, _>(CacheKey::Logs, Some(ttls.logs), |logs| {
                let mut logs = logs.unwrap_or_default();
                logs.push(entry.clone());
                (logs, ())
            })
            .await?;

        if let Some(machine) = &machine {
            let end_reading = entry.end_reading;
            self.cache
                .modify::<Vec<Machine>, _, _>(CacheKey::Machines, Some(ttls.machines), |machines| {
                    if let Some(cached) = machines.iter_mut().find(|m| m.matches_name(&machine.name)) {
                        if cached.last_reading.map_or(true, |last| end_reading > last) {
                            cached.last_reading = Some(end_reading);
                            cached.updated_at = Some(now);
                        }
                    }
                })
                .await?;

            if let Some(expected) = machine.standard_avg {
                if calculations::is_anomalous(rate, expected, self.config.anomaly_tolerance) {
                    self.flag_anomaly(machine, &entry, expected).await?;
                }
            }
        }

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        Ok(Self::respond(dispatch, id, "Entry submitted", "Entry saved offline, will sync when online").with_record(&entry))
    }

    async fn flag_anomaly(&self, machine: &Machine, entry: &DieselEntry, expected: f64) -> Result<(), SyncError> {
        let deviation = calculations::rate_deviation(entry.rate, expected).unwrap_or_default();
        let alert = Alert {
            id: local_id("alert"),
            machine_name: machine.name.clone(),
            alert_type: CONSUMPTION_ANOMALY.to_string(),
            message: format!(
                "Rate {:.2} deviates {:.0}% from the expected {:.2}",
                entry.rate,
                deviation * 100.0,
                expected
            ),
            status: STATUS_OPEN.to_string(),
            timestamp: Some(entry.timestamp),
            extra: Extra::new(),
        };
        tracing::warn!(machine = %machine.name, rate = entry.rate, expected, "consumption anomaly flagged");

        self.cache
            .update::<AlertsData, _, _>(CacheKey::Alerts, Some(self.config.cache_ttls.alerts), |data| {
                let mut data = data.unwrap_or_default();
                data.alerts.push(alert);
                (data, ())
            })
            .await?;
        Ok(())
    }

    async fn try_add_inventory(&self, input: NewInventory) -> Result<ServiceResponse, SyncError> {
        let snapshot: Option<InventorySnapshot> = self.cache.get(CacheKey::Inventory).await?;
        validation::validate_inventory(&input, snapshot.as_ref().map(|s| s.current_stock))?;

        let entry = InventoryEntry {
            id: local_id("inv"),
            kind: input.kind,
            litres: input.litres,
            note: input.note,
            receipt_number: input.receipt_number,
            timestamp: Utc::now(),
            extra: Extra::new(),
        };
        let mutation = self.begin(MutationKind::Inventory, &entry).await?;

        let stock = self
            .cache
            .update::<InventorySnapshot, _, _>(CacheKey::Inventory, Some(self.config.cache_ttls.inventory), |snapshot| {
                let mut snapshot = snapshot.unwrap_or_default();
                snapshot.record(entry.clone());
                let stock = snapshot.current_stock;
                (snapshot, stock)
            })
            .await?;
        tracing::debug!(current_stock = stock, "inventory applied locally");

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        Ok(Self::respond(
            dispatch,
            id,
            "Inventory updated",
            "Inventory saved offline, will sync when online",
        )
        .with_record(&entry))
    }

    async fn try_add_machine(&self, input: NewMachine) -> Result<ServiceResponse, SyncError> {
        let existing: Vec<Machine> = self.cache.get(CacheKey::Machines).await?.unwrap_or_default();
        validation::validate_new_machine(&input, &existing)?;

        let now = Utc::now();
        let machine = Machine {
            id: local_id("machine"),
            name: input.name.trim().to_string(),
            plate: input.plate.trim().to_string(),
            machine_type: input.machine_type,
            unit: input.unit,
            ownership: input.ownership,
            standard_avg: input.standard_avg,
            initial_reading: input.initial_reading,
            last_reading: Some(input.initial_reading),
            status: Some("active".to_string()),
            created_at: Some(now),
            updated_at: Some(now),
            extra: Extra::new(),
        };
        let mutation = self.begin(MutationKind::Machine, &machine).await?;

        self.cache
            .update::<Vec<Machine>, _, _>(CacheKey::Machines, Some(self.config.cache_ttls.machines), |machines| {
                let mut machines = machines.unwrap_or_default();
                machines.push(machine.clone());
                (machines, ())
            })
            .await?;

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        Ok(Self::respond(dispatch, id, "Machine added", "Machine saved offline, will sync when online")
            .with_record(&machine))
    }

    async fn try_update_machine(&self, name: &str, updates: MachineUpdate) -> Result<ServiceResponse, SyncError> {
        let machines: Option<Vec<Machine>> = self.cache.get(CacheKey::Machines).await?;
        validation::validate_machine_update(name, &updates, machines.as_deref())?;

        let payload = MachineEditPayload {
            machine_name: name.trim().to_string(),
            updates,
            updated_at: Utc::now(),
        };
        let mutation = self.begin(MutationKind::MachineUpdate, &payload).await?;

        let updated = self
            .cache
            .modify::<Vec<Machine>, _, _>(CacheKey::Machines, Some(self.config.cache_ttls.machines), |machines| {
                machines.iter_mut().find(|m| m.matches_name(name)).map(|machine| {
                    machine.apply(&payload.updates);
                    machine.updated_at = Some(payload.updated_at);
                    machine.clone()
                })
            })
            .await?
            .flatten();

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        let response = Self::respond(dispatch, id, "Machine updated", "Machine update saved offline, will sync when online");
        Ok(match updated {
            Some(machine) => response.with_record(&machine),
            None => response,
        })
    }

    async fn try_delete_machine(&self, name: &str, options: DeleteOptions) -> Result<ServiceResponse, SyncError> {
        if name.trim().is_empty() {
            return Err(SharedError::validation("machine_name", "Machine name is required").into());
        }

        let logs: Vec<DieselEntry> = self.cache.get(CacheKey::Logs).await?.unwrap_or_default();
        let reference_count = logs.iter().filter(|log| log.machine_name.trim().eq_ignore_ascii_case(name.trim())).count();
        if reference_count > 0 && !options.force {
            tracing::info!(machine = name, reference_count, "delete needs confirmation");
            return Ok(ServiceResponse::needs_confirmation(
                format!(
                    "Machine {} is referenced by {} log entries. Delete anyway?",
                    name.trim(),
                    reference_count
                ),
                reference_count,
            ));
        }

        let machines: Option<Vec<Machine>> = self.cache.get(CacheKey::Machines).await?;
        let snapshot = machines
            .as_ref()
            .and_then(|list| list.iter().find(|m| m.matches_name(name)).cloned());
        if machines.is_some() && snapshot.is_none() {
            return Err(SharedError::validation("machine_name", format!("Machine not found: {}", name.trim())).into());
        }

        let payload = MachineDeletePayload {
            machine_name: snapshot
                .as_ref()
                .map(|m| m.name.clone())
                .unwrap_or_else(|| name.trim().to_string()),
            force: options.force,
            deleted_at: Utc::now(),
        };
        let mutation = self.begin(MutationKind::MachineDelete, &payload).await?;

        let record = DeletionRecord {
            machine_name: payload.machine_name.clone(),
            machine: snapshot,
            deleted_at: payload.deleted_at,
            forced: options.force,
            reference_count,
            mutation_id: mutation.id.clone(),
        };
        self.cache
            .update::<Vec<DeletionRecord>, _, _>(CacheKey::DeletionAudit, None, |trail| {
                let mut trail = trail.unwrap_or_default();
                trail.push(record);
                (trail, ())
            })
            .await?;

        self.cache
            .modify::<Vec<Machine>, _, _>(CacheKey::Machines, Some(self.config.cache_ttls.machines), |machines| {
                machines.retain(|m| !m.matches_name(name));
            })
            .await?;
        tracing::info!(machine = %payload.machine_name, forced = options.force, "machine deleted locally");

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        Ok(Self::respond(dispatch, id, "Machine deleted", "Machine deletion saved offline, will sync when online"))
    }

    async fn try_update_alert_status(&self, alert_id: &str, status: &str) -> Result<ServiceResponse, SyncError> {
        validation::validate_alert_status(alert_id, status)?;

        let payload = AlertStatusPayload {
            alert_id: alert_id.trim().to_string(),
            status: status.to_string(),
            updated_at: Utc::now(),
        };
        let mutation = self.begin(MutationKind::AlertUpdate, &payload).await?;

        self.cache
            .modify::<AlertsData, _, _>(CacheKey::Alerts, Some(self.config.cache_ttls.alerts), |data| {
                if let Some(alert) = data.alerts.iter_mut().find(|a| a.id == payload.alert_id) {
                    alert.status = payload.status.clone();
                }
            })
            .await?;

        let id = mutation.id.clone();
        let dispatch = self.dispatch(mutation).await?;
        Ok(Self::respond(dispatch, id, "Alert updated", "Alert update saved offline, will sync when online"))
    }
}
