//! Input rules checked before any write touches local state.
//!
//! Every failure names the offending field; nothing is cached or queued
//! for a write that fails here.

use crate::shared::error::SharedError;
use crate::shared::models::{InventoryKind, Machine, MachineUpdate, NewEntry, NewInventory, NewMachine};

/// Largest single fill accepted, in litres
pub const MAX_DIESEL_PER_FILL: f64 = 2000.0;

pub const ALERT_STATUSES: [&str; 4] = ["open", "acknowledged", "resolved", "dismissed"];

type Result<T> = std::result::Result<T, SharedError>;

fn required(field: &str, value: &str, label: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SharedError::validation(field, format!("{} is required", label)));
    }
    Ok(())
}

fn non_negative(field: &str, value: f64, label: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SharedError::validation(
            field,
            format!("{} must be a non-negative number", label),
        ));
    }
    Ok(())
}

fn find<'a>(machines: &'a [Machine], name: &str) -> Option<&'a Machine> {
    machines.iter().find(|m| m.matches_name(name))
}

/// Checks a log entry; returns the referenced machine when the machine list is cached
///
/// Without a cached machine list the machine cannot be checked and is accepted.
pub fn validate_entry<'a>(entry: &NewEntry, machines: Option<&'a [Machine]>) -> Result<Option<&'a Machine>> {
    required("machine_name", &entry.machine_name, "Machine name")?;
    non_negative("start_reading", entry.start_reading, "Start reading")?;
    non_negative("end_reading", entry.end_reading, "End reading")?;
    if entry.end_reading <= entry.start_reading {
        return Err(SharedError::validation(
            "end_reading",
            "End reading must be greater than start reading",
        ));
    }
    non_negative("diesel_filled", entry.diesel_filled, "Diesel filled")?;
    if entry.diesel_filled > MAX_DIESEL_PER_FILL {
        return Err(SharedError::validation(
            "diesel_filled",
            format!("Diesel filled cannot exceed {} L", MAX_DIESEL_PER_FILL),
        ));
    }

    let Some(machines) = machines else {
        return Ok(None);
    };
    match find(machines, &entry.machine_name) {
        Some(machine) => Ok(Some(machine)),
        None => Err(SharedError::validation(
            "machine_name",
            format!("Unknown machine: {}", entry.machine_name.trim()),
        )),
    }
}

/// `current_stock` is the cached balance, if any
pub fn validate_inventory(input: &NewInventory, current_stock: Option<f64>) -> Result<()> {
    if !input.litres.is_finite() || input.litres <= 0.0 {
        return Err(SharedError::validation("litres", "Litres must be greater than zero"));
    }
    if input.kind == InventoryKind::Out {
        if let Some(stock) = current_stock {
            if input.litres > stock {
                return Err(SharedError::validation(
                    "litres",
                    format!("Cannot issue {} L: only {} L in stock", input.litres, stock),
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_new_machine(input: &NewMachine, existing: &[Machine]) -> Result<()> {
    required("name", &input.name, "Machine name")?;
    required("plate", &input.plate, "Plate number")?;
    non_negative("initial_reading", input.initial_reading, "Initial reading")?;
    if let Some(avg) = input.standard_avg {
        if !avg.is_finite() || avg <= 0.0 {
            return Err(SharedError::validation("standard_avg", "Standard average must be greater than zero"));
        }
    }
    if find(existing, &input.name).is_some() {
        return Err(SharedError::validation(
            "name",
            format!("A machine named {} already exists", input.name.trim()),
        ));
    }
    if existing.iter().any(|m| m.matches_plate(&input.plate)) {
        return Err(SharedError::validation(
            "plate",
            format!("Plate {} is already registered", input.plate.trim()),
        ));
    }
    Ok(())
}

/// Without a cached machine list the target cannot be checked and is accepted
pub fn validate_machine_update(name: &str, update: &MachineUpdate, machines: Option<&[Machine]>) -> Result<()> {
    required("machine_name", name, "Machine name")?;
    if update.is_empty() {
        return Err(SharedError::validation("updates", "No changes to apply"));
    }
    if let Some(plate) = &update.plate {
        required("plate", plate, "Plate number")?;
    }
    if let Some(avg) = update.standard_avg {
        if !avg.is_finite() || avg <= 0.0 {
            return Err(SharedError::validation("standard_avg", "Standard average must be greater than zero"));
        }
    }
    if let Some(reading) = update.last_reading {
        non_negative("last_reading", reading, "Last reading")?;
    }

    let Some(machines) = machines else {
        return Ok(());
    };
    if find(machines, name).is_none() {
        return Err(SharedError::validation(
            "machine_name",
            format!("Machine not found: {}", name.trim()),
        ));
    }
    if let Some(plate) = &update.plate {
        if machines.iter().any(|m| !m.matches_name(name) && m.matches_plate(plate)) {
            return Err(SharedError::validation(
                "plate",
                format!("Plate {} is already registered", plate.trim()),
            ));
        }
    }
    Ok(())
}

pub fn validate_alert_status(alert_id: &str, status: &str) -> Result<()> {
    required("alert_id", alert_id, "Alert id")?;
    if !ALERT_STATUSES.contains(&status) {
        return Err(SharedError::validation(
            "status",
            format!("Unknown alert status '{}'; expected one of {}", status, ALERT_STATUSES.join(", ")),
        ));
    }
    Ok(())
}
