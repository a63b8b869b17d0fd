use super::Extra;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a machine's meter advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UsageUnit {
    /// Hour meter; rate is litres per hour
    #[default]
    #[serde(rename = "hr", alias = "hours", alias = "hrs", alias = "Hours")]
    Hours,
    /// Odometer; rate is kilometres per litre
    #[serde(rename = "km", alias = "kilometers", alias = "KM", alias = "Kilometers")]
    Kilometers,
}

impl UsageUnit {
    pub fn is_distance(self) -> bool {
        matches!(self, UsageUnit::Kilometers)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plate: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default, alias = "unitType")]
    pub unit: UsageUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<String>,
    /// Expected consumption rate, in the unit's rate convention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_avg: Option<f64>,
    #[serde(default)]
    pub initial_reading: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Machine {
    /// Case-insensitive name match, the way operators type machine names
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }

    pub fn matches_plate(&self, plate: &str) -> bool {
        !plate.trim().is_empty() && self.plate.trim().eq_ignore_ascii_case(plate.trim())
    }

    /// Apply a partial update; `updated_at` is stamped by the caller
    pub fn apply(&mut self, update: &MachineUpdate) {
        if let Some(plate) = &update.plate {
            self.plate = plate.trim().to_string();
        }
        if let Some(machine_type) = &update.machine_type {
            self.machine_type = machine_type.clone();
        }
        if let Some(unit) = update.unit {
            self.unit = unit;
        }
        if let Some(ownership) = &update.ownership {
            self.ownership = Some(ownership.clone());
        }
        if let Some(avg) = update.standard_avg {
            self.standard_avg = Some(avg);
        }
        if let Some(status) = &update.status {
            self.status = Some(status.clone());
        }
        if let Some(reading) = update.last_reading {
            self.last_reading = Some(reading);
        }
    }
}

/// Caller input for creating a machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMachine {
    pub name: String,
    pub plate: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub unit: UsageUnit,
    #[serde(default)]
    pub ownership: Option<String>,
    #[serde(default)]
    pub standard_avg: Option<f64>,
    #[serde(default)]
    pub initial_reading: f64,
}

impl From<&Machine> for NewMachine {
    fn from(machine: &Machine) -> Self {
        Self {
            name: machine.name.clone(),
            plate: machine.plate.clone(),
            machine_type: machine.machine_type.clone(),
            unit: machine.unit,
            ownership: machine.ownership.clone(),
            standard_avg: machine.standard_avg,
            initial_reading: machine.initial_reading,
        }
    }
}

/// Partial machine update; `None` leaves the field alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<UsageUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reading: Option<f64>,
}

impl MachineUpdate {
    pub fn is_empty(&self) -> bool {
        *self == MachineUpdate::default()
    }
}
