use super::Extra;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A meter reading + fuel fill logged by an operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DieselEntry {
    #[serde(default)]
    pub id: String,
    pub machine_name: String,
    pub start_reading: f64,
    pub end_reading: f64,
    pub diesel_filled: f64,
    #[serde(default)]
    pub usage: f64,
    #[serde(default)]
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "imageURL")]
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Caller input for a new log entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub machine_name: String,
    pub start_reading: f64,
    pub end_reading: f64,
    pub diesel_filled: f64,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Local filter over the log list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    pub machine_name: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn for_machine(name: impl Into<String>) -> Self {
        Self {
            machine_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &DieselEntry) -> bool {
        if let Some(name) = &self.machine_name {
            if !entry.machine_name.trim().eq_ignore_ascii_case(name.trim()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }

    /// Filter, newest first, then truncate to `limit`
    pub fn apply(&self, logs: Vec<DieselEntry>) -> Vec<DieselEntry> {
        let mut selected: Vec<DieselEntry> = logs.into_iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
