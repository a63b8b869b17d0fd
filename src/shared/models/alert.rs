use super::Extra;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_OPEN: &str = "open";
pub const CONSUMPTION_ANOMALY: &str = "consumption_anomaly";

/// A consumption anomaly or operational alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub machine_name: String,
    #[serde(default)]
    pub alert_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Extra,
}

fn default_status() -> String {
    STATUS_OPEN.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsData {
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl AlertsData {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.status == STATUS_OPEN).count()
    }
}
