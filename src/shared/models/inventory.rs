use super::Extra;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InventoryKind {
    #[serde(alias = "in", alias = "Stock In")]
    In,
    #[serde(alias = "out", alias = "Stock Out")]
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InventoryKind,
    pub litres: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl InventoryEntry {
    /// Signed effect on the running balance
    pub fn signed_litres(&self) -> f64 {
        match self.kind {
            InventoryKind::In => self.litres,
            InventoryKind::Out => -self.litres,
        }
    }
}

/// Ledger of stock movements plus the running balance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    #[serde(default)]
    pub transactions: Vec<InventoryEntry>,
    #[serde(default)]
    pub current_stock: f64,
}

impl InventorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.current_stock == 0.0
    }

    /// Append a movement and move the running balance with it
    pub fn record(&mut self, entry: InventoryEntry) {
        self.current_stock += entry.signed_litres();
        self.transactions.push(entry);
    }
}

/// Caller input for a stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInventory {
    #[serde(rename = "type")]
    pub kind: InventoryKind,
    pub litres: f64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
}
