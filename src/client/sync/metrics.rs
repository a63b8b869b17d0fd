//! # Drain Metrics
//!
//! Counters over queue drain passes, reported with the queue status.

use crate::client::offline::DrainReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainMetrics {
    /// Passes that attempted at least one item
    pub passes: u64,
    pub replayed: u64,
    pub failed_attempts: u64,
    pub exhausted: u64,
    pub stopped_early: u64,
    pub last_drain_at: Option<DateTime<Utc>>,
    pub last_drain_duration: Option<Duration>,
    pub average_drain_duration: Duration,
}

impl DrainMetrics {
    pub fn record_pass(&mut self, report: &DrainReport, duration: Duration) {
        if report.attempted == 0 {
            return;
        }
        self.passes += 1;
        self.replayed += report.replayed.len() as u64;
        self.failed_attempts += (report.retrying + report.exhausted.len()) as u64;
        self.exhausted += report.exhausted.len() as u64;
        if report.stopped_early {
            self.stopped_early += 1;
        }
        self.last_drain_at = Some(Utc::now());
        self.last_drain_duration = Some(duration);

        // Rolling average
        let passes = u32::try_from(self.passes).unwrap_or(u32::MAX);
        let total = self.average_drain_duration * (passes - 1) + duration;
        self.average_drain_duration = total / passes;
    }

    /// Share of attempts the backend accepted
    pub fn success_rate(&self) -> f64 {
        let attempts = self.replayed + self.failed_attempts;
        if attempts == 0 {
            0.0
        } else {
            self.replayed as f64 / attempts as f64
        }
    }
}
