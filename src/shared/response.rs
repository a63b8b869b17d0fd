//! Caller-facing result envelopes.
//!
//! No error escapes the sync engine: writes answer with a [`ServiceResponse`]
//! and reads with a [`ReadResult`] that says where the data came from.

use crate::shared::error::SharedError;
use serde::Serialize;

/// Uniform write result: `{success, message}` plus optional structured fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub success: bool,
    pub message: String,
    /// The write is durable locally but still waiting for the backend
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_id: Option<String>,
    /// The record as stored locally (with computed fields and stamps)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
    /// Validation failures name the offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_count: Option<usize>,
}

impl ServiceResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            queued: false,
            mutation_id: None,
            record: None,
            field: None,
            requires_confirmation: false,
            reference_count: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(message)
        }
    }

    /// A guard refused the write until the caller confirms
    pub fn needs_confirmation(message: impl Into<String>, reference_count: usize) -> Self {
        Self {
            requires_confirmation: true,
            reference_count: Some(reference_count),
            ..Self::failure(message)
        }
    }

    pub fn with_record<T: Serialize>(mut self, record: &T) -> Self {
        self.record = serde_json::to_value(record).ok();
        self
    }

    pub fn queued_as(mut self, mutation_id: impl Into<String>) -> Self {
        self.queued = true;
        self.mutation_id = Some(mutation_id.into());
        self
    }
}

impl From<SharedError> for ServiceResponse {
    fn from(err: SharedError) -> Self {
        let field = err.field().map(str::to_string);
        Self {
            field,
            ..Self::failure(err.detail())
        }
    }
}

/// Where a read's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSource {
    /// Fresh from the backend
    Remote,
    /// Local cache (offline, or the remote fetch failed)
    Cache,
    /// Nothing cached, but real data has been seen before
    Empty,
    /// Seeded demo data, only before the first successful remote read
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult<T> {
    pub data: T,
    pub source: DataSource,
    /// Why the read degraded, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ReadResult<T> {
    pub fn remote(data: T) -> Self {
        Self {
            data,
            source: DataSource::Remote,
            error: None,
        }
    }

    pub fn degraded(data: T, source: DataSource, error: Option<String>) -> Self {
        Self { data, source, error }
    }

    pub fn is_fresh(&self) -> bool {
        self.source == DataSource::Remote
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReadResult<U> {
        ReadResult {
            data: f(self.data),
            source: self.source,
            error: self.error,
        }
    }
}
