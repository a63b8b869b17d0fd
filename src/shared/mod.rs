//! Shared Module
//!
//! This module contains the types the sync core hands to its callers and
//! exchanges with the remote endpoint. Nothing here touches I/O.
//!
//! # Overview
//!
//! - `models` - machines, diesel log entries, inventory movements, alerts
//! - `response` - the uniform `{success, message}` envelope and read results
//! - `error` - validation and serialization errors
//! - `config` - validated configuration, builder and TOML file format

/// Domain records
pub mod models;

/// Caller-facing result envelopes
pub mod response;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, BackoffStrategy, CacheTtls, ConfigError};
pub use error::SharedError;
pub use response::{DataSource, ReadResult, ServiceResponse};
