//! Client Module
//!
//! The offline-first sync core, bottom-up:
//!
//! - `local_cache` - durable key-value store with per-entry TTL (SQLite)
//! - `remote` - HTTP gateway to the scripted endpoint
//! - `offline` - mutation queue, retry policy, write lifecycle, pending overlays
//! - `sync` - connection monitor, network observers and the [`SyncEngine`]
//! - `config` - environment and file configuration for hosts

pub mod config;
pub mod local_cache;
pub mod offline;
pub mod remote;
pub mod sync;

pub use config::Config;
pub use sync::SyncEngine;
