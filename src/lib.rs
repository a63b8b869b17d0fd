//! dieselsync - offline-first sync core for diesel tracking
//!
//! Field crews log diesel fills, stock movements and machine changes from
//! devices with unreliable connectivity. Every write lands in a local cache
//! first and is replayed to the remote endpoint when the backend is reachable.
//!
//! # Module Structure
//!
//! - **`shared`** - records, response envelopes, errors and configuration
//! - **`client`** - cache, connectivity, offline queue, gateway and engine
//!
//! # Usage
//!
//! ```rust,no_run
//! use dieselsync::client::{Config, SyncEngine};
//! use dieselsync::shared::models::NewEntry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let engine = SyncEngine::open(&config, None).await?;
//!
//! let response = engine
//!     .submit_entry(NewEntry {
//!         machine_name: "Excavator JCB-220".into(),
//!         start_reading: 1250.0,
//!         end_reading: 1258.5,
//!         diesel_filled: 64.0,
//!         ..Default::default()
//!     })
//!     .await;
//! assert!(response.success);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod shared;
