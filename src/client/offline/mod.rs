//! # Offline Writes
//!
//! Everything that keeps a write alive while the backend is out of reach.
//!
//! ## Key Components
//!
//! - `queue.rs`: durable priority queue of pending mutations and its drain
//! - `retry.rs`: replay budgets and backoff between attempts
//! - `optimistic.rs`: per-write lifecycle ledger
//! - `reconciliation.rs`: keeps pending writes visible over fresh remote reads

pub mod optimistic;
pub mod queue;
pub mod reconciliation;
pub mod retry;

pub use optimistic::{LifecycleError, WriteLedger, WriteRecord, WriteStage};
pub use queue::{
    DrainMode, DrainReport, DrainSkip, FailedMutation, MutationKind, MutationReplayer, OfflineQueue, QueueStatus,
    QueuedMutation,
};
pub use reconciliation::PendingOverlay;
pub use retry::RetryPolicy;
