//! Marshal Offline - client-side action queue and sync
//!
//! Mutations made on a device are queued first and replayed later:
//! - [`OfflineQueue`]: durable FIFO of [`OfflineAction`]s
//! - [`SyncEngine`]: bounded-retry replay with permanent-failure detection
//! - [`SyncScheduler`]: one owned, jittered drain timer per session
//! - [`OptimisticOverlay`]: queued actions shown before they are confirmed
//! - [`EngineTransport`]: in-process replay against a `ChecklistEngine`

#![warn(unreachable_pub)]

pub mod action;
pub mod config;
pub mod engine_transport;
pub mod error;
pub mod optimistic;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod transport;

pub use action::{
    ActionPayload, ActionStatus, ActionType, CheckInPayload, ChecklistActionPayload, OfflineAction, PermanentFailure,
};
pub use config::SyncConfig;
pub use engine_transport::EngineTransport;
pub use error::{QueueError, TransportError};
pub use optimistic::{OptimisticOverlay, OverlaidTask};
pub use queue::{JsonFileQueueStorage, MemoryQueueStorage, OfflineQueue, QueueState, QueueStorage, RetryState};
pub use scheduler::{SyncHandle, SyncScheduler};
pub use sync::{DrainReport, SyncEngine};
pub use transport::{ActionTransport, AlwaysOnline, ConnectivityProbe, HealthProbe};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
