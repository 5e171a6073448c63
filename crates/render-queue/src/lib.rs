//! In-process render job queue.
//!
//! This crate provides:
//! - Priority-ordered queueing with FIFO inside each priority band
//! - Dependency-gated dispatch under a concurrency ceiling
//! - Completion monitoring with a per-job timeout
//! - Queue statistics, wait estimates and lifecycle events
//! - Periodic pruning of old completion records

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod ticker;

mod janitor;
mod monitor;
mod state;
mod stats;

pub use config::SchedulerConfig;
pub use error::{QueueError, QueueResult};
pub use events::{EventChannel, QueueEvent};
pub use logging::JobLogger;
pub use provider::{InMemoryJobProvider, JobRecordProvider};
pub use scheduler::RenderQueue;
pub use state::CompletionRecord;
pub use store::QueueStore;
pub use ticker::RepeatingTask;

pub use render_queue_models::{
    EntryId, JobId, Priority, PriorityBreakdown, QueueEntry, QueueStats, RenderJobRecord, RenderJobStatus,
};
