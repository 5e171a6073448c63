//! Shared data models for the render job queue.
//!
//! This crate provides Serde-serializable types for:
//! - Render job references and status snapshots
//! - Queue entries and scheduling priorities
//! - Queue statistics

pub mod entry;
pub mod job;
pub mod stats;

// Re-export common types
pub use entry::{EntryId, Priority, QueueEntry};
pub use job::{JobId, RenderJobRecord, RenderJobStatus};
pub use stats::{PriorityBreakdown, QueueStats};
