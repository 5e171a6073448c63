//! Queue entries: the scheduler-owned wrapper around a render job.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::JobId;

/// Unique identifier for a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Generate a new random entry ID.
    pub fn new() -> Self {
        Self(format!("queue_{}", Uuid::new_v4().simple()))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling priority.
///
/// Variants are declared lowest first so the derived `Ord` gives
/// `Urgent > High > Normal > Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// All bands, highest first.
    pub const ALL: [Priority; 4] = [Priority::Urgent, Priority::High, Priority::Normal, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// A render job waiting in (or dispatched from) the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueEntry {
    /// Unique entry ID
    pub id: EntryId,

    /// Referenced render job
    pub job_id: JobId,

    /// Scheduling priority
    #[serde(default)]
    pub priority: Priority,

    /// When the entry was enqueued
    pub added_at: DateTime<Utc>,

    /// Processing time hint, used only for wait estimates
    #[serde(
        default,
        rename = "estimated_processing_time_ms",
        with = "duration_ms",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<u64>")]
    pub estimated_processing_time: Option<Duration>,

    /// Jobs that must complete before this entry may be dispatched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<JobId>,
}

impl QueueEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(job_id: impl Into<JobId>, priority: Priority) -> Self {
        Self {
            id: EntryId::new(),
            job_id: job_id.into(),
            priority,
            added_at: Utc::now(),
            estimated_processing_time: None,
            dependencies: Vec::new(),
        }
    }

    /// Set the processing time hint.
    pub fn with_estimate(mut self, estimate: Option<Duration>) -> Self {
        self.estimated_processing_time = estimate;
        self
    }

    /// Set the dependency list.
    pub fn with_dependencies(mut self, dependencies: Vec<JobId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Override the enqueue timestamp.
    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    /// True when every dependency satisfies `is_completed`.
    pub fn dependencies_met(&self, is_completed: impl Fn(&JobId) -> bool) -> bool {
        self.dependencies.iter().all(|dep| is_completed(dep))
    }

    /// Whether this entry sorts strictly before `other` in the queue.
    pub fn runs_before(&self, other: &QueueEntry) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.added_at < other.added_at)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
