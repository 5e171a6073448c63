//! Queue statistics snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Priority;

/// Count of waiting entries per priority band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityBreakdown {
    pub urgent: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl PriorityBreakdown {
    /// Count one more entry in `priority`.
    pub fn record(&mut self, priority: Priority) {
        *self.slot(priority) += 1;
    }

    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }

    fn slot(&mut self, priority: Priority) -> &mut usize {
        match priority {
            Priority::Urgent => &mut self.urgent,
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }
}

/// Point-in-time view of the render queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueueStats {
    /// Entries in the queue, waiting or processing
    pub total_jobs: usize,
    /// Entries currently dispatched
    pub processing_jobs: usize,
    /// Entries not yet dispatched
    pub waiting_jobs: usize,
    /// Mean enqueue-to-completion time over the trailing window, in milliseconds
    pub average_wait_time_ms: f64,
    /// Completions per hour over the trailing window
    pub throughput: f64,
    /// Waiting entries per priority band
    pub queue_by_priority: PriorityBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_counts() {
        let mut breakdown = PriorityBreakdown::default();
        breakdown.record(Priority::Urgent);
        breakdown.record(Priority::Low);
        breakdown.record(Priority::Low);

        assert_eq!(breakdown.get(Priority::Urgent), 1);
        assert_eq!(breakdown.get(Priority::Low), 2);
        assert_eq!(breakdown.get(Priority::Normal), 0);
    }
}
