//! Dispatch statistics.

use crate::download::dispatcher::UrlState;

/// Counters for one dispatch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub completed: u64,
    pub failed: u64,
    /// Already processed before dispatch.
    pub skipped: u64,
    /// Failed because a stop was requested.
    pub stopped: u64,
    /// Completed by linking an identical existing file.
    pub reused: u64,
    /// Left unprocessed because the run was cancelled.
    pub remaining: u64,
}

impl DispatchStats {
    /// Count the outcome of one dispatch.
    pub fn record(&mut self, state: UrlState) {
        match state {
            UrlState::Completed => self.completed += 1,
            UrlState::Failed => self.failed += 1,
            UrlState::AlreadyProcessed => self.skipped += 1,
            UrlState::Unprocessed | UrlState::Processing => {}
        }
    }

    pub fn mark_stopped(&mut self) {
        self.stopped += 1;
    }

    pub fn mark_reused(&mut self) {
        self.reused += 1;
    }

    /// Urls dispatched in this run, whatever their outcome.
    pub fn total_dispatched(&self) -> u64 {
        self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let mut stats = DispatchStats::default();
        stats.record(UrlState::Completed);
        stats.record(UrlState::Failed);
        stats.record(UrlState::AlreadyProcessed);
        stats.mark_reused();

        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.total_dispatched(), 2);
    }
}
