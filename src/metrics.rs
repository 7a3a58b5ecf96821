//! Process-wide request statistics.
//!
//! Plain atomic counters, never behind a lock shared with business
//! logic. Introspection routes do not record themselves so the activity
//! signal cannot self-inflate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::models::StatsResponse;

pub struct RequestStats {
    clock: Arc<dyn Clock>,
    started_ms: u64,
    total: AtomicU64,
    latest_ms: AtomicU64,
}

impl RequestStats {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let started_ms = clock.now_unix_ms();
        Self {
            clock,
            started_ms,
            total: AtomicU64::new(0),
            latest_ms: AtomicU64::new(started_ms),
        }
    }

    pub fn record(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.latest_ms
            .store(self.clock.now_unix_ms(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsResponse {
        let now_ms = self.clock.now_unix_ms();
        StatsResponse {
            total_requests: self.total.load(Ordering::Relaxed),
            latest_request_time: self.latest_ms.load(Ordering::Relaxed) / 1000,
            uptime_seconds: now_ms.saturating_sub(self.started_ms) / 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_records_total_and_latest() {
        let clock = Arc::new(ManualClock::new(10_000));
        let stats = RequestStats::new(clock.clone());

        stats.record();
        clock.advance_ms(5_000);
        stats.record();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.latest_request_time, 15);
        assert_eq!(snapshot.uptime_seconds, 5);
    }

    #[test]
    fn test_snapshot_does_not_count_itself() {
        let clock = Arc::new(ManualClock::new(10_000));
        let stats = RequestStats::new(clock);
        let before = stats.snapshot().total_requests;
        let after = stats.snapshot().total_requests;
        assert_eq!(before, after);
    }
}
