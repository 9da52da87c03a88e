//! Fixed-rate tick scheduling on absolute deadlines.
//!
//! Deadlines advance by exactly one period per completed tick, so a slow
//! tick shortens the following wait instead of shifting every later tick.
//! When the loop falls more than `max_lag` periods behind, the schedule is
//! resynchronised to the current instant rather than replaying missed ticks.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTiming {
    /// How late the tick started relative to its deadline.
    pub lateness: Duration,
    pub resynced: bool,
    /// Deadlines dropped by a resync.
    pub skipped: u64,
}

#[derive(Debug)]
pub struct FixedTicker {
    period: Duration,
    next: Instant,
    ticks: u64,
    max_lag: u32,
    accumulated_lateness: Duration,
    resyncs: u64,
}

impl FixedTicker {
    pub fn new(period: Duration, max_lag: u32, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
            ticks: 0,
            max_lag: max_lag.max(1),
            accumulated_lateness: Duration::ZERO,
            resyncs: 0,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Mean lateness over all completed ticks.
    pub fn average_lateness(&self) -> Duration {
        if self.ticks == 0 {
            return Duration::ZERO;
        }
        self.accumulated_lateness / self.ticks.min(u32::MAX as u64) as u32
    }

    /// Sleeps until the current deadline. Cancel-safe: dropping the future
    /// leaves the schedule untouched.
    pub async fn wait(&self) {
        tokio::time::sleep_until(self.next.into()).await;
    }

    /// Records that the tick due at the current deadline ran at `now` and
    /// schedules the next one.
    pub fn complete_tick(&mut self, now: Instant) -> TickTiming {
        let lateness = now.saturating_duration_since(self.next);
        self.ticks += 1;
        self.accumulated_lateness += lateness;

        if lateness > self.period * self.max_lag {
            let skipped = (lateness.as_nanos() / self.period.as_nanos().max(1)) as u64;
            self.next = now + self.period;
            self.resyncs += 1;
            return TickTiming {
                lateness,
                resynced: true,
                skipped,
            };
        }

        self.next += self.period;
        TickTiming {
            lateness,
            resynced: false,
            skipped: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(10);

    #[test]
    fn test_deadlines_advance_by_period() {
        let start = Instant::now();
        let mut ticker = FixedTicker::new(PERIOD, 5, start);
        assert_eq!(ticker.next_deadline(), start + PERIOD);

        let timing = ticker.complete_tick(start + PERIOD);
        assert_eq!(timing.lateness, Duration::ZERO);
        assert!(!timing.resynced);
        assert_eq!(ticker.next_deadline(), start + PERIOD * 2);
    }

    #[test]
    fn test_late_tick_does_not_shift_schedule() {
        let start = Instant::now();
        let mut ticker = FixedTicker::new(PERIOD, 5, start);

        let timing = ticker.complete_tick(start + PERIOD + Duration::from_millis(4));

        assert_eq!(timing.lateness, Duration::from_millis(4));
        assert_eq!(ticker.next_deadline(), start + PERIOD * 2);
    }

    #[test]
    fn test_early_completion_counts_as_on_time() {
        let start = Instant::now();
        let mut ticker = FixedTicker::new(PERIOD, 5, start);

        let timing = ticker.complete_tick(start);
        assert_eq!(timing.lateness, Duration::ZERO);
    }

    #[test]
    fn test_resync_after_large_stall() {
        let start = Instant::now();
        let mut ticker = FixedTicker::new(PERIOD, 3, start);
        let stalled = start + PERIOD + PERIOD * 10;

        let timing = ticker.complete_tick(stalled);

        assert!(timing.resynced);
        assert_eq!(timing.skipped, 10);
        assert_eq!(ticker.next_deadline(), stalled + PERIOD);
        assert_eq!(ticker.resyncs(), 1);
    }

    #[test]
    fn test_average_lateness() {
        let start = Instant::now();
        let mut ticker = FixedTicker::new(PERIOD, 5, start);
        assert_eq!(ticker.average_lateness(), Duration::ZERO);

        ticker.complete_tick(start + PERIOD + Duration::from_millis(2));
        ticker.complete_tick(start + PERIOD * 2 + Duration::from_millis(4));

        assert_eq!(ticker.ticks(), 2);
        assert_eq!(ticker.average_lateness(), Duration::from_millis(3));
    }

    #[tokio::test]
    async fn test_wait_reaches_deadline() {
        let start = Instant::now();
        let ticker = FixedTicker::new(Duration::from_millis(20), 5, start);

        ticker.wait().await;

        assert!(Instant::now() >= start + Duration::from_millis(20));
    }
}
