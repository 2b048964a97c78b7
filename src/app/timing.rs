//! Fixed-timestep scheduling for the control loop.

use std::time::{Duration, Instant};

use tracing::debug;

/// Shortest wait between loop iterations, so the windowing layer always
/// gets to process its events even when the loop is late.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Most update ticks run in one iteration; older lag is dropped.
pub const MAX_CATCH_UP: u32 = 10;

/// Lag accumulator turning wall-clock time into a whole number of ticks.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    lag: Duration,
    last: Instant,
}

impl FixedTimestep {
    /// One tick per frame at `fps` (at least 1).
    pub fn new(fps: u32, now: Instant) -> Self {
        Self {
            step: Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1))),
            lag: Duration::ZERO,
            last: now,
        }
    }

    /// Length of one tick.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Account for time up to `now` and return how many ticks are due.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        self.lag += now.saturating_duration_since(self.last);
        self.last = now;

        let mut ticks = 0;
        while self.lag >= self.step {
            self.lag -= self.step;
            ticks += 1;
            if ticks == MAX_CATCH_UP {
                debug!("Control loop behind by {:?}, skipping", self.lag);
                self.lag = Duration::ZERO;
                break;
            }
        }
        ticks
    }

    /// Time until the next tick is due, never below [`MIN_DELAY`].
    pub fn until_next(&self) -> Duration {
        self.step.saturating_sub(self.lag).max(MIN_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_accumulate() {
        let start = Instant::now();
        let mut clock = FixedTimestep::new(25, start);
        assert_eq!(clock.step(), Duration::from_millis(40));

        assert_eq!(clock.due_ticks(start + Duration::from_millis(30)), 0);
        assert_eq!(clock.due_ticks(start + Duration::from_millis(50)), 1);
        assert_eq!(clock.until_next(), Duration::from_millis(30));
        assert_eq!(clock.due_ticks(start + Duration::from_millis(130)), 2);
    }

    #[test]
    fn test_catch_up_is_bounded() {
        let start = Instant::now();
        let mut clock = FixedTimestep::new(25, start);
        assert_eq!(clock.due_ticks(start + Duration::from_secs(10)), MAX_CATCH_UP);
        assert_eq!(clock.until_next(), clock.step());
    }

    #[test]
    fn test_late_loop_still_waits_minimum() {
        let start = Instant::now();
        let mut clock = FixedTimestep::new(1000, start);
        clock.due_ticks(start + Duration::from_micros(1500));
        assert_eq!(clock.until_next(), MIN_DELAY);
    }
}
