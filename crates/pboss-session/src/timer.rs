use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Timer generation carried by every tick.
pub type Generation = u64;

/// Fixed-period poll timer owned by an active session.
///
/// The first tick comes one period after creation. Periods missed while a
/// slow poll was in flight collapse into a single tick. Dropping the timer
/// stops it.
#[derive(Debug)]
pub struct PollTimer {
    generation: Generation,
    interval: Interval,
}

impl PollTimer {
    pub fn start(period: Duration, generation: Generation) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(generation, period_secs = period.as_secs(), "poll timer started");
        Self {
            generation,
            interval,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Wait for the next period. Cancel safe.
    pub async fn tick(&mut self) -> Generation {
        self.interval.tick().await;
        self.generation
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        tracing::debug!(generation = self.generation, "poll timer stopped");
    }
}
