//! Exponential backoff with a total elapsed-time ceiling.
//!
//! Elapsed time is measured with `tokio::time::Instant` so tests running on
//! paused time see the same schedule as production.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Backoff schedule settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    /// Each delay is drawn from `interval * (1 ± randomization_factor)`.
    pub randomization_factor: f64,
    pub max_interval: Duration,
    /// Total budget measured from the first attempt.
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Duration::from_secs(180),
        }
    }
}

impl BackoffPolicy {
    pub fn start(self) -> Backoff {
        Backoff {
            policy: self,
            current: self.initial_interval,
            started: Instant::now(),
        }
    }
}

/// Running schedule created by [`BackoffPolicy::start`].
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    started: Instant,
}

impl Backoff {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Budget left before the ceiling is reached.
    pub fn remaining(&self) -> Duration {
        self.policy.max_elapsed.saturating_sub(self.elapsed())
    }

    /// Delay before the next attempt, or `None` once sleeping would overrun
    /// the elapsed-time ceiling.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = jitter(self.current, self.policy.randomization_factor);
        if self.elapsed() + delay > self.policy.max_elapsed {
            return None;
        }

        let grown = self.current.as_secs_f64() * self.policy.multiplier;
        self.current = if grown >= self.policy.max_interval.as_secs_f64() {
            self.policy.max_interval
        } else {
            Duration::from_secs_f64(grown)
        };

        Some(delay)
    }
}

fn jitter(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return interval;
    }
    let base = interval.as_secs_f64();
    let delta = base * factor;
    let secs = rand::thread_rng().gen_range((base - delta)..=(base + delta));
    Duration::from_secs_f64(secs.max(0.0))
}
