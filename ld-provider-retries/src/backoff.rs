//! Backoff arithmetic and jitter sources.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::time::Duration;

/// Time remaining until an epoch-millisecond instant, zero if it has passed.
///
/// Saturates instead of failing for instants past chrono's range, so a far
/// future instant yields a long wait. Callers bound it.
pub fn duration_until(epoch_millis: i64, now: DateTime<Utc>) -> Duration {
    let remaining = epoch_millis.saturating_sub(now.timestamp_millis());
    u64::try_from(remaining)
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO)
}

/// Parse an `X-RateLimit-Reset` value. Anything but an integer is `None`.
pub fn parse_reset(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Source of random delay added on top of a base wait.
///
/// Kept behind a trait so tests can pin the distribution.
pub trait Jitter: Send + Sync + fmt::Debug {
    /// Return a duration in `[0, max)`. Returns zero when `max` is zero.
    fn sample(&self, max: Duration) -> Duration;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&self, max: Duration) -> Duration {
        let nanos = nanos(max);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
    }
}

/// No jitter at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn sample(&self, _max: Duration) -> Duration {
        Duration::ZERO
    }
}

/// Reproducible jitter from a seeded RNG.
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    /// Create a jitter source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededJitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededJitter").finish_non_exhaustive()
    }
}

impl Jitter for SeededJitter {
    fn sample(&self, max: Duration) -> Duration {
        let nanos = nanos(max);
        if nanos == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.lock().gen_range(0..nanos))
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// How long to wait before a retry when the response does not say.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// Retry immediately.
    None,
    /// Constant delay.
    Fixed(Duration),
    /// `base` plus uniform jitter in `[0, spread)`.
    Jittered {
        /// Minimum delay.
        base: Duration,
        /// Width of the jitter window.
        spread: Duration,
    },
    /// `initial * multiplier^(attempt - 1)`, capped at `max`.
    Exponential {
        /// Delay after the first attempt.
        initial: Duration,
        /// Upper bound.
        max: Duration,
        /// Growth per attempt.
        multiplier: f64,
    },
}

impl WaitStrategy {
    /// Delay after the given (1-indexed) attempt.
    pub fn calculate(&self, attempt: u32, jitter: &dyn Jitter) -> Duration {
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::Jittered { base, spread } => *base + jitter.sample(*spread),
            WaitStrategy::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let delay = initial.as_secs_f64() * multiplier.powi(exponent);
                if !delay.is_finite() || delay >= max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(delay.max(0.0))
                }
            }
        }
    }
}
