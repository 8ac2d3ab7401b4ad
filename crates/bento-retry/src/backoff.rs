use std::time::Duration;

/// Computes the delay before a retry.
///
/// `attempt` is 0-indexed: the delay before the first retry is
/// `next_interval(0)`.
pub trait IntervalFunction: Send + Sync {
    /// Delay before retry number `attempt + 1`.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a new fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// `min(max_interval, initial_interval × multiplier^attempt)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff with a multiplier of 2.0 and no cap.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps every delay.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        exponential(
            self.initial_interval,
            self.multiplier,
            attempt,
            self.max_interval,
        )
    }
}

/// Exponential backoff scaled by a random factor in `[1, 2)`.
///
/// The jittered delay is clamped to `max_interval` as well, so a capped
/// schedule never sleeps longer than the cap.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialRandomBackoff {
    /// Creates a new randomized exponential backoff with a multiplier of 2.0.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps every delay, jitter included.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let base = exponential(
            self.initial_interval,
            self.multiplier,
            attempt,
            self.max_interval,
        );
        let factor = 1.0 + rand::random::<f64>();
        let jittered = Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(base);

        match self.max_interval {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

fn exponential(
    initial: Duration,
    multiplier: f64,
    attempt: usize,
    max: Option<Duration>,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = initial.as_secs_f64() * multiplier.powi(exponent);
    let interval = Duration::try_from_secs_f64(secs).ok();

    match (interval, max) {
        (Some(interval), Some(max)) => interval.min(max),
        (Some(interval), None) => interval,
        // Overflowed: only the cap is meaningful.
        (None, Some(max)) => max,
        (None, None) => Duration::MAX,
    }
}

/// Backoff computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
