//! Exponential backoff with jitter.

use super::strategy::BackoffStrategy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Largest exponent used when computing `multiplier ^ attempt`.
///
/// Any realistic cap is reached long before this, and clamping keeps the
/// float arithmetic finite for very long retry sequences.
const MAX_EXPONENT: u32 = 1024;

/// How randomness is applied to the computed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    /// Use the capped exponential delay as is.
    None,
    /// Vary the delay by `±factor/2` of its value (factor clamped to `0.0..=1.0`).
    Proportional(f64),
    /// Draw the delay uniformly from `[0, capped_delay)`.
    ///
    /// This spreads concurrent clients across the whole window so they do not
    /// retry in lockstep.
    Full,
}

/// Exponential backoff strategy with a cap and configurable jitter.
///
/// For retry index `n`:
///
/// ```text
/// capped = min(initial_delay * multiplier^n, max_delay)
/// Jitter::None            => capped
/// Jitter::Proportional(j) => capped + capped * j * random(-0.5, +0.5), re-capped
/// Jitter::Full            => random(0, capped)
/// ```
///
/// Every instance owns its own random source, seeded from OS entropy unless
/// an explicit seed is supplied, so many clients started together do not
/// draw identical delays.
///
/// # Examples
///
/// ```rust
/// use turbocouch_core::retry::{BackoffStrategy, ExponentialBackoff, Jitter};
/// use std::time::Duration;
///
/// // Default configuration (max_retries=3, initial=100ms, max=60s, multiplier=2.0, 10% jitter)
/// let backoff = ExponentialBackoff::default();
///
/// // Full jitter capped at 57 seconds, retrying forever
/// let backoff = ExponentialBackoff::builder()
///     .max_retries(u32::MAX)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_millis(57_000))
///     .jitter(Jitter::Full)
///     .build();
///
/// assert!(backoff.next_delay(0).unwrap() < Duration::from_millis(100));
/// ```
#[derive(Debug)]
pub struct ExponentialBackoff {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: Jitter,
    rng: Mutex<StdRng>,
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// The delay ceiling for retry index `attempt`, before jitter.
    pub fn cap(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }

    /// The configured jitter mode.
    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    fn random_unit(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.r#gen::<f64>()
    }
}

impl Default for ExponentialBackoff {
    /// Defaults:
    /// - `max_retries`: 3
    /// - `initial_delay`: 100ms
    /// - `max_delay`: 60s
    /// - `multiplier`: 2.0
    /// - `jitter`: 10% proportional
    fn default() -> Self {
        ExponentialBackoffBuilder::default().build()
    }
}

impl Clone for ExponentialBackoff {
    /// Clones the configuration; the clone gets a freshly seeded random source.
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter: self.jitter,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        let capped = self.cap(attempt).as_secs_f64();

        let delay = match self.jitter {
            Jitter::None => capped,
            Jitter::Proportional(factor) => {
                let offset = capped * factor * (self.random_unit() - 0.5);
                (capped + offset).clamp(0.0, self.max_delay.as_secs_f64())
            }
            Jitter::Full => capped * self.random_unit(),
        };

        Some(Duration::from_secs_f64(delay))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Builder for configuring `ExponentialBackoff`.
///
/// # Examples
///
/// ```rust
/// use turbocouch_core::retry::{ExponentialBackoff, Jitter};
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(30))
///     .multiplier(2.0)
///     .jitter(Jitter::Proportional(0.1))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    max_retries: Option<u32>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: Option<Jitter>,
    seed: Option<u64>,
}

impl ExponentialBackoffBuilder {
    /// Set the maximum number of retry attempts.
    ///
    /// Default: 3. Use `u32::MAX` for no limit.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay ceiling for the first retry.
    ///
    /// Default: 100ms
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the maximum delay between retries.
    ///
    /// Default: 60s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential multiplier.
    ///
    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Set the jitter mode.
    ///
    /// Default: `Jitter::Proportional(0.1)`
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(match jitter {
            Jitter::Proportional(factor) => Jitter::Proportional(factor.clamp(0.0, 1.0)),
            other => other,
        });
        self
    }

    /// Seed the random source explicitly (reproducible delays in tests).
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the `ExponentialBackoff` instance.
    ///
    /// Uses default values for any unset parameters.
    pub fn build(self) -> ExponentialBackoff {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        ExponentialBackoff {
            max_retries: self.max_retries.unwrap_or(3),
            initial_delay: self.initial_delay.unwrap_or(Duration::from_millis(100)),
            max_delay: self.max_delay.unwrap_or(Duration::from_secs(60)),
            multiplier: self.multiplier.unwrap_or(2.0),
            jitter: self.jitter.unwrap_or(Jitter::Proportional(0.1)),
            rng: Mutex::new(rng),
        }
    }
}
