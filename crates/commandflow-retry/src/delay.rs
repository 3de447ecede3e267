//! Delay strategies for the retry envelope.

use std::time::Duration;

/// How long to wait between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum DelayStrategy {
    /// Retry immediately, with no delay.
    Immediate,
    /// Wait a fixed duration before every retry.
    Fixed(Duration),
    /// Wait `base + increment * (attempt - 1)`, optionally capped.
    Linear {
        /// Delay before the first retry.
        base: Duration,
        /// Additional delay added per subsequent attempt.
        increment: Duration,
        /// Upper bound on the computed delay, if any.
        cap: Option<Duration>,
    },
    /// Wait `min(base * multiplier^(attempt - 1), cap)`, then apply
    /// uniform jitter in `±jitter * delay`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Growth factor applied per attempt.
        multiplier: f64,
        /// Upper bound on the pre-jitter delay.
        cap: Duration,
        /// Jitter fraction in `[0.0, 1.0]`; `0.0` disables jitter.
        jitter: f64,
    },
}

impl DelayStrategy {
    /// Computes the delay before retrying after the given attempt (1-based:
    /// the attempt that just failed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            DelayStrategy::Immediate => Duration::ZERO,
            DelayStrategy::Fixed(d) => d,
            DelayStrategy::Linear { base, increment, cap } => {
                let scaled = increment.saturating_mul(attempt.saturating_sub(1));
                let total = base.saturating_add(scaled);
                match cap {
                    Some(cap) => total.min(cap),
                    None => total,
                }
            }
            DelayStrategy::Exponential {
                base,
                multiplier,
                cap,
                jitter,
            } => {
                let factor = multiplier.max(0.0).powi((attempt.saturating_sub(1)) as i32);
                let raw = base.as_secs_f64() * factor;
                let capped = raw.min(cap.as_secs_f64()).max(0.0);
                let with_jitter = apply_jitter(capped, jitter.clamp(0.0, 1.0));
                Duration::from_secs_f64(with_jitter.max(0.0))
            }
        }
    }
}

fn apply_jitter(delay_secs: f64, jitter: f64) -> f64 {
    if jitter == 0.0 {
        return delay_secs;
    }
    let spread = delay_secs * jitter;
    let sample: f64 = rand::random::<f64>() * 2.0 - 1.0; // uniform in [-1, 1]
    delay_secs + sample * spread
}
