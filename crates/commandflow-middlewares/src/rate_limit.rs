//! Rate limiting middleware: per-identifier admission control ahead of
//! `next`, with a token bucket, sliding window, or load-adaptive strategy.
//!
//! The bucket bookkeeping is grounded on the fixed-window/sliding-log state
//! machines of the resilience crate's rate limiter, adapted from a blocking
//! "wait for a slot" acquire into a fail-fast one: a command middleware
//! rejects immediately with [`CommandError::RateLimitExceeded`] rather than
//! sleeping the caller's task.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use commandflow_core::{BoxFuture, CommandError, Context, Priority};
use commandflow_middleware::{Erased, Middleware, Next};

/// Which identifier a rate limit is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    /// Keyed on [`commandflow_core::Metadata::user_id`].
    PerUser,
    /// Keyed on the type name of the command being dispatched.
    PerCommand,
    /// Keyed on a `"client_ip"` entry in [`commandflow_core::Metadata::custom`].
    PerIp,
    /// One shared bucket for every call through this middleware.
    Global,
}

/// How admission is decided once an identifier's bucket is found.
#[derive(Clone, Debug)]
pub enum RateLimitStrategy {
    /// Classic token bucket: `capacity` tokens, refilled continuously at
    /// `refill_rate` tokens/second.
    TokenBucket { capacity: u64, refill_rate: f64 },
    /// A rolling log of request timestamps; at most `max` requests in any
    /// trailing `window`.
    SlidingWindow { window: Duration, max: u64 },
    /// A token bucket whose effective capacity is `base_rate * load_factor()`,
    /// recomputed on every acquisition so capacity can shrink under load.
    Adaptive {
        base_rate: f64,
        load_factor: Arc<dyn Fn() -> f64 + Send + Sync>,
    },
}

enum BucketState {
    Token { tokens: f64, last_refill: Instant },
    Window { log: Vec<Instant> },
}

struct Bucket {
    state: Mutex<BucketState>,
    last_used: Mutex<Instant>,
}

/// Enforces a [`RateLimitStrategy`] per identifier in a [`RateLimitScope`].
pub struct RateLimitingMiddleware {
    scope: RateLimitScope,
    strategy: RateLimitStrategy,
    buckets: Arc<Mutex<HashMap<String, Arc<Bucket>>>>,
}

impl RateLimitingMiddleware {
    /// Creates the middleware and spawns its idle-bucket sweeper.
    ///
    /// The sweeper holds only a [`Weak`] reference to the bucket map, so it
    /// exits on its own once this middleware (and every clone of its
    /// `Arc<dyn Middleware>`) is dropped.
    pub fn new(scope: RateLimitScope, strategy: RateLimitStrategy) -> Self {
        let buckets = Arc::new(Mutex::new(HashMap::new()));
        spawn_sweeper(Arc::downgrade(&buckets), Duration::from_secs(5 * 60));
        Self { scope, strategy, buckets }
    }

    fn identifier(&self, command: &Erased, ctx: &Context) -> Option<String> {
        match self.scope {
            RateLimitScope::PerUser => ctx.metadata().user_id.clone(),
            RateLimitScope::PerCommand => Some(format!("{:?}", (**command).type_id())),
            RateLimitScope::PerIp => ctx.metadata().custom.get("client_ip").cloned(),
            RateLimitScope::Global => Some("global".to_string()),
        }
    }

    fn bucket_for(&self, identifier: &str) -> Arc<Bucket> {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(identifier.to_string())
            .or_insert_with(|| {
                Arc::new(Bucket {
                    state: Mutex::new(match &self.strategy {
                        RateLimitStrategy::TokenBucket { capacity, .. } => BucketState::Token {
                            tokens: *capacity as f64,
                            last_refill: Instant::now(),
                        },
                        RateLimitStrategy::Adaptive { base_rate, .. } => BucketState::Token {
                            tokens: *base_rate,
                            last_refill: Instant::now(),
                        },
                        RateLimitStrategy::SlidingWindow { .. } => BucketState::Window { log: Vec::new() },
                    }),
                    last_used: Mutex::new(Instant::now()),
                })
            })
            .clone()
    }

    fn try_admit(&self, bucket: &Bucket) -> Result<(), CommandError> {
        *bucket.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        let mut state = bucket.state.lock().unwrap_or_else(|e| e.into_inner());

        match (&mut *state, &self.strategy) {
            (BucketState::Token { tokens, last_refill }, RateLimitStrategy::TokenBucket { capacity, refill_rate }) => {
                refill(tokens, last_refill, *capacity as f64, *refill_rate)
            }
            (BucketState::Token { tokens, last_refill }, RateLimitStrategy::Adaptive { base_rate, load_factor }) => {
                let capacity = base_rate * load_factor().clamp(0.0, 1.0);
                refill(tokens, last_refill, capacity, capacity)
            }
            (BucketState::Window { log }, RateLimitStrategy::SlidingWindow { window, max }) => {
                let now = Instant::now();
                log.retain(|t| now.duration_since(*t) < *window);
                if (log.len() as u64) < *max {
                    log.push(now);
                    Ok(())
                } else {
                    let reset_at = window.saturating_sub(now.duration_since(log[0]));
                    Err(CommandError::RateLimitExceeded { remaining: 0, reset_at })
                }
            }
            _ => unreachable!("bucket state always matches the strategy it was created from"),
        }
    }
}

fn refill(tokens: &mut f64, last_refill: &mut Instant, capacity: f64, refill_rate: f64) -> Result<(), CommandError> {
    let now = Instant::now();
    let elapsed = now.duration_since(*last_refill).as_secs_f64();
    *tokens = (*tokens + elapsed * refill_rate).min(capacity);
    *last_refill = now;

    if *tokens >= 1.0 {
        *tokens -= 1.0;
        Ok(())
    } else {
        let reset_at = if refill_rate > 0.0 {
            Duration::from_secs_f64(((1.0 - *tokens) / refill_rate).max(0.0))
        } else {
            Duration::from_secs(u64::MAX / 2)
        };
        Err(CommandError::RateLimitExceeded { remaining: 0, reset_at })
    }
}

fn spawn_sweeper(buckets: Weak<Mutex<HashMap<String, Arc<Bucket>>>>, idle_timeout: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(idle_timeout).await;
            match buckets.upgrade() {
                Some(buckets) => {
                    let now = Instant::now();
                    buckets.lock().unwrap_or_else(|e| e.into_inner()).retain(|_, bucket| {
                        now.duration_since(*bucket.last_used.lock().unwrap_or_else(|e| e.into_inner())) < idle_timeout
                    });
                }
                None => return,
            }
        }
    });
}

impl Middleware for RateLimitingMiddleware {
    fn name(&self) -> &str {
        "rate-limiting"
    }

    fn priority(&self) -> Priority {
        Priority::PreProcessing
    }

    fn execute<'a>(
        &'a self,
        command: Erased,
        ctx: &'a Context,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Erased, CommandError>> {
        Box::pin(async move {
            if let Some(identifier) = self.identifier(&command, ctx) {
                let bucket = self.bucket_for(&identifier);
                self.try_admit(&bucket)?;
            }

            next.call(command).await
        })
    }
}
