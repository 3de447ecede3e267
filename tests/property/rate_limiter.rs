//! For a `TokenBucket(capacity = C, refill_rate = 0)`, no more than `C`
//! calls from a single identifier are ever admitted in a burst (the
//! `T = 0` case of the general bound `admitted <= C + refill_rate * T`
//! for a window of length `T`): each rejection strictly follows the
//! `C`-th admission, and no call is admitted after a rejection without an
//! intervening refill.

use std::sync::Arc;

use commandflow_core::{CancelToken, Context};
use commandflow_middleware::run_isolated;
use commandflow_middlewares::{RateLimitScope, RateLimitStrategy, RateLimitingMiddleware};
use proptest::prelude::*;

fn handler() -> commandflow_middleware::ErasedHandler {
    Arc::new(|cmd| Box::pin(async move { Ok(cmd) }))
}

proptest! {
    #[test]
    fn a_burst_never_admits_more_than_the_bucket_capacity(
        capacity in 1u64..10,
        attempts in 1usize..40,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let mw = RateLimitingMiddleware::new(
                RateLimitScope::Global,
                RateLimitStrategy::TokenBucket {
                    capacity,
                    refill_rate: 0.0,
                },
            );
            let ctx = Context::with_default_metadata();
            let cancel = CancelToken::none();

            let mut admitted = 0u64;
            for _ in 0..attempts {
                let result = run_isolated(&mw, Box::new(()), &ctx, &cancel, handler()).await;
                if result.is_ok() {
                    admitted += 1;
                }
            }

            prop_assert!(admitted <= capacity, "admitted {admitted} calls but capacity is only {capacity}");
            Ok(())
        })?;
    }
}
