//! The circuit breaker only ever takes the transitions the FSM allows:
//! `Closed` -> `Open` after `failure_threshold` consecutive failures,
//! `Open` -> `HalfOpen` once admitted as a probe, `HalfOpen` -> `Closed`
//! after `success_threshold` consecutive successes, and any `HalfOpen`
//! failure trips straight back to `Open`. `open_duration` is zero so every
//! `should_allow` call promotes an `Open` breaker immediately, keeping the
//! test deterministic without real sleeps.

use std::time::Duration;

use commandflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use proptest::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Model {
    Closed,
    Open,
    HalfOpen,
}

fn step_model(model: Model, success: bool, failure_threshold: u32, success_threshold: u32, failures: &mut u32, successes: &mut u32) -> Model {
    match model {
        Model::Closed => {
            if success {
                *failures = 0;
                Model::Closed
            } else {
                *failures += 1;
                if *failures >= failure_threshold {
                    *failures = 0;
                    Model::Open
                } else {
                    Model::Closed
                }
            }
        }
        // `should_allow` promotes Open -> HalfOpen before the outcome is
        // recorded, since `open_duration` is zero.
        Model::Open | Model::HalfOpen => {
            if success {
                *successes += 1;
                if *successes >= success_threshold {
                    *successes = 0;
                    Model::Closed
                } else {
                    Model::HalfOpen
                }
            } else {
                *successes = 0;
                Model::Open
            }
        }
    }
}

proptest! {
    #[test]
    fn observed_states_follow_only_documented_fsm_edges(
        outcomes in prop::collection::vec(any::<bool>(), 1..60),
        failure_threshold in 1u32..5,
        success_threshold in 1u32..5,
    ) {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(failure_threshold)
                .success_threshold(success_threshold)
                .open_duration(Duration::ZERO)
                .build(),
        );

        let mut model = Model::Closed;
        let mut failures = 0u32;
        let mut successes = 0u32;

        for success in outcomes {
            let allowed = breaker.should_allow();
            prop_assert!(allowed, "open_duration is zero, every call should eventually be admitted");

            if success {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }

            model = step_model(model, success, failure_threshold, success_threshold, &mut failures, &mut successes);
            let expected = match model {
                Model::Closed => CircuitState::Closed,
                Model::Open => CircuitState::Open,
                Model::HalfOpen => CircuitState::HalfOpen,
            };
            prop_assert_eq!(breaker.state(), expected);
        }
    }
}
