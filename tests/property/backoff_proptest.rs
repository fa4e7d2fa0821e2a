//! Property-based tests for the poll state machine

use bamboo_journal::auth::appwrite::PollState;
use bamboo_journal::shared::PollSettings;
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Outcome {
    Success,
    Failure,
    Unauthorized,
    BecameVisible,
}

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        3 => Just(Outcome::Success),
        4 => Just(Outcome::Failure),
        2 => Just(Outcome::Unauthorized),
        1 => Just(Outcome::BecameVisible),
    ]
}

fn settings() -> impl Strategy<Value = PollSettings> {
    (1u64..10_000, 0u64..200_000).prop_map(|(base, extra)| {
        PollSettings::new(Duration::from_millis(base), Duration::from_millis(base + extra))
    })
}

proptest! {
    #[test]
    fn test_delay_stays_within_bounds(settings in settings(), outcomes in prop::collection::vec(outcome(), 0..64)) {
        let mut state = PollState::new(&settings);
        prop_assert_eq!(state.delay(), settings.base_delay);

        for outcome in outcomes {
            let before = state.delay();
            match outcome {
                Outcome::Success => {
                    state.record_success();
                    prop_assert_eq!(state.delay(), settings.base_delay);
                    prop_assert!(!state.in_cooldown());
                }
                Outcome::Failure => {
                    state.record_failure();
                    prop_assert_eq!(state.delay(), (before * 2).min(settings.max_delay));
                }
                Outcome::Unauthorized => {
                    state.enter_cooldown();
                    prop_assert_eq!(state.delay(), settings.max_delay);
                    prop_assert!(state.in_cooldown());
                }
                Outcome::BecameVisible => {
                    if state.in_cooldown() {
                        state.leave_cooldown();
                        prop_assert_eq!(state.delay(), settings.base_delay);
                    }
                }
            }
            prop_assert!(state.delay() >= settings.base_delay);
            prop_assert!(state.delay() <= settings.max_delay);
        }
    }

    #[test]
    fn test_observe_reports_only_changes(identities in prop::collection::vec(prop::option::of("[abc]"), 0..32)) {
        let mut state = PollState::new(&PollSettings::default());
        let mut last: Option<String> = None;

        for identity in identities {
            let changed = state.observe(identity.as_deref());
            prop_assert_eq!(changed, identity != last);
            last = identity;
            prop_assert_eq!(state.last_known_identity(), last.as_deref());
        }
    }

    #[test]
    fn test_failures_reach_max_in_bounded_steps(settings in settings()) {
        let mut state = PollState::new(&settings);
        let mut steps = 0;
        while state.delay() < settings.max_delay {
            state.record_failure();
            steps += 1;
            prop_assert!(steps <= 64, "backoff never reached the cap");
        }
        prop_assert_eq!(state.snapshot().consecutive_failures, steps);
    }
}
