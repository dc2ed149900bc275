//! Property tests for module gating and quiz mastery bookkeeping.

use mastery_core::model::{ModuleDescriptor, ModuleId, ProgressStatus};
use mastery_core::time::fixed_now;
use proptest::prelude::*;
use services::{Clock, ModuleProgressTracker};

// ============================================================================
// Generators
// ============================================================================

const MAX_MODULES: usize = 6;

#[derive(Debug, Clone, Copy)]
enum Action {
    Read(usize),
    Quiz { module: usize, score: f64, threshold: f64 },
    Reset(usize),
}

fn arb_lesson() -> impl Strategy<Value = Vec<ModuleDescriptor>> {
    proptest::collection::vec(0u8..3, 1..=MAX_MODULES).prop_map(|kinds| {
        kinds
            .into_iter()
            .enumerate()
            .map(|(index, kind)| {
                let id = format!("m{index}");
                match kind {
                    0 => ModuleDescriptor::reading(id.as_str()),
                    1 => ModuleDescriptor::quiz(id.as_str(), None),
                    _ => ModuleDescriptor::assessment(id.as_str(), Some(0.9)),
                }
            })
            .collect()
    })
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..MAX_MODULES).prop_map(Action::Read),
        (0..MAX_MODULES, 0.0f64..=100.0, 0.1f64..=1.0).prop_map(|(module, score, threshold)| {
            Action::Quiz {
                module,
                score,
                threshold,
            }
        }),
        (0..MAX_MODULES).prop_map(Action::Reset),
    ]
}

fn module_id(index: usize) -> ModuleId {
    ModuleId::new(format!("m{index}"))
}

/// Straight scan of every predecessor, independent of the tracker's own gate.
fn expected_access(tracker: &ModuleProgressTracker, index: usize, modules: &[ModuleDescriptor]) -> bool {
    modules[..index].iter().all(|module| {
        tracker.module_progress(&module.id).is_some_and(|record| {
            record.status() == ProgressStatus::Completed
                && (!module.is_quiz_typed() || record.mastery_achieved())
        })
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn gating_matches_a_predecessor_scan(
        modules in arb_lesson(),
        actions in proptest::collection::vec(arb_action(), 0..24)
    ) {
        let mut tracker = ModuleProgressTracker::new(Clock::fixed(fixed_now()));

        for action in actions {
            match action {
                Action::Read(module) => tracker.complete_reading(&module_id(module)),
                Action::Quiz { module, score, threshold } => {
                    let id = module_id(module);
                    let achieved = tracker.record_quiz_attempt(&id, score, threshold);
                    let stored = tracker.module_progress(&id).map(|record| record.mastery_achieved());
                    prop_assert_eq!(stored, Some(achieved));
                    prop_assert_eq!(achieved, score >= threshold * 100.0);
                }
                Action::Reset(module) => tracker.reset_module(&module_id(module)),
            }

            prop_assert!(tracker.can_access_module(&modules[0].id, 0, &modules));
            for (index, module) in modules.iter().enumerate() {
                prop_assert_eq!(
                    tracker.can_access_module(&module.id, index, &modules),
                    expected_access(&tracker, index, &modules)
                );
            }
            for record in tracker.records() {
                prop_assert!(!record.mastery_achieved() || record.status() == ProgressStatus::Completed);
            }
        }
    }

    #[test]
    fn first_blocker_is_the_earliest_failing_predecessor(
        modules in arb_lesson(),
        actions in proptest::collection::vec(arb_action(), 0..24)
    ) {
        let mut tracker = ModuleProgressTracker::new(Clock::fixed(fixed_now()));
        for action in actions {
            match action {
                Action::Read(module) => tracker.complete_reading(&module_id(module)),
                Action::Quiz { module, score, threshold } => {
                    tracker.record_quiz_attempt(&module_id(module), score, threshold);
                }
                Action::Reset(module) => tracker.reset_module(&module_id(module)),
            }
        }

        let index = modules.len();
        let expected = (0..index)
            .find(|&candidate| !expected_access(&tracker, candidate + 1, &modules))
            .map(|candidate| modules[candidate].id.clone());
        let blocker = tracker
            .first_blocking_module(index, &modules)
            .map(|module| module.id.clone());
        prop_assert_eq!(blocker, expected);
    }
}
