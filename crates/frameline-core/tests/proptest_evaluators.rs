// crates/frameline-core/tests/proptest_evaluators.rs
// ============================================================================
// Module: Evaluator Property-Based Tests
// Description: Property tests for capacity math and the shot index.
// Purpose: Detect invariant violations across wide input ranges.
// ============================================================================

//! Property-based tests for evaluator invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use frameline_core::ShotData;
use frameline_core::ShotId;
use frameline_core::runtime::selection::active_capacity;
use frameline_core::runtime::selection::immediate_capacity;
use proptest::prelude::*;

proptest! {
    #[test]
    fn immediate_capacity_never_exceeds_headroom_or_queue(
        in_progress in 0_usize .. 32,
        queued in 0_usize .. 32,
        cap in 1_usize .. 16,
    ) {
        let capacity = immediate_capacity(in_progress, queued, cap);
        prop_assert!(capacity <= queued);
        prop_assert!(capacity <= cap.saturating_sub(in_progress));
        if in_progress >= cap {
            prop_assert_eq!(capacity, 0);
        }
    }

    #[test]
    fn active_capacity_never_exceeds_the_cap(
        in_progress in 0_usize .. 32,
        queued in 0_usize .. 32,
        cap in 1_usize .. 16,
    ) {
        let capacity = active_capacity(in_progress, queued, cap);
        prop_assert!(capacity <= cap);
        prop_assert!(capacity <= in_progress + queued);
        if in_progress + queued >= cap {
            prop_assert_eq!(capacity, cap);
        }
    }

    #[test]
    fn shot_index_frames_stay_sorted_with_nulls_last(
        frames in proptest::collection::vec(proptest::option::of(0_u32 .. 10_000), 0 .. 24),
    ) {
        let mut shot_data = ShotData::new();
        let shot = ShotId::new("s1");
        shot_data.set_frames(&shot, frames.clone());
        match shot_data.frames(&shot) {
            None => prop_assert!(frames.is_empty()),
            Some(stored) => {
                prop_assert_eq!(stored.len(), frames.len());
                let first_null = stored.iter().position(Option::is_none).unwrap_or(stored.len());
                prop_assert!(stored[first_null ..].iter().all(Option::is_none));
                let values: Vec<u32> = stored[.. first_null].iter().filter_map(|f| *f).collect();
                let mut sorted = values.clone();
                sorted.sort_unstable();
                prop_assert_eq!(values, sorted);
            }
        }
    }
}
