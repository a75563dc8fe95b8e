// crates/frameline-dispatch/tests/proptest_scheduler.rs
// ============================================================================
// Module: Scheduler Property-Based Tests
// Description: Property tests for capacity bounds and frame uniqueness.
// Purpose: Detect invariant violations across randomized queue shapes.
// ============================================================================

//! ## Overview
//! Property-based tests for scheduler invariants:
//! - `count_eligible_service(false)` equals the number of serial claims a
//!   worker can extract before halting, with no completions in between
//! - Applied frame batches always leave non-null frames unique and the
//!   listing in ascending frame order

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

mod common;

use std::collections::BTreeSet;

use common::fixture;
use common::seed_generation;
use common::seed_generation_type;
use common::seed_project;
use common::seed_shot;
use common::seed_task;
use common::seed_user;
use frameline_core::GenerationId;
use frameline_core::ShotId;
use frameline_core::TaskParams;
use frameline_core::WorkerId;
use frameline_dispatch::ServiceClaimRequest;
use frameline_dispatch::TimelineFrameChange;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn immediate_count_matches_serial_claim_extraction(
        preclaimed in 0_usize .. 8,
        queued in 0_usize .. 8,
    ) {
        let fx = fixture();
        seed_user(&fx.store, "u1", 10);
        seed_project(&fx.store, "p1", "u1");
        seed_generation_type(&fx.store, "image_gen", "flux-image");
        for index in 0 .. preclaimed {
            seed_task(
                &fx.store,
                &format!("busy-{index}"),
                "p1",
                "image_gen",
                TaskParams::new(),
                i64::try_from(index).unwrap(),
                &[],
            );
        }
        let request = ServiceClaimRequest::new(WorkerId::new("worker-prop"));
        let mut in_flight = 0;
        while in_flight < preclaimed
            && fx.surface.claim_service(&request).unwrap().is_some()
        {
            in_flight += 1;
        }
        for index in 0 .. queued {
            seed_task(
                &fx.store,
                &format!("waiting-{index}"),
                "p1",
                "image_gen",
                TaskParams::new(),
                100 + i64::try_from(index).unwrap(),
                &[],
            );
        }

        let counted = fx.surface.count_eligible_service(false, None).unwrap();
        let mut extracted = 0;
        while fx.surface.claim_service(&request).unwrap().is_some() {
            extracted += 1;
        }
        prop_assert_eq!(counted, extracted);
        prop_assert!(in_flight + extracted <= 5);
    }

    #[test]
    fn applied_batches_keep_frames_unique_and_sorted(
        raw_frames in proptest::collection::btree_set(0_i64 .. 500, 1 .. 6),
    ) {
        let frames: Vec<i64> = raw_frames.into_iter().collect();
        let fx = fixture();
        seed_user(&fx.store, "u1", 10);
        seed_project(&fx.store, "p1", "u1");
        seed_shot(&fx.store, "s1", "p1");
        let shot = ShotId::new("s1");
        for index in 0 .. frames.len() {
            let generation = format!("g{index}");
            seed_generation(&fx.store, &generation, "p1");
            fx.surface
                .add_generation_to_shot(&shot, &GenerationId::new(&generation), true)
                .unwrap();
        }

        let changes: Vec<TimelineFrameChange> = frames
            .iter()
            .enumerate()
            .map(|(index, frame)| TimelineFrameChange {
                generation_id: GenerationId::new(format!("g{index}")),
                frame: *frame,
            })
            .collect();
        let listing = fx.surface.apply_timeline_frames(&shot, &changes, true).unwrap();

        let assigned: Vec<u32> =
            listing.iter().filter_map(|position| position.timeline_frame).collect();
        let unique: BTreeSet<u32> = assigned.iter().copied().collect();
        prop_assert_eq!(unique.len(), assigned.len());
        let mut sorted = assigned.clone();
        sorted.sort_unstable();
        prop_assert_eq!(assigned, sorted);
    }
}
