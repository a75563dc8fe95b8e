// crates/frameline-core/tests/lifecycle_unit.rs
// ============================================================================
// Module: Lifecycle and Media Model Unit Tests
// Description: Status machines, label round-trips, and the shot index type.
// Purpose: Validate the entity-level invariants engines rely on.
// ============================================================================

//! ## Overview
//! Unit-level tests for entity types:
//! - The task status machine (legal transitions, absorbing terminals)
//! - Stable persistence labels for every enum
//! - Tool-type aliasing and generation-type derivation
//! - The sorted-nulls-last invariant of the shot index

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

use frameline_core::GenerationType;
use frameline_core::LinkMetadata;
use frameline_core::ShotData;
use frameline_core::ShotId;
use frameline_core::TaskStatus;
use frameline_core::TaskTypeName;
use frameline_core::WorkerStatus;
use frameline_core::core::registry::BillingType;
use frameline_core::core::registry::RunType;
use frameline_core::core::registry::TaskCategory;
use frameline_core::core::registry::canonical_tool_type;
use frameline_core::core::registry::carries_full_orchestrator_payload;
use frameline_core::core::registry::is_video_tool_type;

// ============================================================================
// SECTION: Task Status Machine
// ============================================================================

#[test]
fn lifecycle_permits_only_the_documented_transitions() {
    use TaskStatus::{Cancelled, Complete, Failed, InProgress, Queued};
    assert!(Queued.can_transition(InProgress));
    assert!(InProgress.can_transition(Complete));
    assert!(InProgress.can_transition(Failed));
    assert!(InProgress.can_transition(Cancelled));

    assert!(!Queued.can_transition(Complete));
    assert!(!Queued.can_transition(Cancelled));
    assert!(!InProgress.can_transition(Queued));
    for terminal in [Complete, Failed, Cancelled] {
        assert!(terminal.is_terminal());
        for next in [Queued, InProgress, Complete, Failed, Cancelled] {
            assert!(!terminal.can_transition(next));
        }
    }
}

#[test]
fn status_labels_round_trip() {
    for status in TaskStatus::ALL {
        assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(TaskStatus::parse("exploded"), None);
}

// ============================================================================
// SECTION: Registry Labels
// ============================================================================

#[test]
fn registry_labels_round_trip() {
    for run_type in [RunType::Gpu, RunType::Api] {
        assert_eq!(RunType::parse(run_type.as_str()), Some(run_type));
    }
    assert_eq!(RunType::parse("quantum"), None);
    for category in [
        TaskCategory::Generation,
        TaskCategory::Orchestration,
        TaskCategory::Processing,
        TaskCategory::Utility,
    ] {
        assert_eq!(TaskCategory::parse(category.as_str()), Some(category));
    }
    for billing in [BillingType::PerSecond, BillingType::PerUnit] {
        assert_eq!(BillingType::parse(billing.as_str()), Some(billing));
    }
    for status in [WorkerStatus::Active, WorkerStatus::Inactive, WorkerStatus::Terminated] {
        assert_eq!(WorkerStatus::parse(status.as_str()), Some(status));
    }
}

#[test]
fn orchestrator_detection_matches_on_the_name() {
    assert!(TaskTypeName::new("travel_orchestrator").is_orchestrator());
    assert!(TaskTypeName::new("orchestrator_v2").is_orchestrator());
    assert!(!TaskTypeName::new("image_gen").is_orchestrator());
}

// ============================================================================
// SECTION: Tool Types
// ============================================================================

#[test]
fn historical_aliases_normalize_to_canonical_forms() {
    assert_eq!(canonical_tool_type("travel_between_images"), "travel-between-images");
    assert_eq!(canonical_tool_type("edit_travel"), "edit-travel");
    assert_eq!(canonical_tool_type("travel_stitch"), "travel-stitch");
    assert_eq!(canonical_tool_type("flux-image"), "flux-image");
}

#[test]
fn video_tool_types_yield_video_generations() {
    assert!(is_video_tool_type("travel-between-images"));
    assert!(is_video_tool_type("edit_travel"));
    assert!(!is_video_tool_type("flux-image"));
    assert_eq!(GenerationType::for_tool_type("travel-between-images"), GenerationType::Video);
    assert_eq!(GenerationType::for_tool_type("flux-image"), GenerationType::Image);
}

#[test]
fn travel_family_carries_the_full_orchestrator_payload() {
    assert!(carries_full_orchestrator_payload("travel-stitch"));
    assert!(carries_full_orchestrator_payload("travel_between_images"));
    assert!(!carries_full_orchestrator_payload("flux-image"));
    assert!(!carries_full_orchestrator_payload("edit-travel"));
}

// ============================================================================
// SECTION: Shot Index
// ============================================================================

#[test]
fn shot_index_sorts_frames_with_nulls_last() {
    let mut shot_data = ShotData::new();
    shot_data.set_frames(&ShotId::new("s1"), vec![None, Some(100), Some(0), None, Some(50)]);
    assert_eq!(
        shot_data.frames(&ShotId::new("s1")),
        Some([Some(0), Some(50), Some(100), None, None].as_slice())
    );
}

#[test]
fn shot_index_removes_entries_emptied_of_frames() {
    let mut shot_data = ShotData::new();
    shot_data.set_frames(&ShotId::new("s1"), vec![Some(0)]);
    assert!(!shot_data.is_empty());
    shot_data.set_frames(&ShotId::new("s1"), Vec::new());
    assert!(shot_data.is_empty());
    assert_eq!(shot_data.frames(&ShotId::new("s1")), None);
}

#[test]
fn shot_index_serializes_as_arrays_keyed_by_shot() {
    let mut shot_data = ShotData::new();
    shot_data.set_frames(&ShotId::new("s1"), vec![Some(50), None]);
    let encoded = serde_json::to_value(&shot_data).expect("encode");
    assert_eq!(encoded, serde_json::json!({ "s1": [50, null] }));
}

// ============================================================================
// SECTION: Link Metadata
// ============================================================================

#[test]
fn link_metadata_tracks_emptiness() {
    assert!(LinkMetadata::default().is_empty());
    let auto = LinkMetadata::auto_positioned();
    assert!(!auto.is_empty());
    assert_eq!(auto.auto_positioned, Some(true));
    let encoded = serde_json::to_value(LinkMetadata::default()).expect("encode");
    assert_eq!(encoded, serde_json::json!({}));
}
