// crates/frameline-core/tests/params_unit.rs
// ============================================================================
// Module: Task Params Unit Tests
// Description: Precedence chains, legacy aliases, and malformed values.
// Purpose: Validate the tolerant accessor layer over opaque payloads.
// ============================================================================

//! ## Overview
//! Unit-level tests for the params accessor layer:
//! - Shot-id precedence across orchestrator containers and top-level keys
//! - The deep-payload gate for travel-stitch-like types
//! - Legacy camel-case aliases (`shotId`, `thumbnailUrl`)
//! - Malformed candidates treated as absent mid-walk
//! - The `add_in_position` and `model` accessors

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

use frameline_core::ShotId;
use frameline_core::TaskParams;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn params(value: serde_json::Value) -> TaskParams {
    TaskParams::from_value(value).expect("object payload")
}

// ============================================================================
// SECTION: Construction
// ============================================================================

#[test]
fn only_record_roots_are_accepted() {
    assert!(TaskParams::from_value(json!({})).is_some());
    assert!(TaskParams::from_value(json!([1, 2])).is_none());
    assert!(TaskParams::from_value(json!("scalar")).is_none());
    assert!(TaskParams::from_value(json!(null)).is_none());
}

#[test]
fn round_trip_preserves_field_names_verbatim() {
    let payload = json!({
        "orchestrator_details": { "shot_id": "s1" },
        "full_orchestrator_payload": { "shot_id": "s2" },
        "thumbnailUrl": "s3://thumbs/a.jpg"
    });
    let parsed = params(payload.clone());
    assert_eq!(parsed.to_value(), payload);
}

// ============================================================================
// SECTION: Shot-Id Precedence
// ============================================================================

#[test]
fn original_params_container_wins_over_everything() {
    let parsed = params(json!({
        "originalParams": { "orchestrator_details": { "shot_id": "s-original" } },
        "orchestrator_details": { "shot_id": "s-details" },
        "full_orchestrator_payload": { "shot_id": "s-deep" },
        "shot_id": "s-top",
        "shotId": "s-alias"
    }));
    assert_eq!(parsed.shot_id(true), Some(ShotId::new("s-original")));
}

#[test]
fn orchestrator_details_win_over_deep_and_top_level() {
    let parsed = params(json!({
        "orchestrator_details": { "shot_id": "s-details" },
        "full_orchestrator_payload": { "shot_id": "s-deep" },
        "shot_id": "s-top"
    }));
    assert_eq!(parsed.shot_id(true), Some(ShotId::new("s-details")));
}

#[test]
fn deep_payload_is_consulted_only_when_enabled() {
    let parsed = params(json!({
        "full_orchestrator_payload": { "shot_id": "s-deep" },
        "shot_id": "s-top"
    }));
    assert_eq!(parsed.shot_id(true), Some(ShotId::new("s-deep")));
    assert_eq!(parsed.shot_id(false), Some(ShotId::new("s-top")));
}

#[test]
fn top_level_snake_case_wins_over_the_camel_alias() {
    let parsed = params(json!({ "shot_id": "s-top", "shotId": "s-alias" }));
    assert_eq!(parsed.shot_id(true), Some(ShotId::new("s-top")));
    let alias_only = params(json!({ "shotId": "s-alias" }));
    assert_eq!(alias_only.shot_id(true), Some(ShotId::new("s-alias")));
}

#[test]
fn malformed_candidates_are_absent_and_the_walk_continues() {
    let parsed = params(json!({
        "orchestrator_details": { "shot_id": 42 },
        "shot_id": "",
        "shotId": "s-alias"
    }));
    assert_eq!(parsed.shot_id(true), Some(ShotId::new("s-alias")));
    let nothing = params(json!({ "orchestrator_details": { "shot_id": null } }));
    assert_eq!(nothing.shot_id(true), None);
}

// ============================================================================
// SECTION: Flags and Thumbnails
// ============================================================================

#[test]
fn add_in_position_defaults_to_false() {
    assert!(!params(json!({})).add_in_position(true));
    assert!(!params(json!({ "add_in_position": "yes" })).add_in_position(true));
}

#[test]
fn add_in_position_walks_the_same_precedence() {
    let parsed = params(json!({
        "orchestrator_details": { "add_in_position": true },
        "add_in_position": false
    }));
    assert!(parsed.add_in_position(false));
    let deep = params(json!({
        "full_orchestrator_payload": { "add_in_position": true }
    }));
    assert!(deep.add_in_position(true));
    assert!(!deep.add_in_position(false));
}

#[test]
fn thumbnail_url_accepts_the_camel_alias_at_top_level() {
    let parsed = params(json!({
        "orchestrator_details": { "thumbnail_url": "s3://thumbs/details.jpg" },
        "thumbnailUrl": "s3://thumbs/alias.jpg"
    }));
    assert_eq!(parsed.thumbnail_url(false).as_deref(), Some("s3://thumbs/details.jpg"));
    let alias_only = params(json!({ "thumbnailUrl": "s3://thumbs/alias.jpg" }));
    assert_eq!(alias_only.thumbnail_url(false).as_deref(), Some("s3://thumbs/alias.jpg"));
}

#[test]
fn model_reads_the_top_level_selector() {
    assert_eq!(params(json!({ "model": "flux-pro" })).model(), Some("flux-pro"));
    assert_eq!(params(json!({ "model": "" })).model(), None);
    assert_eq!(params(json!({})).model(), None);
}
