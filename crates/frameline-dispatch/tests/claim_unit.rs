// crates/frameline-dispatch/tests/claim_unit.rs
// ============================================================================
// Module: Claim Engine Unit Tests
// Description: FIFO ordering, gates, affinity, and claim bindings.
// Purpose: Validate the selection algorithm and the atomic claim transition.
// ============================================================================

//! ## Overview
//! Unit-level tests for the claim surface:
//! - FIFO ordering within capacity and the empty-queue result
//! - Dependency gating, including the dangling-reference rule
//! - Model affinity ranking and the same-model-only restriction
//! - Run-type filtering with lenient unknown labels
//! - Capability, credit, and concurrency gates per claim mode
//! - Worker auto-registration and claim bindings

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

use common::fixture;
use common::params_with_model;
use common::seed_generation_type;
use common::seed_project;
use common::seed_task;
use common::seed_task_type;
use common::seed_user;
use common::seed_user_flags;
use frameline_core::RunType;
use frameline_core::TaskCategory;
use frameline_core::TaskId;
use frameline_core::TaskParams;
use frameline_core::TaskStatus;
use frameline_core::Timestamp;
use frameline_core::Worker;
use frameline_core::WorkerId;
use frameline_core::WorkerStatus;
use frameline_core::interfaces::TaskStore;
use frameline_dispatch::AdmissionError;
use frameline_dispatch::ServiceClaimRequest;
use frameline_dispatch::UserClaimRequest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn service_request(worker: &str) -> ServiceClaimRequest {
    ServiceClaimRequest::new(WorkerId::new(worker))
}

fn seed_basic_queue(fx: &common::Fixture) {
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
}

// ============================================================================
// SECTION: FIFO Ordering
// ============================================================================

#[test]
fn claims_follow_fifo_within_capacity() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t2", "p1", "image_gen", TaskParams::new(), 2, &[]);
    seed_task(&fx.store, "t3", "p1", "image_gen", TaskParams::new(), 3, &[]);

    let request = service_request("worker-1");
    let first = fx.surface.claim_service(&request).unwrap().expect("first claim");
    let second = fx.surface.claim_service(&request).unwrap().expect("second claim");
    let third = fx.surface.claim_service(&request).unwrap().expect("third claim");
    assert_eq!(first.task_id, TaskId::new("t1"));
    assert_eq!(second.task_id, TaskId::new("t2"));
    assert_eq!(third.task_id, TaskId::new("t3"));
    assert!(fx.surface.claim_service(&request).unwrap().is_none());
}

#[test]
fn equal_timestamps_break_ties_by_task_id() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t-b", "p1", "image_gen", TaskParams::new(), 7, &[]);
    seed_task(&fx.store, "t-a", "p1", "image_gen", TaskParams::new(), 7, &[]);

    let claimed = fx.surface.claim_service(&service_request("worker-1")).unwrap().expect("claim");
    assert_eq!(claimed.task_id, TaskId::new("t-a"));
}

// ============================================================================
// SECTION: Concurrency Cap
// ============================================================================

#[test]
fn cap_exhaustion_yields_empty_claims() {
    let fx = fixture();
    seed_basic_queue(&fx);
    for index in 0 .. 5 {
        seed_task(
            &fx.store,
            &format!("t{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            i64::from(index),
            &[],
        );
    }
    let request = service_request("worker-1");
    for _ in 0 .. 5 {
        assert!(fx.surface.claim_service(&request).unwrap().is_some());
    }
    seed_task(&fx.store, "t-extra", "p1", "image_gen", TaskParams::new(), 99, &[]);
    assert!(fx.surface.claim_service(&request).unwrap().is_none());
}

#[test]
fn orchestrator_tasks_do_not_consume_capacity() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task_type(
        &fx.store,
        "travel_orchestrator",
        RunType::Api,
        TaskCategory::Orchestration,
        "travel-orchestrator",
        true,
    );
    for index in 0 .. 5 {
        seed_task(
            &fx.store,
            &format!("orch-{index}"),
            "p1",
            "travel_orchestrator",
            TaskParams::new(),
            i64::from(index),
            &[],
        );
    }
    let request = service_request("worker-1");
    for _ in 0 .. 5 {
        assert!(fx.surface.claim_service(&request).unwrap().is_some());
    }
    seed_task(&fx.store, "t-image", "p1", "image_gen", TaskParams::new(), 50, &[]);
    let claimed = fx.surface.claim_service(&request).unwrap().expect("image claim");
    assert_eq!(claimed.task_id, TaskId::new("t-image"));
}

// ============================================================================
// SECTION: Dependency Gate
// ============================================================================

#[test]
fn dependency_gate_releases_after_completion() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t-parent", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-child", "p1", "image_gen", TaskParams::new(), 2, &["t-parent"]);

    let request = service_request("worker-1");
    let parent = fx.surface.claim_service(&request).unwrap().expect("parent claim");
    assert_eq!(parent.task_id, TaskId::new("t-parent"));
    assert!(fx.surface.claim_service(&request).unwrap().is_none());

    assert!(fx.surface.mark_complete(&TaskId::new("t-parent"), "s3://outputs/parent.png").unwrap());
    let child = fx.surface.claim_service(&request).unwrap().expect("child claim");
    assert_eq!(child.task_id, TaskId::new("t-child"));
}

#[test]
fn dangling_dependency_is_never_claimed() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t-child", "p1", "image_gen", TaskParams::new(), 1, &["t-missing"]);

    assert!(fx.surface.claim_service(&service_request("worker-1")).unwrap().is_none());
}

#[test]
fn failed_dependency_keeps_child_blocked() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t-parent", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-child", "p1", "image_gen", TaskParams::new(), 2, &["t-parent"]);

    let request = service_request("worker-1");
    fx.surface.claim_service(&request).unwrap().expect("parent claim");
    assert!(fx.surface.mark_failed(&TaskId::new("t-parent"), "oom").unwrap());
    assert!(fx.surface.claim_service(&request).unwrap().is_none());
}

// ============================================================================
// SECTION: Model Affinity
// ============================================================================

#[test]
fn affinity_prefers_same_model_over_fifo() {
    let fx = fixture();
    seed_basic_queue(&fx);
    fx.store
        .upsert_worker(&Worker {
            id: WorkerId::new("worker-pro"),
            instance_type: "gpu".to_string(),
            status: WorkerStatus::Active,
            last_heartbeat: Some(Timestamp::from_unix_millis(1)),
            current_model: Some("flux-pro".to_string()),
            metadata: serde_json::Map::new(),
        })
        .unwrap();
    seed_task(&fx.store, "t-a", "p1", "image_gen", params_with_model("flux-dev"), 1, &[]);
    seed_task(&fx.store, "t-b", "p1", "image_gen", params_with_model("flux-pro"), 2, &[]);

    let claimed =
        fx.surface.claim_service(&service_request("worker-pro")).unwrap().expect("claim");
    assert_eq!(claimed.task_id, TaskId::new("t-b"));
}

#[test]
fn same_model_only_skips_mismatched_tasks() {
    let fx = fixture();
    seed_basic_queue(&fx);
    fx.store
        .upsert_worker(&Worker {
            id: WorkerId::new("worker-pro"),
            instance_type: "gpu".to_string(),
            status: WorkerStatus::Active,
            last_heartbeat: Some(Timestamp::from_unix_millis(1)),
            current_model: Some("flux-pro".to_string()),
            metadata: serde_json::Map::new(),
        })
        .unwrap();
    seed_task(&fx.store, "t-a", "p1", "image_gen", params_with_model("flux-dev"), 1, &[]);

    let mut request = service_request("worker-pro");
    request.same_model_only = true;
    assert!(fx.surface.claim_service(&request).unwrap().is_none());
    request.same_model_only = false;
    assert!(fx.surface.claim_service(&request).unwrap().is_some());
}

// ============================================================================
// SECTION: Run-Type Filter
// ============================================================================

#[test]
fn run_type_filter_selects_matching_tasks() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_task_type(&fx.store, "gpu_gen", RunType::Gpu, TaskCategory::Generation, "flux-image", true);
    seed_task_type(&fx.store, "api_gen", RunType::Api, TaskCategory::Generation, "dalle", true);
    seed_task(&fx.store, "t-gpu", "p1", "gpu_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-api", "p1", "api_gen", TaskParams::new(), 2, &[]);

    let mut request = service_request("worker-1");
    request.run_type = Some("api".to_string());
    let claimed = fx.surface.claim_service(&request).unwrap().expect("api claim");
    assert_eq!(claimed.task_id, TaskId::new("t-api"));
}

#[test]
fn unknown_run_type_label_means_no_filter() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    let mut request = service_request("worker-1");
    request.run_type = Some("warp".to_string());
    let claimed = fx.surface.claim_service(&request).unwrap().expect("claim");
    assert_eq!(claimed.task_id, TaskId::new("t1"));
}

#[test]
fn inactive_task_types_are_never_claimed() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_task_type(
        &fx.store,
        "retired_gen",
        RunType::Gpu,
        TaskCategory::Generation,
        "flux-image",
        false,
    );
    seed_task(&fx.store, "t1", "p1", "retired_gen", TaskParams::new(), 1, &[]);

    assert!(fx.surface.claim_service(&service_request("worker-1")).unwrap().is_none());
}

// ============================================================================
// SECTION: Credit and Capability Gates
// ============================================================================

#[test]
fn zero_credits_block_claims_unless_bypassed() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 0);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    assert!(fx.surface.claim_service(&service_request("worker-1")).unwrap().is_none());
    let mut request = UserClaimRequest::new("u1".into());
    assert!(fx.surface.claim_user(&request).unwrap().is_none());
    request.bypass_credit_gate = true;
    assert!(fx.surface.claim_user(&request).unwrap().is_some());
}

#[test]
fn capability_flags_gate_per_claim_mode() {
    let fx = fixture();
    seed_user_flags(&fx.store, "u-nocloud", 10, false, true);
    seed_project(&fx.store, "p1", "u-nocloud");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    assert!(fx.surface.claim_service(&service_request("worker-1")).unwrap().is_none());
    let claimed =
        fx.surface.claim_user(&UserClaimRequest::new("u-nocloud".into())).unwrap().expect("local");
    assert_eq!(claimed.task_id, TaskId::new("t1"));
}

// ============================================================================
// SECTION: Claim Bindings
// ============================================================================

#[test]
fn unknown_worker_is_auto_registered() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    fx.surface.claim_service(&service_request("worker-new")).unwrap().expect("claim");
    let worker = fx.store.load_worker(&WorkerId::new("worker-new")).unwrap().expect("registered");
    assert_eq!(worker.instance_type, "external");
    assert_eq!(worker.status, WorkerStatus::Active);
    assert!(worker.last_heartbeat.is_some());
}

#[test]
fn service_claim_binds_worker_and_start_time() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    fx.surface.claim_service(&service_request("worker-1")).unwrap().expect("claim");
    let task = fx.store.load_task(&TaskId::new("t1")).unwrap().expect("task");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.worker_id, Some(WorkerId::new("worker-1")));
    assert!(task.generation_started_at.is_some());
}

#[test]
fn user_claim_leaves_worker_unbound() {
    let fx = fixture();
    seed_basic_queue(&fx);
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);

    fx.surface.claim_user(&UserClaimRequest::new("u1".into())).unwrap().expect("claim");
    let task = fx.store.load_task(&TaskId::new("t1")).unwrap().expect("task");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.worker_id.is_none());
}

#[test]
fn user_claim_for_unknown_user_is_not_found() {
    let fx = fixture();
    let result = fx.surface.claim_user(&UserClaimRequest::new("u-ghost".into()));
    assert!(matches!(result, Err(AdmissionError::NotFound(_))));
}
