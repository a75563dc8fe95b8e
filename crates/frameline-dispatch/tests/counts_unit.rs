// crates/frameline-dispatch/tests/counts_unit.rs
// ============================================================================
// Module: Count Engine Unit Tests
// Description: Capacity-bounded counts, breakdown buckets, and analysis.
// Purpose: Validate the scaling signals respect the per-user cap and the
//          cloud-claimed filter.
// ============================================================================

//! ## Overview
//! Unit-level tests for the count and analysis surface:
//! - Capacity-bounded counting with and without active tasks
//! - The cloud-claimed filter that keeps local claims out of cloud signals
//! - Breakdown bucket precedence (credits, settings, deps, capacity)
//! - Rejection-reason analysis, per-user statistics, and stuck reporting

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
use common::seed_generation_type;
use common::seed_project;
use common::seed_task;
use common::seed_task_type;
use common::seed_user;
use common::seed_user_flags;
use frameline_core::RunType;
use frameline_core::TaskCategory;
use frameline_core::TaskParams;
use frameline_core::UserId;
use frameline_core::WorkerId;
use frameline_dispatch::ServiceClaimRequest;
use frameline_dispatch::UserClaimRequest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn claim_n_service(fx: &common::Fixture, n: usize) {
    let request = ServiceClaimRequest::new(WorkerId::new("worker-counts"));
    for _ in 0 .. n {
        fx.surface.claim_service(&request).unwrap().expect("seed claim");
    }
}

// ============================================================================
// SECTION: Capacity-Bounded Counts
// ============================================================================

#[test]
fn counts_collapse_to_zero_at_the_cap() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    for index in 0 .. 5 {
        seed_task(
            &fx.store,
            &format!("busy-{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            i64::from(index),
            &[],
        );
    }
    claim_n_service(&fx, 5);
    for index in 0 .. 3 {
        seed_task(
            &fx.store,
            &format!("waiting-{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            100 + i64::from(index),
            &[],
        );
    }

    assert_eq!(fx.surface.count_eligible_service(false, None).unwrap(), 0);
    assert_eq!(fx.surface.count_eligible_service(true, None).unwrap(), 5);
    let request = ServiceClaimRequest::new(WorkerId::new("worker-counts"));
    assert!(fx.surface.claim_service(&request).unwrap().is_none());
}

#[test]
fn immediate_count_reports_remaining_headroom() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t2", "p1", "image_gen", TaskParams::new(), 2, &[]);
    claim_n_service(&fx, 2);
    for index in 0 .. 6 {
        seed_task(
            &fx.store,
            &format!("q-{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            10 + i64::from(index),
            &[],
        );
    }

    // Headroom is 3 even though 6 tasks are queued.
    assert_eq!(fx.surface.count_eligible_service(false, None).unwrap(), 3);
    assert_eq!(fx.surface.count_eligible_service(true, None).unwrap(), 5);
}

#[test]
fn local_claims_do_not_inflate_cloud_signals() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t2", "p1", "image_gen", TaskParams::new(), 2, &[]);
    let request = UserClaimRequest::new(UserId::new("u1"));
    fx.surface.claim_user(&request).unwrap().expect("local claim");
    fx.surface.claim_user(&request).unwrap().expect("local claim");
    seed_task(&fx.store, "t3", "p1", "image_gen", TaskParams::new(), 3, &[]);

    // Local claims count toward the cap but not toward cloud-active totals.
    assert_eq!(fx.surface.count_eligible_service(false, None).unwrap(), 1);
    assert_eq!(fx.surface.count_eligible_service(true, None).unwrap(), 1);
}

#[test]
fn dependency_blocked_tasks_are_not_counted() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t-ready", "p1", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-blocked", "p1", "image_gen", TaskParams::new(), 2, &["t-ready"]);
    seed_task(&fx.store, "t-dangling", "p1", "image_gen", TaskParams::new(), 3, &["t-ghost"]);

    assert_eq!(fx.surface.count_eligible_service(false, None).unwrap(), 1);
}

#[test]
fn user_count_respects_local_flag_and_run_filter() {
    let fx = fixture();
    seed_user_flags(&fx.store, "u-nolocal", 10, true, false);
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p-nolocal", "u-nolocal");
    seed_project(&fx.store, "p1", "u1");
    seed_task_type(&fx.store, "gpu_gen", RunType::Gpu, TaskCategory::Generation, "flux-image", true);
    seed_task_type(&fx.store, "api_gen", RunType::Api, TaskCategory::Generation, "dalle", true);
    seed_task(&fx.store, "t-blocked", "p-nolocal", "gpu_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-gpu", "p1", "gpu_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-api", "p1", "api_gen", TaskParams::new(), 2, &[]);

    assert_eq!(
        fx.surface.count_eligible_user(&UserId::new("u-nolocal"), false, None).unwrap(),
        0
    );
    assert_eq!(fx.surface.count_eligible_user(&UserId::new("u1"), false, None).unwrap(), 2);
    assert_eq!(
        fx.surface.count_eligible_user(&UserId::new("u1"), false, Some("api")).unwrap(),
        1
    );
}

// ============================================================================
// SECTION: Breakdown Buckets
// ============================================================================

#[test]
fn breakdown_partitions_by_precedence() {
    let fx = fixture();
    seed_generation_type(&fx.store, "image_gen", "flux-image");

    // Credit-less user: excluded entirely.
    seed_user(&fx.store, "u-poor", 0);
    seed_project(&fx.store, "p-poor", "u-poor");
    seed_task(&fx.store, "t-poor", "p-poor", "image_gen", TaskParams::new(), 1, &[]);

    // Cloud-disabled user: all queued tasks land in settings.
    seed_user_flags(&fx.store, "u-nocloud", 10, false, true);
    seed_project(&fx.store, "p-nocloud", "u-nocloud");
    seed_task(&fx.store, "t-nocloud", "p-nocloud", "image_gen", TaskParams::new(), 1, &[]);

    // Healthy user: one ready, one dependency-blocked.
    seed_user(&fx.store, "u-ok", 10);
    seed_project(&fx.store, "p-ok", "u-ok");
    seed_task(&fx.store, "t-ready", "p-ok", "image_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-dep", "p-ok", "image_gen", TaskParams::new(), 2, &["t-ghost"]);

    let breakdown = fx.surface.count_breakdown_service(None).unwrap();
    assert_eq!(breakdown.total, 3);
    assert_eq!(breakdown.claimable_now, 1);
    assert_eq!(breakdown.blocked_by_capacity, 0);
    assert_eq!(breakdown.blocked_by_deps, 1);
    assert_eq!(breakdown.blocked_by_settings, 1);
}

#[test]
fn breakdown_splits_ready_tasks_across_headroom() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    for index in 0 .. 4 {
        seed_task(
            &fx.store,
            &format!("busy-{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            i64::from(index),
            &[],
        );
    }
    claim_n_service(&fx, 4);
    seed_task(&fx.store, "t-first", "p1", "image_gen", TaskParams::new(), 10, &[]);
    seed_task(&fx.store, "t-second", "p1", "image_gen", TaskParams::new(), 11, &[]);

    let breakdown = fx.surface.count_breakdown_service(None).unwrap();
    assert_eq!(breakdown.total, 2);
    assert_eq!(breakdown.claimable_now, 1);
    assert_eq!(breakdown.blocked_by_capacity, 1);
}

// ============================================================================
// SECTION: Analysis
// ============================================================================

#[test]
fn analysis_assigns_single_reasons_by_precedence() {
    let fx = fixture();
    seed_generation_type(&fx.store, "image_gen", "flux-image");

    seed_user(&fx.store, "u-poor", 0);
    seed_project(&fx.store, "p-poor", "u-poor");
    // Also dependency-blocked, but no_credits takes precedence.
    seed_task(&fx.store, "t-poor", "p-poor", "image_gen", TaskParams::new(), 1, &["t-ghost"]);

    seed_user_flags(&fx.store, "u-nocloud", 10, false, true);
    seed_project(&fx.store, "p-nocloud", "u-nocloud");
    seed_task(&fx.store, "t-nocloud", "p-nocloud", "image_gen", TaskParams::new(), 1, &[]);

    seed_user(&fx.store, "u-ok", 10);
    seed_project(&fx.store, "p-ok", "u-ok");
    seed_task(&fx.store, "t-dep", "p-ok", "image_gen", TaskParams::new(), 1, &["t-ghost"]);
    seed_task(&fx.store, "t-ready", "p-ok", "image_gen", TaskParams::new(), 2, &[]);

    let analysis = fx.surface.analyze_service(false, None).unwrap();
    assert_eq!(analysis.total_queued, 4);
    assert_eq!(analysis.eligible, 1);
    assert_eq!(analysis.rejections.no_credits, 1);
    assert_eq!(analysis.rejections.cloud_disabled, 1);
    assert_eq!(analysis.rejections.dependency_blocked, 1);
    assert_eq!(analysis.rejections.wrong_run_type, 0);

    let stats = analysis
        .users
        .iter()
        .find(|stats| stats.user_id == UserId::new("u-ok"))
        .expect("u-ok stats");
    assert_eq!(stats.queued, 2);
    assert!(!stats.at_limit);
    assert!(stats.allows_cloud);
}

#[test]
fn analysis_flags_users_at_the_cap() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    for index in 0 .. 5 {
        seed_task(
            &fx.store,
            &format!("busy-{index}"),
            "p1",
            "image_gen",
            TaskParams::new(),
            i64::from(index),
            &[],
        );
    }
    claim_n_service(&fx, 5);
    seed_task(&fx.store, "t-waiting", "p1", "image_gen", TaskParams::new(), 50, &[]);

    let analysis = fx.surface.analyze_service(false, None).unwrap();
    assert_eq!(analysis.rejections.concurrency_limit, 1);
    let stats = analysis.users.first().expect("user stats");
    assert!(stats.at_limit);
    assert_eq!(stats.in_progress, 5);
}

#[test]
fn analysis_reports_stuck_tasks_after_threshold() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_generation_type(&fx.store, "image_gen", "flux-image");
    seed_task(&fx.store, "t1", "p1", "image_gen", TaskParams::new(), 1, &[]);
    claim_n_service(&fx, 1);

    let fresh = fx.surface.analyze_service(false, None).unwrap();
    assert_eq!(fresh.stuck_in_progress, 0);

    fx.clock.advance_millis(11 * 60 * 1_000);
    let aged = fx.surface.analyze_service(false, None).unwrap();
    assert_eq!(aged.stuck_in_progress, 1);
}

#[test]
fn run_type_filter_produces_wrong_run_type_rejections() {
    let fx = fixture();
    seed_user(&fx.store, "u1", 10);
    seed_project(&fx.store, "p1", "u1");
    seed_task_type(&fx.store, "gpu_gen", RunType::Gpu, TaskCategory::Generation, "flux-image", true);
    seed_task_type(&fx.store, "api_gen", RunType::Api, TaskCategory::Generation, "dalle", true);
    seed_task(&fx.store, "t-gpu", "p1", "gpu_gen", TaskParams::new(), 1, &[]);
    seed_task(&fx.store, "t-api", "p1", "api_gen", TaskParams::new(), 2, &[]);

    let analysis = fx.surface.analyze_service(false, Some("api")).unwrap();
    assert_eq!(analysis.eligible, 1);
    assert_eq!(analysis.rejections.wrong_run_type, 1);
    assert_eq!(fx.surface.count_eligible_service(false, Some("api")).unwrap(), 1);
}
