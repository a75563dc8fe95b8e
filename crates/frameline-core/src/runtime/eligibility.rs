// crates/frameline-core/src/runtime/eligibility.rs
// ============================================================================
// Module: Frameline Eligibility Evaluator
// Description: Credit, capability, concurrency, dependency, and run-type gates.
// Purpose: Decide claimability and map each failure to a single rejection reason.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! A task is claimable-now iff its owning user has credits, the capability
//! flag matching the claim mode is enabled, the user is under the per-user
//! concurrency cap, the task's dependency set is satisfied, and the task
//! type passes the run-type filter. Evaluation is pure: callers supply
//! snapshots, the evaluator returns at most one rejection reason following
//! the documented precedence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TaskId;
use crate::core::identifiers::UserId;
use crate::core::registry::RunType;
use crate::core::task::TaskStatus;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Hard per-user cap on concurrent non-orchestrator In-Progress tasks.
pub const PER_USER_CONCURRENCY_CAP: usize = 5;

// ============================================================================
// SECTION: Claim Mode
// ============================================================================

/// Mode under which a claim or count is evaluated.
///
/// # Invariants
/// - Service mode gates on `allows_cloud`; user mode gates on `allows_local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClaimMode {
    /// Cloud worker claim selecting across all users.
    Service,
    /// Local claim restricted to one user.
    User {
        /// Personal-access-token flavor bypasses the credit gate.
        bypass_credit_gate: bool,
    },
}

// ============================================================================
// SECTION: Rejection Reasons
// ============================================================================

/// Single rejection reason assigned to an unclaimable task.
///
/// # Invariants
/// - Precedence is `NoCredits`, then the capability flag, then
///   `ConcurrencyLimit`, then `DependencyBlocked`, then `WrongRunType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Owning user has no credits.
    NoCredits,
    /// Owning user has disabled cloud execution.
    CloudDisabled,
    /// Owning user has disabled local execution.
    LocalDisabled,
    /// Owning user is at the per-user concurrency cap.
    ConcurrencyLimit,
    /// The task's dependency set is not satisfied.
    DependencyBlocked,
    /// The task type's run type does not match the filter.
    WrongRunType,
}

impl RejectionReason {
    /// Returns a stable label for analysis output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoCredits => "no_credits",
            Self::CloudDisabled => "cloud_disabled",
            Self::LocalDisabled => "local_disabled",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::DependencyBlocked => "dependency_blocked",
            Self::WrongRunType => "wrong_run_type",
        }
    }
}

// ============================================================================
// SECTION: User Snapshot
// ============================================================================

/// Point-in-time view of a user's claim-relevant state.
///
/// # Invariants
/// - `in_progress` counts non-orchestrator In-Progress tasks only.
/// - `cloud_in_progress` additionally restricts to worker-bound tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCapacitySnapshot {
    /// User identifier.
    pub user_id: UserId,
    /// Credit balance at snapshot time.
    pub credits: i64,
    /// Cloud capability flag.
    pub allows_cloud: bool,
    /// Local capability flag.
    pub allows_local: bool,
    /// Non-orchestrator In-Progress count.
    pub in_progress: usize,
    /// Non-orchestrator In-Progress count restricted to cloud-claimed
    /// (worker-bound) tasks.
    pub cloud_in_progress: usize,
}

// ============================================================================
// SECTION: Evaluators
// ============================================================================

/// Evaluates the user-level gates: credits, capability flag, concurrency.
///
/// Returns the highest-precedence rejection, or `None` when the user could
/// accept a new claim right now.
#[must_use]
pub fn user_rejection(
    snapshot: &UserCapacitySnapshot,
    mode: ClaimMode,
    cap: usize,
) -> Option<RejectionReason> {
    let credit_gated = match mode {
        ClaimMode::Service => true,
        ClaimMode::User {
            bypass_credit_gate,
        } => !bypass_credit_gate,
    };
    if credit_gated && snapshot.credits <= 0 {
        return Some(RejectionReason::NoCredits);
    }
    match mode {
        ClaimMode::Service if !snapshot.allows_cloud => {
            return Some(RejectionReason::CloudDisabled);
        }
        ClaimMode::User {
            ..
        } if !snapshot.allows_local => {
            return Some(RejectionReason::LocalDisabled);
        }
        ClaimMode::Service
        | ClaimMode::User {
            ..
        } => {}
    }
    if snapshot.in_progress >= cap {
        return Some(RejectionReason::ConcurrencyLimit);
    }
    None
}

/// Evaluates a dependency set against resolved task statuses.
///
/// An empty set is trivially satisfied. A dangling reference (identifier
/// missing from `statuses`) is not satisfied.
#[must_use]
pub fn dependencies_satisfied(
    dependant_on: &BTreeSet<TaskId>,
    statuses: &BTreeMap<TaskId, TaskStatus>,
) -> bool {
    dependant_on
        .iter()
        .all(|dependency| statuses.get(dependency) == Some(&TaskStatus::Complete))
}

/// Evaluates the task-level gates: dependency readiness and run-type filter.
#[must_use]
pub fn task_rejection(
    dependencies_ok: bool,
    run_type: RunType,
    filter: Option<RunType>,
) -> Option<RejectionReason> {
    if !dependencies_ok {
        return Some(RejectionReason::DependencyBlocked);
    }
    if let Some(wanted) = filter
        && run_type != wanted
    {
        return Some(RejectionReason::WrongRunType);
    }
    None
}

/// Evaluates the full gate chain for one task, in precedence order.
#[must_use]
pub fn claim_rejection(
    snapshot: &UserCapacitySnapshot,
    mode: ClaimMode,
    cap: usize,
    dependencies_ok: bool,
    run_type: RunType,
    filter: Option<RunType>,
) -> Option<RejectionReason> {
    user_rejection(snapshot, mode, cap)
        .or_else(|| task_rejection(dependencies_ok, run_type, filter))
}
