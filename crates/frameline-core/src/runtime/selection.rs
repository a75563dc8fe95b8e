// crates/frameline-core/src/runtime/selection.rs
// ============================================================================
// Module: Frameline Selection Order and Capacity Math
// Description: Affinity-aware FIFO ordering keys and capacity-bounded counts.
// Purpose: Make claim ordering and count arithmetic deterministic and pure.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Claim candidates are ordered by affinity rank, then creation time, then
//! task identifier, which is deterministic across processes. Count surfaces
//! never report raw eligibility; they report capacity-bounded integers that
//! respect the per-user concurrency cap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::task::Task;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Affinity Ordering
// ============================================================================

/// Deterministic ordering key for claim candidates.
///
/// # Invariants
/// - Ordering is affinity rank, then `created_at` ascending, then task
///   identifier ascending.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClaimOrderKey {
    /// Affinity rank; 0 for same-model tasks, 1 otherwise.
    pub affinity_rank: u8,
    /// Task creation timestamp.
    pub created_at: Timestamp,
    /// Task identifier, the final deterministic tie-break.
    pub task_id: String,
}

/// Ranks a task's model selector against a worker's loaded model.
///
/// Rank 0 means the task selects exactly the worker's model. With no worker
/// model every task ranks 0, which degenerates to plain FIFO.
#[must_use]
pub fn affinity_rank(task_model: Option<&str>, worker_model: Option<&str>) -> u8 {
    match worker_model {
        None => 0,
        Some(loaded) => u8::from(task_model != Some(loaded)),
    }
}

/// Builds the claim ordering key for a candidate task.
#[must_use]
pub fn claim_order_key(task: &Task, worker_model: Option<&str>) -> ClaimOrderKey {
    ClaimOrderKey {
        affinity_rank: affinity_rank(task.params.model(), worker_model),
        created_at: task.created_at,
        task_id: task.id.as_str().to_string(),
    }
}

// ============================================================================
// SECTION: Capacity Math
// ============================================================================

/// Number of new claims a user could immediately absorb.
///
/// Computed as `max(0, min(cap - in_progress, queued_ready))`.
#[must_use]
pub const fn immediate_capacity(in_progress: usize, queued_ready: usize, cap: usize) -> usize {
    let headroom = cap.saturating_sub(in_progress);
    if queued_ready < headroom { queued_ready } else { headroom }
}

/// Total active plus claimable work for a user, capped at the concurrency
/// limit.
///
/// Computed as `min(cap, in_progress + queued_ready)`.
#[must_use]
pub const fn active_capacity(in_progress: usize, queued_ready: usize, cap: usize) -> usize {
    let total = in_progress.saturating_add(queued_ready);
    if total < cap { total } else { cap }
}
