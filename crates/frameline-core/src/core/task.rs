// crates/frameline-core/src/core/task.rs
// ============================================================================
// Module: Frameline Task Model
// Description: Task rows, lifecycle status, and legal status transitions.
// Purpose: Capture the queue's primary contended entity and its state machine.
// Dependencies: crate::core::{identifiers, params, time}, serde
// ============================================================================

//! ## Overview
//! A task is the unit of queued work. Its status follows a strict lifecycle:
//! `Queued` to `InProgress`, then exactly one of `Complete`, `Failed`, or
//! `Cancelled`; terminal states are absorbing. Only the claim engine moves a
//! task into `InProgress` and only the completion/failure path moves it into
//! a terminal state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ProjectId;
use crate::core::identifiers::TaskId;
use crate::core::identifiers::TaskTypeName;
use crate::core::identifiers::UserId;
use crate::core::identifiers::WorkerId;
use crate::core::params::TaskParams;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Task Status
// ============================================================================

/// Task lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting for a claim.
    Queued,
    /// Task has been claimed and is executing.
    InProgress,
    /// Task finished successfully and produced an output location.
    Complete,
    /// Task finished with an error.
    Failed,
    /// Task was cancelled while executing.
    Cancelled,
}

impl TaskStatus {
    /// Every lifecycle status, for inverse transition lookups.
    pub const ALL: [Self; 5] =
        [Self::Queued, Self::InProgress, Self::Complete, Self::Failed, Self::Cancelled];

    /// Returns the stable persistence label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a persistence label back into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "queued" => Some(Self::Queued),
            "in_progress" => Some(Self::InProgress),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true for absorbing states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Returns true when the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::InProgress),
            Self::InProgress => next.is_terminal(),
            Self::Complete | Self::Failed | Self::Cancelled => false,
        }
    }
}

// ============================================================================
// SECTION: Task Row
// ============================================================================

/// Task row holding queue state and claim bindings.
///
/// # Invariants
/// - `worker_id` is bound by a service-mode claim and preserved through
///   terminal transitions; user-mode claims leave it unbound.
/// - `generation_started_at` is set exactly when `Queued` to `InProgress`
///   occurred; `generation_processed_at` exactly when a terminal transition
///   occurred.
/// - `generation_created` latches true at most once, by the completion
///   engine, and only for generation-category task types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier.
    pub id: TaskId,
    /// Owning project identifier.
    pub project_id: ProjectId,
    /// Registry key for the task type.
    pub task_type: TaskTypeName,
    /// Opaque structured payload.
    pub params: TaskParams,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Set of task identifiers this task depends on.
    pub dependant_on: BTreeSet<TaskId>,
    /// Output location populated on completion.
    pub output_location: Option<String>,
    /// Error message populated on failure.
    pub error_message: Option<String>,
    /// Worker bound by a service-mode claim.
    pub worker_id: Option<WorkerId>,
    /// Creation timestamp driving FIFO ordering.
    pub created_at: Timestamp,
    /// Timestamp of the most recent mutation.
    pub updated_at: Option<Timestamp>,
    /// Timestamp of the `Queued` to `InProgress` transition.
    pub generation_started_at: Option<Timestamp>,
    /// Timestamp of the terminal transition.
    pub generation_processed_at: Option<Timestamp>,
    /// Latch marking that a generation has been materialized for this task.
    pub generation_created: bool,
}

impl Task {
    /// Creates a freshly queued task with no claim bindings.
    #[must_use]
    pub fn queued(
        id: TaskId,
        project_id: ProjectId,
        task_type: TaskTypeName,
        params: TaskParams,
        dependant_on: BTreeSet<TaskId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            project_id,
            task_type,
            params,
            status: TaskStatus::Queued,
            dependant_on,
            output_location: None,
            error_message: None,
            worker_id: None,
            created_at,
            updated_at: None,
            generation_started_at: None,
            generation_processed_at: None,
            generation_created: false,
        }
    }
}

/// Task row paired with the owning user resolved through its project.
///
/// # Invariants
/// - `user_id` is the owner of the task's project at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithOwner {
    /// Task row.
    pub task: Task,
    /// Owning user identifier.
    pub user_id: UserId,
}
