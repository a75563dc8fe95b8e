// crates/frameline-core/src/interfaces/mod.rs
// ============================================================================
// Module: Frameline Store Interfaces
// Description: Backend-agnostic datastore contracts for scheduler engines.
// Purpose: Define the persistence surface without embedding backend details.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the scheduler integrates with its datastore without
//! embedding backend-specific details. The datastore must offer an atomic
//! guarded status transition (compare-and-swap on status) and must execute
//! staged timeline-frame writes inside one transaction, rebuilding the
//! denormalized `shot_data` index before commit. Implementations fail closed
//! on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::account::Project;
use crate::core::account::User;
use crate::core::identifiers::GenerationId;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::ShotId;
use crate::core::identifiers::ShotLinkId;
use crate::core::identifiers::TaskId;
use crate::core::identifiers::TaskTypeName;
use crate::core::identifiers::UserId;
use crate::core::identifiers::WorkerId;
use crate::core::media::Generation;
use crate::core::media::Shot;
use crate::core::media::ShotLink;
use crate::core::registry::TaskTypeSpec;
use crate::core::task::Task;
use crate::core::task::TaskStatus;
use crate::core::task::TaskWithOwner;
use crate::core::time::Timestamp;
use crate::core::worker::Worker;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Datastore errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Contention on a guarded transition is not an error; it surfaces as a
///   false return from [`TaskStore::transition_task`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Database engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Invalid store data or request.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Referenced entity is absent.
    #[error("store entity not found: {0}")]
    NotFound(String),
    /// Integrity constraint violated at commit.
    #[error("store integrity violation: {0}")]
    Conflict(String),
    /// Store schema version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
}

// ============================================================================
// SECTION: Guarded Transitions
// ============================================================================

/// Field set written by a guarded status transition.
///
/// # Invariants
/// - The transition is applied only when the current status matches the
///   caller's expected set; otherwise no field is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransition {
    /// Target status.
    pub to: TaskStatus,
    /// Worker binding written by service-mode claims.
    pub worker_id: Option<WorkerId>,
    /// Output location written on completion.
    pub output_location: Option<String>,
    /// Error message written on failure.
    pub error_message: Option<String>,
    /// Start timestamp written by claims.
    pub generation_started_at: Option<Timestamp>,
    /// Terminal timestamp written by completion and failure.
    pub generation_processed_at: Option<Timestamp>,
    /// Mutation timestamp, always written.
    pub updated_at: Timestamp,
}

impl TaskTransition {
    /// Builds the claim transition into `InProgress`.
    ///
    /// Service-mode claims bind a worker; user-mode claims pass `None`.
    #[must_use]
    pub const fn claim(worker_id: Option<WorkerId>, now: Timestamp) -> Self {
        Self {
            to: TaskStatus::InProgress,
            worker_id,
            output_location: None,
            error_message: None,
            generation_started_at: Some(now),
            generation_processed_at: None,
            updated_at: now,
        }
    }

    /// Builds the completion transition into `Complete`.
    #[must_use]
    pub const fn complete(output_location: String, now: Timestamp) -> Self {
        Self {
            to: TaskStatus::Complete,
            worker_id: None,
            output_location: Some(output_location),
            error_message: None,
            generation_started_at: None,
            generation_processed_at: Some(now),
            updated_at: now,
        }
    }

    /// Builds the failure transition into `Failed`.
    #[must_use]
    pub const fn fail(error_message: String, now: Timestamp) -> Self {
        Self {
            to: TaskStatus::Failed,
            worker_id: None,
            output_location: None,
            error_message: Some(error_message),
            generation_started_at: None,
            generation_processed_at: Some(now),
            updated_at: now,
        }
    }

    /// Builds the cancellation transition into `Cancelled`.
    #[must_use]
    pub const fn cancel(now: Timestamp) -> Self {
        Self {
            to: TaskStatus::Cancelled,
            worker_id: None,
            output_location: None,
            error_message: None,
            generation_started_at: None,
            generation_processed_at: Some(now),
            updated_at: now,
        }
    }
}

// ============================================================================
// SECTION: Timeline Frame Writes
// ============================================================================

/// Single timeline-frame write within a staged batch.
///
/// # Invariants
/// - The link must belong to the shot the batch targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameWrite {
    /// Target shot-link identifier.
    pub link_id: ShotLinkId,
    /// New frame value; `None` parks the link unpositioned.
    pub timeline_frame: Option<u32>,
}

// ============================================================================
// SECTION: Account Store
// ============================================================================

/// Persistence surface for users and projects.
pub trait AccountStore {
    /// Inserts a user row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Loads a user by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_user(&self, user_id: &UserId) -> Result<Option<User>, StoreError>;

    /// Lists all users.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Inserts a project row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails or the owner is absent.
    fn insert_project(&self, project: &Project) -> Result<(), StoreError>;

    /// Loads a project by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_project(&self, project_id: &ProjectId) -> Result<Option<Project>, StoreError>;

    /// Deletes a project, cascading to its tasks, generations, and shots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_project(&self, project_id: &ProjectId) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Task Store
// ============================================================================

/// Persistence surface for tasks, the task-type registry, and workers.
pub trait TaskStore {
    /// Inserts or replaces a task-type registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_task_type(&self, spec: &TaskTypeSpec) -> Result<(), StoreError>;

    /// Loads a task-type registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_task_type(&self, name: &TaskTypeName) -> Result<Option<TaskTypeSpec>, StoreError>;

    /// Inserts or replaces a worker row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_worker(&self, worker: &Worker) -> Result<(), StoreError>;

    /// Loads a worker by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, StoreError>;

    /// Refreshes a worker's heartbeat timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn touch_worker_heartbeat(&self, worker_id: &WorkerId, now: Timestamp)
    -> Result<(), StoreError>;

    /// Inserts a task row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails or the project is absent.
    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Loads a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_task(&self, task_id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Resolves the statuses of the referenced tasks.
    ///
    /// Missing identifiers are absent from the result, which the dependency
    /// evaluator treats as unsatisfied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn task_statuses(&self, task_ids: &[TaskId])
    -> Result<BTreeMap<TaskId, TaskStatus>, StoreError>;

    /// Lists queued tasks with their owning users, ordered by creation time
    /// then identifier, optionally restricted to one user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn queued_tasks(&self, user_id: Option<&UserId>) -> Result<Vec<TaskWithOwner>, StoreError>;

    /// Counts a user's non-orchestrator In-Progress tasks; `cloud_only`
    /// restricts to worker-bound tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn in_progress_count(&self, user_id: &UserId, cloud_only: bool) -> Result<usize, StoreError>;

    /// Counts In-Progress tasks whose claim started strictly before the
    /// cutoff, the stuck-task reporting signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn in_progress_started_before(&self, cutoff: Timestamp) -> Result<usize, StoreError>;

    /// Atomically claims a queued task.
    ///
    /// The single guarded write checks both the `Queued` status and the
    /// owner's per-user cap on non-orchestrator In-Progress tasks, so racing
    /// claims can neither double-claim a task nor push a user past the cap.
    /// Returns true when the claim bound; false on contention or a full cap.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn claim_task(
        &self,
        task_id: &TaskId,
        worker_id: Option<&WorkerId>,
        cap: usize,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Applies a guarded status transition.
    ///
    /// Returns true when the row was in one of the expected statuses and was
    /// updated; false when another actor moved it first. The guard and the
    /// write are atomic.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn transition_task(
        &self,
        task_id: &TaskId,
        expected: &[TaskStatus],
        transition: &TaskTransition,
    ) -> Result<bool, StoreError>;

    /// Sets the generation-created latch on a task.
    ///
    /// Returns true when the latch was newly set; false when it was already
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn mark_generation_created(&self, task_id: &TaskId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Media Store
// ============================================================================

/// Persistence surface for generations, shots, and shot-links.
///
/// Every link mutation rebuilds the affected generations' `shot_data` index
/// within the same transaction; readers never observe a torn state.
pub trait MediaStore {
    /// Inserts a generation row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails or the project is absent.
    fn insert_generation(&self, generation: &Generation) -> Result<(), StoreError>;

    /// Loads a generation by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_generation(&self, generation_id: &GenerationId)
    -> Result<Option<Generation>, StoreError>;

    /// Lists a project's generations ordered by creation time then
    /// identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_generations(&self, project_id: &ProjectId) -> Result<Vec<Generation>, StoreError>;

    /// Inserts a shot row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails or the project is absent.
    fn insert_shot(&self, shot: &Shot) -> Result<(), StoreError>;

    /// Loads a shot by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn load_shot(&self, shot_id: &ShotId) -> Result<Option<Shot>, StoreError>;

    /// Inserts a shot-link and rebuilds the generation's `shot_data` in the
    /// same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the frame collides with an
    /// existing non-null frame in the shot, and [`StoreError`] for other
    /// failures.
    fn insert_shot_link(&self, link: &ShotLink) -> Result<(), StoreError>;

    /// Lists a shot's links ordered by `(timeline_frame NULLS LAST,
    /// created_at ASC, generation_id ASC)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn links_for_shot(&self, shot_id: &ShotId) -> Result<Vec<ShotLink>, StoreError>;

    /// Applies staged timeline-frame writes inside one transaction, stage by
    /// stage, then rebuilds `shot_data` for every affected generation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when a write targets a link outside
    /// the shot, [`StoreError::Conflict`] when a stage violates the partial
    /// `(shot, timeline_frame)` uniqueness, and [`StoreError`] for other
    /// failures. On error no stage remains applied.
    fn apply_frame_stages(
        &self,
        shot_id: &ShotId,
        stages: &[Vec<FrameWrite>],
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Combined Store
// ============================================================================

/// Full datastore contract consumed by the admission surface.
pub trait SchedulerStore: AccountStore + TaskStore + MediaStore + Send + Sync {}

impl<S> SchedulerStore for S where S: AccountStore + TaskStore + MediaStore + Send + Sync {}
