// crates/frameline-dispatch/src/claim.rs
// ============================================================================
// Module: Claim Engine
// Description: Atomic FIFO task selection with affinity-aware ordering.
// Purpose: Bind exactly one worker to exactly one queued task per claim.
// Dependencies: frameline-core, crate::{config, error, view}
// ============================================================================

//! ## Overview
//! A claim builds the eligible-user set, restricts queued tasks through the
//! dependency and run-type gates, orders candidates by affinity rank then
//! FIFO, and walks the list attempting a guarded compare-and-swap on each.
//! Contention on a candidate is not an error; the walk simply continues, and
//! an exhausted list yields an empty result. Unknown workers are
//! auto-registered as external and active before selection proceeds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use frameline_core::ClaimMode;
use frameline_core::Clock;
use frameline_core::ProjectId;
use frameline_core::SchedulerStore;
use frameline_core::TaskId;
use frameline_core::TaskParams;
use frameline_core::TaskTypeName;
use frameline_core::TaskWithOwner;
use frameline_core::Timestamp;
use frameline_core::UserId;
use frameline_core::Worker;
use frameline_core::WorkerId;
use frameline_core::runtime::eligibility::user_rejection;
use frameline_core::runtime::selection::ClaimOrderKey;
use frameline_core::runtime::selection::claim_order_key;
use serde::Deserialize;
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::AdmissionError;
use crate::view::TypeCache;
use crate::view::dependency_ready;
use crate::view::parse_run_type_filter;
use crate::view::user_snapshot;

// ============================================================================
// SECTION: Requests and Results
// ============================================================================

/// Service-mode claim request selecting across all users.
///
/// # Invariants
/// - `include_active` is a reporting convenience shared with the count
///   surface; it never causes an In-Progress task to be re-claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaimRequest {
    /// Claiming worker identifier.
    pub worker_id: WorkerId,
    /// Accepted for parity with the count surface; no effect on claims.
    #[serde(default)]
    pub include_active: bool,
    /// Optional run-type filter; unknown labels mean no filter.
    #[serde(default)]
    pub run_type: Option<String>,
    /// Restrict selection to tasks matching the worker's loaded model.
    #[serde(default)]
    pub same_model_only: bool,
}

impl ServiceClaimRequest {
    /// Creates a request with default flags for the provided worker.
    #[must_use]
    pub const fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            include_active: false,
            run_type: None,
            same_model_only: false,
        }
    }
}

/// User-mode claim request restricted to one user.
///
/// # Invariants
/// - User-mode claims bind no worker; the absent binding is what
///   distinguishes local claims in the count surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaimRequest {
    /// Target user identifier.
    pub user_id: UserId,
    /// Accepted for parity with the count surface; no effect on claims.
    #[serde(default)]
    pub include_active: bool,
    /// Optional run-type filter; unknown labels mean no filter.
    #[serde(default)]
    pub run_type: Option<String>,
    /// Personal-access-token flavor bypasses the credit gate.
    #[serde(default)]
    pub bypass_credit_gate: bool,
}

impl UserClaimRequest {
    /// Creates a request with default flags for the provided user.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            include_active: false,
            run_type: None,
            bypass_credit_gate: false,
        }
    }
}

/// Task record returned to the claiming caller.
///
/// # Invariants
/// - The underlying row has already transitioned to In-Progress when this
///   record is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedTask {
    /// Claimed task identifier.
    pub task_id: TaskId,
    /// Registry key for the task type.
    pub task_type: TaskTypeName,
    /// Opaque task payload.
    pub params: TaskParams,
    /// Owning project identifier.
    pub project_id: ProjectId,
    /// Owning user identifier.
    pub user_id: UserId,
}

// ============================================================================
// SECTION: Claim Engine
// ============================================================================

/// Engine performing atomic FIFO claims.
pub struct ClaimEngine<S> {
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
    /// Scheduler tunables.
    config: SchedulerConfig,
}

impl<S: SchedulerStore> ClaimEngine<S> {
    /// Creates a claim engine over the provided store and clock.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Claims the next eligible task for a cloud worker.
    ///
    /// Returns `None` when no candidate survives the gates or every
    /// candidate was taken by a racing claim.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input or datastore faults.
    pub fn claim_service(
        &self,
        request: &ServiceClaimRequest,
    ) -> Result<Option<ClaimedTask>, AdmissionError> {
        if request.worker_id.as_str().is_empty() {
            return Err(AdmissionError::InvalidInput("worker id must not be empty".to_string()));
        }
        let now = self.clock.now();
        let worker_model = self.resolve_worker(&request.worker_id, now)?;
        let run_filter = parse_run_type_filter(request.run_type.as_deref());
        let users = self.store.list_users()?;
        let mut candidates: Vec<(ClaimOrderKey, TaskWithOwner)> = Vec::new();
        let mut types = TypeCache::new();
        for user in &users {
            let snapshot = user_snapshot(self.store.as_ref(), user)?;
            if user_rejection(&snapshot, ClaimMode::Service, self.config.per_user_cap).is_some() {
                continue;
            }
            for owned in self.store.queued_tasks(Some(&user.id))? {
                let Some(spec) = types.spec(self.store.as_ref(), &owned.task.task_type)? else {
                    continue;
                };
                if !spec.is_active {
                    continue;
                }
                if let Some(wanted) = run_filter
                    && spec.run_type != wanted
                {
                    continue;
                }
                if !dependency_ready(self.store.as_ref(), &owned.task)? {
                    continue;
                }
                let key = claim_order_key(&owned.task, worker_model.as_deref());
                if request.same_model_only && worker_model.is_some() && key.affinity_rank != 0 {
                    continue;
                }
                candidates.push((key, owned));
            }
        }
        candidates.sort_by(|left, right| left.0.cmp(&right.0));
        self.take_first(candidates, Some(request.worker_id.clone()), now)
    }

    /// Claims the next eligible task for one user's local execution.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the user is absent, and
    /// [`AdmissionError`] on malformed input or datastore faults.
    pub fn claim_user(
        &self,
        request: &UserClaimRequest,
    ) -> Result<Option<ClaimedTask>, AdmissionError> {
        if request.user_id.as_str().is_empty() {
            return Err(AdmissionError::InvalidInput("user id must not be empty".to_string()));
        }
        let now = self.clock.now();
        let run_filter = parse_run_type_filter(request.run_type.as_deref());
        let Some(user) = self.store.load_user(&request.user_id)? else {
            return Err(AdmissionError::NotFound(format!("user {}", request.user_id)));
        };
        let snapshot = user_snapshot(self.store.as_ref(), &user)?;
        let mode = ClaimMode::User {
            bypass_credit_gate: request.bypass_credit_gate,
        };
        if user_rejection(&snapshot, mode, self.config.per_user_cap).is_some() {
            return Ok(None);
        }
        let mut candidates: Vec<(ClaimOrderKey, TaskWithOwner)> = Vec::new();
        let mut types = TypeCache::new();
        for owned in self.store.queued_tasks(Some(&user.id))? {
            let Some(spec) = types.spec(self.store.as_ref(), &owned.task.task_type)? else {
                continue;
            };
            if !spec.is_active {
                continue;
            }
            if let Some(wanted) = run_filter
                && spec.run_type != wanted
            {
                continue;
            }
            if !dependency_ready(self.store.as_ref(), &owned.task)? {
                continue;
            }
            let key = claim_order_key(&owned.task, None);
            candidates.push((key, owned));
        }
        candidates.sort_by(|left, right| left.0.cmp(&right.0));
        self.take_first(candidates, None, now)
    }

    /// Resolves the claiming worker, auto-registering unknown workers and
    /// refreshing heartbeats for known ones. Returns the worker's loaded
    /// model for affinity ranking.
    fn resolve_worker(
        &self,
        worker_id: &WorkerId,
        now: Timestamp,
    ) -> Result<Option<String>, AdmissionError> {
        match self.store.load_worker(worker_id)? {
            Some(worker) => {
                self.store.touch_worker_heartbeat(worker_id, now)?;
                Ok(worker.current_model)
            }
            None => {
                let worker = Worker::external(worker_id.clone(), now);
                self.store.upsert_worker(&worker)?;
                Ok(None)
            }
        }
    }

    /// Walks ordered candidates attempting the guarded claim transition.
    fn take_first(
        &self,
        candidates: Vec<(ClaimOrderKey, TaskWithOwner)>,
        worker_id: Option<WorkerId>,
        now: Timestamp,
    ) -> Result<Option<ClaimedTask>, AdmissionError> {
        for (_, owned) in candidates {
            let claimed = self.store.claim_task(
                &owned.task.id,
                worker_id.as_ref(),
                self.config.per_user_cap,
                now,
            )?;
            if claimed {
                return Ok(Some(ClaimedTask {
                    task_id: owned.task.id,
                    task_type: owned.task.task_type,
                    params: owned.task.params,
                    project_id: owned.task.project_id,
                    user_id: owned.user_id,
                }));
            }
        }
        Ok(None)
    }
}
