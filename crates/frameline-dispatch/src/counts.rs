// crates/frameline-dispatch/src/counts.rs
// ============================================================================
// Module: Count and Analysis Engine
// Description: Capacity-bounded dry-run counts and rejection-reason analysis.
// Purpose: Feed external schedulers signals that respect the per-user cap.
// Dependencies: frameline-core, crate::{config, error, view}
// ============================================================================

//! ## Overview
//! Count surfaces never report raw eligibility. For each eligible user the
//! contribution is `max(0, min(cap - I, Q))` without active tasks, or
//! `min(cap, I + Q)` with them, where `Q` counts dependency-ready queued
//! tasks and `I` counts non-orchestrator In-Progress tasks. In service mode
//! with active tasks included, only cloud-claimed (worker-bound) tasks count
//! toward `I`, so local claims never inflate cloud-scaler signals.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use frameline_core::ClaimMode;
use frameline_core::Clock;
use frameline_core::RunType;
use frameline_core::SchedulerStore;
use frameline_core::TaskWithOwner;
use frameline_core::User;
use frameline_core::UserCapacitySnapshot;
use frameline_core::UserId;
use frameline_core::runtime::eligibility::RejectionReason;
use frameline_core::runtime::eligibility::task_rejection;
use frameline_core::runtime::eligibility::user_rejection;
use frameline_core::runtime::selection::active_capacity;
use frameline_core::runtime::selection::immediate_capacity;
use serde::Deserialize;
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::AdmissionError;
use crate::view::TypeCache;
use crate::view::dependency_ready;
use crate::view::parse_run_type_filter;
use crate::view::user_snapshot;

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Partition of queued tasks by the reason they are not claimable.
///
/// # Invariants
/// - Bucket precedence is credits (excluded entirely), then the cloud flag,
///   then dependencies, then capacity, then claimable.
/// - `total` equals the sum of the four buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueBreakdown {
    /// Queued tasks considered (credit-less users excluded entirely).
    pub total: usize,
    /// Tasks a serial claim sequence could extract right now.
    pub claimable_now: usize,
    /// Dependency-ready tasks beyond the user's remaining capacity.
    pub blocked_by_capacity: usize,
    /// Tasks whose dependency set is not satisfied.
    pub blocked_by_deps: usize,
    /// Tasks of users who disabled cloud execution.
    pub blocked_by_settings: usize,
}

/// Per-rejection-reason counts reported by the analysis surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// Tasks rejected because the owner has no credits.
    pub no_credits: usize,
    /// Tasks rejected because the owner disabled cloud execution.
    pub cloud_disabled: usize,
    /// Tasks rejected because the owner is at the concurrency cap.
    pub concurrency_limit: usize,
    /// Tasks rejected because dependencies are unsatisfied.
    pub dependency_blocked: usize,
    /// Tasks rejected by the run-type filter.
    pub wrong_run_type: usize,
}

impl RejectionCounts {
    /// Records one rejection.
    fn record(&mut self, reason: RejectionReason) {
        match reason {
            RejectionReason::NoCredits => self.no_credits += 1,
            RejectionReason::CloudDisabled | RejectionReason::LocalDisabled => {
                self.cloud_disabled += 1;
            }
            RejectionReason::ConcurrencyLimit => self.concurrency_limit += 1,
            RejectionReason::DependencyBlocked => self.dependency_blocked += 1,
            RejectionReason::WrongRunType => self.wrong_run_type += 1,
        }
    }
}

/// Per-user statistics reported by the analysis surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQueueStats {
    /// User identifier.
    pub user_id: UserId,
    /// Credit balance.
    pub credits: i64,
    /// Queued task count.
    pub queued: usize,
    /// Non-orchestrator In-Progress count.
    pub in_progress: usize,
    /// Cloud capability flag.
    pub allows_cloud: bool,
    /// True when the user is at the concurrency cap.
    pub at_limit: bool,
}

/// Structured queue analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAnalysis {
    /// Total queued tasks observed.
    pub total_queued: usize,
    /// Queued tasks passing every gate.
    pub eligible: usize,
    /// Per-rejection-reason counts.
    pub rejections: RejectionCounts,
    /// In-Progress tasks older than the stuck threshold (reporting only).
    pub stuck_in_progress: usize,
    /// Per-user statistics, ordered by user identifier.
    pub users: Vec<UserQueueStats>,
}

// ============================================================================
// SECTION: Count Engine
// ============================================================================

/// Engine producing capacity-bounded counts and queue analysis.
pub struct CountEngine<S> {
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
    /// Scheduler tunables.
    config: SchedulerConfig,
}

impl<S: SchedulerStore> CountEngine<S> {
    /// Creates a count engine over the provided store and clock.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Capacity-bounded count of claimable work across all eligible users.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on datastore faults.
    pub fn count_eligible_service(
        &self,
        include_active: bool,
        run_type: Option<&str>,
    ) -> Result<usize, AdmissionError> {
        let run_filter = parse_run_type_filter(run_type);
        let mut total = 0;
        let mut types = TypeCache::new();
        for user in self.store.list_users()? {
            let snapshot = user_snapshot(self.store.as_ref(), &user)?;
            if snapshot.credits <= 0 || !snapshot.allows_cloud {
                continue;
            }
            let ready = self.ready_queued(&user, run_filter, &mut types)?;
            total += if include_active {
                active_capacity(snapshot.cloud_in_progress, ready, self.config.per_user_cap)
            } else {
                immediate_capacity(snapshot.in_progress, ready, self.config.per_user_cap)
            };
        }
        Ok(total)
    }

    /// Capacity-bounded count of claimable work for one user.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the user is absent, and
    /// [`AdmissionError`] on datastore faults.
    pub fn count_eligible_user(
        &self,
        user_id: &UserId,
        include_active: bool,
        run_type: Option<&str>,
    ) -> Result<usize, AdmissionError> {
        let run_filter = parse_run_type_filter(run_type);
        let Some(user) = self.store.load_user(user_id)? else {
            return Err(AdmissionError::NotFound(format!("user {user_id}")));
        };
        let snapshot = user_snapshot(self.store.as_ref(), &user)?;
        if snapshot.credits <= 0 || !snapshot.allows_local {
            return Ok(0);
        }
        let mut types = TypeCache::new();
        let ready = self.ready_queued(&user, run_filter, &mut types)?;
        let count = if include_active {
            active_capacity(snapshot.in_progress, ready, self.config.per_user_cap)
        } else {
            immediate_capacity(snapshot.in_progress, ready, self.config.per_user_cap)
        };
        Ok(count)
    }

    /// Partitions queued tasks into claimability buckets.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on datastore faults.
    pub fn count_breakdown_service(
        &self,
        run_type: Option<&str>,
    ) -> Result<QueueBreakdown, AdmissionError> {
        let run_filter = parse_run_type_filter(run_type);
        let mut breakdown = QueueBreakdown::default();
        let mut types = TypeCache::new();
        for user in self.store.list_users()? {
            let snapshot = user_snapshot(self.store.as_ref(), &user)?;
            if snapshot.credits <= 0 {
                continue;
            }
            let queued = self.filtered_queued(&user, run_filter, &mut types)?;
            breakdown.total += queued.len();
            if !snapshot.allows_cloud {
                breakdown.blocked_by_settings += queued.len();
                continue;
            }
            let headroom = self.config.per_user_cap.saturating_sub(snapshot.in_progress);
            let mut claimable = 0;
            for owned in &queued {
                if !dependency_ready(self.store.as_ref(), &owned.task)? {
                    breakdown.blocked_by_deps += 1;
                } else if claimable < headroom {
                    breakdown.claimable_now += 1;
                    claimable += 1;
                } else {
                    breakdown.blocked_by_capacity += 1;
                }
            }
        }
        Ok(breakdown)
    }

    /// Produces the structured queue analysis.
    ///
    /// With `include_active`, the per-user In-Progress statistic counts only
    /// cloud-claimed tasks; gating always uses the full non-orchestrator
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on datastore faults.
    pub fn analyze_service(
        &self,
        include_active: bool,
        run_type: Option<&str>,
    ) -> Result<QueueAnalysis, AdmissionError> {
        let run_filter = parse_run_type_filter(run_type);
        let now = self.clock.now();
        let cutoff = now.saturating_sub_millis(self.config.stuck_after_ms);
        let mut analysis = QueueAnalysis {
            total_queued: 0,
            eligible: 0,
            rejections: RejectionCounts::default(),
            stuck_in_progress: self.store.in_progress_started_before(cutoff)?,
            users: Vec::new(),
        };
        let mut types = TypeCache::new();
        for user in self.store.list_users()? {
            let snapshot = user_snapshot(self.store.as_ref(), &user)?;
            let queued = self.store.queued_tasks(Some(&user.id))?;
            analysis.total_queued += queued.len();
            analysis.users.push(UserQueueStats {
                user_id: user.id.clone(),
                credits: snapshot.credits,
                queued: queued.len(),
                in_progress: if include_active {
                    snapshot.cloud_in_progress
                } else {
                    snapshot.in_progress
                },
                allows_cloud: snapshot.allows_cloud,
                at_limit: snapshot.in_progress >= self.config.per_user_cap,
            });
            for owned in &queued {
                match self.task_reason(&snapshot, owned, run_filter, &mut types)? {
                    Some(reason) => analysis.rejections.record(reason),
                    None => analysis.eligible += 1,
                }
            }
        }
        Ok(analysis)
    }

    /// Counts a user's dependency-ready queued tasks under the run filter.
    fn ready_queued(
        &self,
        user: &User,
        run_filter: Option<RunType>,
        types: &mut TypeCache,
    ) -> Result<usize, AdmissionError> {
        let mut ready = 0;
        for owned in self.filtered_queued(user, run_filter, types)? {
            if dependency_ready(self.store.as_ref(), &owned.task)? {
                ready += 1;
            }
        }
        Ok(ready)
    }

    /// Lists a user's queued tasks passing the type and run-type filters.
    fn filtered_queued(
        &self,
        user: &User,
        run_filter: Option<RunType>,
        types: &mut TypeCache,
    ) -> Result<Vec<TaskWithOwner>, AdmissionError> {
        let mut filtered = Vec::new();
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
            filtered.push(owned);
        }
        Ok(filtered)
    }

    /// Resolves the single rejection reason for one queued task.
    fn task_reason(
        &self,
        snapshot: &UserCapacitySnapshot,
        owned: &TaskWithOwner,
        run_filter: Option<RunType>,
        types: &mut TypeCache,
    ) -> Result<Option<RejectionReason>, AdmissionError> {
        if let Some(reason) =
            user_rejection(snapshot, ClaimMode::Service, self.config.per_user_cap)
        {
            return Ok(Some(reason));
        }
        let Some(spec) = types.spec(self.store.as_ref(), &owned.task.task_type)? else {
            return Ok(Some(RejectionReason::WrongRunType));
        };
        let spec_run_type = spec.run_type;
        let active = spec.is_active;
        if !active {
            return Ok(Some(RejectionReason::WrongRunType));
        }
        let deps_ok = dependency_ready(self.store.as_ref(), &owned.task)?;
        Ok(task_rejection(deps_ok, spec_run_type, run_filter))
    }
}
