// crates/frameline-dispatch/src/surface.rs
// ============================================================================
// Module: Admission Surface
// Description: Procedural surface exposed to workers and control-plane callers.
// Purpose: Wire the claim, count, completion, and timeline engines behind one
//          facade with shared store, clock, and config.
// Dependencies: frameline-core, crate::{claim, completion, config, counts,
//               error, timeline}
// ============================================================================

//! ## Overview
//! The admission surface is the boundary of the scheduling subsystem: claim,
//! count, analyze, complete, fail, update-status, link, and reorder. Each
//! operation is one short interaction with the datastore; the surface itself
//! is non-blocking and holds no queue state. The completion observer runs on
//! the `mark_complete` path (and on admin transitions into `Complete`) as an
//! explicit post-transition hook, never as ambient reactive state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use frameline_core::Clock;
use frameline_core::GenerationId;
use frameline_core::SchedulerStore;
use frameline_core::ShotId;
use frameline_core::ShotLink;
use frameline_core::SystemClock;
use frameline_core::TaskId;
use frameline_core::TaskStatus;
use frameline_core::TaskTransition;
use frameline_core::UserId;

use crate::claim::ClaimEngine;
use crate::claim::ClaimedTask;
use crate::claim::ServiceClaimRequest;
use crate::claim::UserClaimRequest;
use crate::completion::CompletionEngine;
use crate::completion::IdentityNormalizer;
use crate::completion::MediaPathNormalizer;
use crate::config::SchedulerConfig;
use crate::counts::CountEngine;
use crate::counts::QueueAnalysis;
use crate::counts::QueueBreakdown;
use crate::error::AdmissionError;
use crate::timeline::ShotLocks;
use crate::timeline::TimelineEngine;
use crate::timeline::TimelineFrameChange;
use crate::timeline::TimelinePosition;

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for the admission surface.
///
/// # Invariants
/// - The clock defaults to [`SystemClock`] and the normalizer to the
///   identity; the datastore is always host-injected.
pub struct AdmissionSurfaceBuilder<S> {
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
    /// Injected image-path normalizer.
    normalizer: Arc<dyn MediaPathNormalizer>,
    /// Scheduler tunables.
    config: SchedulerConfig,
}

impl<S: SchedulerStore> AdmissionSurfaceBuilder<S> {
    /// Creates a builder over the provided datastore.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            normalizer: Arc::new(IdentityNormalizer),
            config: SchedulerConfig::default(),
        }
    }

    /// Overrides the clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the image-path normalizer.
    #[must_use]
    pub fn normalizer(mut self, normalizer: Arc<dyn MediaPathNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Overrides the scheduler tunables.
    #[must_use]
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the admission surface.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidInput`] when the configuration is
    /// out of range.
    pub fn build(self) -> Result<AdmissionSurface<S>, AdmissionError> {
        self.config.validate()?;
        let locks = Arc::new(ShotLocks::new());
        let timeline = TimelineEngine::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            locks,
            self.config,
        );
        let completion = CompletionEngine::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.normalizer,
            timeline.clone(),
        );
        Ok(AdmissionSurface {
            claim: ClaimEngine::new(Arc::clone(&self.store), Arc::clone(&self.clock), self.config),
            counts: CountEngine::new(Arc::clone(&self.store), Arc::clone(&self.clock), self.config),
            completion,
            timeline,
            store: self.store,
            clock: self.clock,
        })
    }
}

// ============================================================================
// SECTION: Admission Surface
// ============================================================================

/// Facade wiring every admission operation over one datastore.
pub struct AdmissionSurface<S> {
    /// Claim engine.
    claim: ClaimEngine<S>,
    /// Count and analysis engine.
    counts: CountEngine<S>,
    /// Completion (materialization) engine.
    completion: CompletionEngine<S>,
    /// Shot-link and timeline engine.
    timeline: TimelineEngine<S>,
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
}

impl<S: SchedulerStore> AdmissionSurface<S> {
    /// Returns a builder over the provided datastore.
    #[must_use]
    pub fn builder(store: Arc<S>) -> AdmissionSurfaceBuilder<S> {
        AdmissionSurfaceBuilder::new(store)
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    /// Claims the next eligible task for a cloud worker.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input or datastore faults;
    /// contention yields an empty result instead.
    pub fn claim_service(
        &self,
        request: &ServiceClaimRequest,
    ) -> Result<Option<ClaimedTask>, AdmissionError> {
        self.claim.claim_service(request)
    }

    /// Claims the next eligible task for one user's local execution.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, an absent user, or
    /// datastore faults; contention yields an empty result instead.
    pub fn claim_user(
        &self,
        request: &UserClaimRequest,
    ) -> Result<Option<ClaimedTask>, AdmissionError> {
        self.claim.claim_user(request)
    }

    // ------------------------------------------------------------------
    // Counts and analysis
    // ------------------------------------------------------------------

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
        self.counts.count_eligible_service(include_active, run_type)
    }

    /// Capacity-bounded count of claimable work for one user.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on an absent user or datastore faults.
    pub fn count_eligible_user(
        &self,
        user_id: &UserId,
        include_active: bool,
        run_type: Option<&str>,
    ) -> Result<usize, AdmissionError> {
        self.counts.count_eligible_user(user_id, include_active, run_type)
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
        self.counts.count_breakdown_service(run_type)
    }

    /// Produces the structured queue analysis.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on datastore faults.
    pub fn analyze_service(
        &self,
        include_active: bool,
        run_type: Option<&str>,
    ) -> Result<QueueAnalysis, AdmissionError> {
        self.counts.analyze_service(include_active, run_type)
    }

    // ------------------------------------------------------------------
    // Completion and failure
    // ------------------------------------------------------------------

    /// Transitions an In-Progress task to `Complete`, stores the output
    /// location, and runs the completion observer.
    ///
    /// Returns false without side effects when the task is not In-Progress.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, observer faults, or
    /// datastore faults. Shot-link sync faults inside the observer are
    /// logged and swallowed.
    pub fn mark_complete(
        &self,
        task_id: &TaskId,
        output_location: &str,
    ) -> Result<bool, AdmissionError> {
        validate_task_id(task_id)?;
        if output_location.is_empty() {
            return Err(AdmissionError::InvalidInput(
                "output location must not be empty".to_string(),
            ));
        }
        let now = self.clock.now();
        let transition = TaskTransition::complete(output_location.to_string(), now);
        let updated =
            self.store.transition_task(task_id, &[TaskStatus::InProgress], &transition)?;
        if updated {
            self.completion.observe_complete(task_id)?;
        }
        Ok(updated)
    }

    /// Transitions an In-Progress task to `Failed` and stores the error
    /// message.
    ///
    /// Returns false without side effects when the task is not In-Progress.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input or datastore faults.
    pub fn mark_failed(&self, task_id: &TaskId, error: &str) -> Result<bool, AdmissionError> {
        validate_task_id(task_id)?;
        let now = self.clock.now();
        let transition = TaskTransition::fail(error.to_string(), now);
        let updated =
            self.store.transition_task(task_id, &[TaskStatus::InProgress], &transition)?;
        Ok(updated)
    }

    /// General-purpose transition helper for admin flows.
    ///
    /// Rejects transitions the lifecycle forbids; returns false when the row
    /// was not in a legal predecessor state. The legal predecessors are
    /// derived from [`TaskStatus::can_transition`], so the lifecycle rule
    /// lives in one place. A transition into `Complete` runs the completion
    /// observer.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidInput`] for a target the lifecycle
    /// never permits, and [`AdmissionError`] on datastore faults.
    pub fn update_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
        output_location: Option<&str>,
    ) -> Result<bool, AdmissionError> {
        validate_task_id(task_id)?;
        let expected: Vec<TaskStatus> = TaskStatus::ALL
            .into_iter()
            .filter(|prior| prior.can_transition(status))
            .collect();
        if expected.is_empty() {
            return Err(AdmissionError::InvalidInput(format!(
                "tasks cannot transition into {}",
                status.as_str()
            )));
        }
        let now = self.clock.now();
        let transition = match status {
            TaskStatus::Queued => {
                return Err(AdmissionError::InvalidInput(
                    "tasks cannot transition back into queued".to_string(),
                ));
            }
            TaskStatus::InProgress => TaskTransition::claim(None, now),
            TaskStatus::Complete => TaskTransition {
                to: TaskStatus::Complete,
                worker_id: None,
                output_location: output_location.map(str::to_string),
                error_message: None,
                generation_started_at: None,
                generation_processed_at: Some(now),
                updated_at: now,
            },
            TaskStatus::Failed => TaskTransition {
                to: TaskStatus::Failed,
                worker_id: None,
                output_location: None,
                error_message: None,
                generation_started_at: None,
                generation_processed_at: Some(now),
                updated_at: now,
            },
            TaskStatus::Cancelled => TaskTransition::cancel(now),
        };
        let updated = self.store.transition_task(task_id, &expected, &transition)?;
        if updated && status == TaskStatus::Complete {
            self.completion.observe_complete(task_id)?;
        }
        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Shot links and timelines
    // ------------------------------------------------------------------

    /// Appends a generation to a shot, always creating a new link.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, absent entities, or
    /// datastore faults.
    pub fn add_generation_to_shot(
        &self,
        shot_id: &ShotId,
        generation_id: &GenerationId,
        with_position: bool,
    ) -> Result<ShotLink, AdmissionError> {
        self.timeline.add_generation_to_shot(shot_id, generation_id, with_position)
    }

    /// Atomically applies a batch of frame assignments and returns the
    /// current ordered frame listing.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, absent entities, or
    /// datastore faults.
    pub fn apply_timeline_frames(
        &self,
        shot_id: &ShotId,
        changes: &[TimelineFrameChange],
        update_positions: bool,
    ) -> Result<Vec<TimelinePosition>, AdmissionError> {
        self.timeline.apply_timeline_frames(shot_id, changes, update_positions)
    }

    /// Swaps two links' frames within a shot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, absent entities, or
    /// datastore faults.
    pub fn exchange_timeline_frames(
        &self,
        shot_id: &ShotId,
        first: &GenerationId,
        second: &GenerationId,
    ) -> Result<(), AdmissionError> {
        self.timeline.exchange_timeline_frames(shot_id, first, second)
    }

    /// Assigns frames to unpositioned links in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, an absent shot, or
    /// datastore faults.
    pub fn initialize_timeline_frames(
        &self,
        shot_id: &ShotId,
        spacing: Option<u32>,
    ) -> Result<Vec<TimelinePosition>, AdmissionError> {
        self.timeline.initialize_timeline_frames(shot_id, spacing)
    }

    /// Promotes the unpositioned link for a generation to the next frame
    /// slot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on malformed input, absent entities, or
    /// datastore faults.
    pub fn position_existing_generation_in_shot(
        &self,
        shot_id: &ShotId,
        generation_id: &GenerationId,
    ) -> Result<TimelinePosition, AdmissionError> {
        self.timeline.position_existing_generation(shot_id, generation_id)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty task identifiers at the admission boundary.
fn validate_task_id(task_id: &TaskId) -> Result<(), AdmissionError> {
    if task_id.as_str().is_empty() {
        return Err(AdmissionError::InvalidInput("task id must not be empty".to_string()));
    }
    Ok(())
}
