// crates/frameline-dispatch/src/completion.rs
// ============================================================================
// Module: Completion Engine
// Description: Materializes generations when tasks transition to Complete.
// Purpose: Turn finished generation-category tasks into media artifacts and
//          link them into shots.
// Dependencies: frameline-core, tracing, uuid, crate::{error, timeline}
// ============================================================================

//! ## Overview
//! The completion observer runs after a task row lands in `Complete`. For
//! generation-category task types with an unset latch it normalizes the
//! params, extracts the shot linkage through the documented precedence
//! chains, inserts the generation row, optionally links it into a shot, and
//! finally sets the `generation_created` latch. The latch plus the status
//! guard make replays yield no additional generation. A shot-link sync
//! fault is logged and swallowed; the principal insert stands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use frameline_core::Clock;
use frameline_core::Generation;
use frameline_core::GenerationId;
use frameline_core::GenerationType;
use frameline_core::SchedulerStore;
use frameline_core::TaskCategory;
use frameline_core::TaskId;
use frameline_core::TaskParams;
use frameline_core::TaskStatus;
use frameline_core::core::registry::carries_full_orchestrator_payload;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AdmissionError;
use crate::timeline::TimelineEngine;

// ============================================================================
// SECTION: Path Normalizer
// ============================================================================

/// External normalizer for image paths embedded in task params.
///
/// Treated as a pure function; the default implementation is the identity.
pub trait MediaPathNormalizer: Send + Sync {
    /// Returns the params with embedded image paths normalized.
    fn normalize(&self, params: &TaskParams) -> TaskParams;
}

/// Identity normalizer used when no host normalizer is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityNormalizer;

impl MediaPathNormalizer for IdentityNormalizer {
    fn normalize(&self, params: &TaskParams) -> TaskParams {
        params.clone()
    }
}

// ============================================================================
// SECTION: Completion Engine
// ============================================================================

/// Engine materializing generations from completed tasks.
pub struct CompletionEngine<S> {
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
    /// Injected image-path normalizer.
    normalizer: Arc<dyn MediaPathNormalizer>,
    /// Shot-link engine used for completion-time linking.
    timeline: TimelineEngine<S>,
}

impl<S: SchedulerStore> CompletionEngine<S> {
    /// Creates a completion engine over the provided collaborators.
    #[must_use]
    pub(crate) fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        normalizer: Arc<dyn MediaPathNormalizer>,
        timeline: TimelineEngine<S>,
    ) -> Self {
        Self {
            store,
            clock,
            normalizer,
            timeline,
        }
    }

    /// Observes a task that has transitioned into `Complete` and
    /// materializes its generation.
    ///
    /// Returns the new generation identifier, or `None` when the observer
    /// does not apply (task not `Complete`, latch already set, or the task
    /// type is not generation-category). The latch is set only after the
    /// generation row is inserted; an abort before that leaves the latch
    /// unset so a repaired replay can materialize.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the task is absent,
    /// [`AdmissionError::InvalidInput`] for an unknown task type or a
    /// missing output location, and [`AdmissionError`] on datastore faults.
    /// Shot-link sync faults are logged and swallowed.
    pub fn observe_complete(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<GenerationId>, AdmissionError> {
        let Some(task) = self.store.load_task(task_id)? else {
            return Err(AdmissionError::NotFound(format!("task {task_id}")));
        };
        if task.status != TaskStatus::Complete || task.generation_created {
            return Ok(None);
        }
        let Some(spec) = self.store.load_task_type(&task.task_type)? else {
            return Err(AdmissionError::InvalidInput(format!(
                "unknown task type: {}",
                task.task_type
            )));
        };
        if spec.category != TaskCategory::Generation {
            return Ok(None);
        }
        let output_location = task
            .output_location
            .as_deref()
            .filter(|location| !location.is_empty())
            .ok_or_else(|| {
                AdmissionError::InvalidInput(format!(
                    "task {task_id} completed without an output location"
                ))
            })?
            .to_string();
        if task.project_id.as_str().is_empty() {
            return Err(AdmissionError::InvalidInput(format!(
                "task {task_id} has no project binding"
            )));
        }
        let consult_deep = carries_full_orchestrator_payload(&spec.tool_type);
        let generation_type = GenerationType::for_tool_type(&spec.tool_type);
        let normalized = self.normalizer.normalize(&task.params);
        let shot_id = normalized.shot_id(consult_deep);
        let add_in_position = normalized.add_in_position(consult_deep);
        let thumbnail_url = normalized.thumbnail_url(consult_deep);
        let mut params = normalized;
        params.insert("tool_type", Value::String(spec.tool_type.clone()));
        params.insert("projectId", Value::String(task.project_id.as_str().to_string()));
        params.insert("outputLocation", Value::String(output_location.clone()));
        if let Some(shot_id) = &shot_id {
            params.insert("shotId", Value::String(shot_id.as_str().to_string()));
        }
        if let Some(thumbnail_url) = &thumbnail_url {
            params.insert("thumbnailUrl", Value::String(thumbnail_url.clone()));
        }
        let generation = Generation {
            id: GenerationId::new(Uuid::new_v4().to_string()),
            project_id: task.project_id.clone(),
            generation_type,
            location: output_location,
            thumbnail_url,
            params,
            tasks: vec![task.id.clone()],
            shot_data: None,
            primary_variant: None,
            created_at: self.clock.now(),
        };
        self.store.insert_generation(&generation)?;
        if let Some(shot_id) = &shot_id
            && let Err(error) =
                self.timeline.add_generation_to_shot(shot_id, &generation.id, add_in_position)
        {
            tracing::warn!(
                shot = %shot_id,
                generation = %generation.id,
                %error,
                "shot link sync failed after materialization; generation stands"
            );
        }
        self.store.mark_generation_created(&task.id)?;
        Ok(Some(generation.id))
    }
}
