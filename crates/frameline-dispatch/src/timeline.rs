// crates/frameline-dispatch/src/timeline.rs
// ============================================================================
// Module: Shot Link and Timeline Engine
// Description: Shot appends, atomic frame batches, swaps, and initialization.
// Purpose: Maintain ordered timelines under the partial-unique frame rule.
// Dependencies: frameline-core, uuid, crate::{config, error}
// ============================================================================

//! ## Overview
//! All frame mutations for one shot are serialized by a per-shot mutex map.
//! Batch assignments use a two-stage write (null out every affected link,
//! then write the new values) so no transient state ever collides with the
//! partial-unique `(shot, timeline_frame)` rule; swaps use a three-step park.
//! The store executes each staged plan inside a single transaction and
//! rebuilds the affected generations' `shot_data` before commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use frameline_core::Clock;
use frameline_core::FrameWrite;
use frameline_core::GenerationId;
use frameline_core::LinkMetadata;
use frameline_core::SchedulerStore;
use frameline_core::ShotId;
use frameline_core::ShotLink;
use frameline_core::ShotLinkId;
use frameline_core::StoreError;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::AdmissionError;

// ============================================================================
// SECTION: Shot Locks
// ============================================================================

/// Per-shot mutex map serializing timeline mutations.
///
/// # Invariants
/// - One mutex per shot identifier; no ordering is imposed across shots.
pub(crate) struct ShotLocks {
    /// Lazily created shot mutexes keyed by raw shot identifier.
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ShotLocks {
    /// Creates an empty lock map.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the mutex serializing mutations for the shot.
    fn for_shot(&self, shot_id: &ShotId) -> Result<Arc<Mutex<()>>, AdmissionError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock map poisoned".to_string())))?;
        Ok(Arc::clone(
            map.entry(shot_id.as_str().to_string()).or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }
}

// ============================================================================
// SECTION: Requests and Results
// ============================================================================

/// One frame assignment within a batch.
///
/// # Invariants
/// - `frame` is validated non-negative before any write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineFrameChange {
    /// Target generation identifier.
    pub generation_id: GenerationId,
    /// New frame value; negative values are rejected.
    pub frame: i64,
}

/// Current placement of one link within a shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePosition {
    /// Shot-link identifier.
    pub link_id: ShotLinkId,
    /// Linked generation identifier.
    pub generation_id: GenerationId,
    /// Current frame; `None` for unpositioned links.
    pub timeline_frame: Option<u32>,
}

// ============================================================================
// SECTION: Timeline Engine
// ============================================================================

/// Engine maintaining shot timelines and the shot-link denormalization
/// contract.
pub struct TimelineEngine<S> {
    /// Injected datastore.
    store: Arc<S>,
    /// Injected clock.
    clock: Arc<dyn Clock>,
    /// Per-shot mutation locks.
    locks: Arc<ShotLocks>,
    /// Scheduler tunables.
    config: SchedulerConfig,
}

impl<S> Clone for TimelineEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            locks: Arc::clone(&self.locks),
            config: self.config,
        }
    }
}

impl<S: SchedulerStore> TimelineEngine<S> {
    /// Creates a timeline engine over the provided store and clock.
    #[must_use]
    pub(crate) fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        locks: Arc<ShotLocks>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            locks,
            config,
        }
    }

    /// Appends a generation to a shot, always creating a new link.
    ///
    /// Duplicates are permitted and meaningful. With `with_position` the new
    /// link receives the next frame slot (`max + spacing`, starting at 0);
    /// otherwise it is left unpositioned with empty metadata.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the shot or generation is
    /// absent, and [`AdmissionError`] on malformed input or datastore
    /// faults.
    pub fn add_generation_to_shot(
        &self,
        shot_id: &ShotId,
        generation_id: &GenerationId,
        with_position: bool,
    ) -> Result<ShotLink, AdmissionError> {
        validate_id(shot_id.as_str(), "shot id")?;
        validate_id(generation_id.as_str(), "generation id")?;
        let lock = self.locks.for_shot(shot_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock poisoned".to_string())))?;
        self.require_shot(shot_id)?;
        if self.store.load_generation(generation_id)?.is_none() {
            return Err(AdmissionError::NotFound(format!("generation {generation_id}")));
        }
        let (timeline_frame, metadata) = if with_position {
            let links = self.store.links_for_shot(shot_id)?;
            (Some(next_frame(&links, self.config.frame_spacing)), LinkMetadata::auto_positioned())
        } else {
            (None, LinkMetadata::default())
        };
        let link = ShotLink {
            id: ShotLinkId::new(Uuid::new_v4().to_string()),
            shot_id: shot_id.clone(),
            generation_id: generation_id.clone(),
            timeline_frame,
            metadata,
            created_at: self.clock.now(),
        };
        self.store.insert_shot_link(&link)?;
        Ok(link)
    }

    /// Atomically applies a batch of frame assignments.
    ///
    /// Validates that every targeted generation is linked to the shot and
    /// that frames are non-negative and pairwise distinct, then performs the
    /// two-stage write. With `update_positions` false the batch is validated
    /// only (dry run). Returns the full current frame listing in ascending
    /// frame order for client reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidInput`] for negative or duplicate
    /// frames and unlinked generations, [`AdmissionError::NotFound`] when
    /// the shot is absent, and [`AdmissionError`] on datastore faults.
    pub fn apply_timeline_frames(
        &self,
        shot_id: &ShotId,
        changes: &[TimelineFrameChange],
        update_positions: bool,
    ) -> Result<Vec<TimelinePosition>, AdmissionError> {
        validate_id(shot_id.as_str(), "shot id")?;
        let lock = self.locks.for_shot(shot_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock poisoned".to_string())))?;
        self.require_shot(shot_id)?;
        let mut frames: BTreeSet<u32> = BTreeSet::new();
        let mut targets: Vec<(ShotLinkId, u32)> = Vec::with_capacity(changes.len());
        let links = self.store.links_for_shot(shot_id)?;
        let mut used: BTreeSet<ShotLinkId> = BTreeSet::new();
        for change in changes {
            let frame = u32::try_from(change.frame).map_err(|_| {
                AdmissionError::InvalidInput(format!(
                    "timeline frame must be non-negative, got {}",
                    change.frame
                ))
            })?;
            if !frames.insert(frame) {
                return Err(AdmissionError::InvalidInput(format!(
                    "duplicate timeline frame in batch: {frame}"
                )));
            }
            let link = links
                .iter()
                .find(|link| {
                    link.generation_id == change.generation_id && !used.contains(&link.id)
                })
                .ok_or_else(|| {
                    AdmissionError::InvalidInput(format!(
                        "generation {} is not linked to shot {shot_id}",
                        change.generation_id
                    ))
                })?;
            used.insert(link.id.clone());
            targets.push((link.id.clone(), frame));
        }
        if update_positions && !targets.is_empty() {
            let park: Vec<FrameWrite> = targets
                .iter()
                .map(|(link_id, _)| FrameWrite {
                    link_id: link_id.clone(),
                    timeline_frame: None,
                })
                .collect();
            let place: Vec<FrameWrite> = targets
                .iter()
                .map(|(link_id, frame)| FrameWrite {
                    link_id: link_id.clone(),
                    timeline_frame: Some(*frame),
                })
                .collect();
            self.store.apply_frame_stages(shot_id, &[park, place])?;
        }
        self.listing(shot_id)
    }

    /// Swaps two links' frames under the shot lock.
    ///
    /// Uses a three-step plan honoring the partial-unique rule: park the
    /// first link unpositioned, move the second onto the first's frame, then
    /// place the first on the second's original frame.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the shot is absent or a
    /// generation has no link in it, [`AdmissionError::InvalidInput`] when
    /// the swap cannot name two distinct links, and [`AdmissionError`] on
    /// datastore faults.
    pub fn exchange_timeline_frames(
        &self,
        shot_id: &ShotId,
        first: &GenerationId,
        second: &GenerationId,
    ) -> Result<(), AdmissionError> {
        validate_id(shot_id.as_str(), "shot id")?;
        let lock = self.locks.for_shot(shot_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock poisoned".to_string())))?;
        self.require_shot(shot_id)?;
        let links = self.store.links_for_shot(shot_id)?;
        let link_a = links
            .iter()
            .find(|link| link.generation_id == *first)
            .ok_or_else(|| {
                AdmissionError::NotFound(format!("generation {first} has no link in shot {shot_id}"))
            })?;
        let link_b = links
            .iter()
            .find(|link| link.generation_id == *second && link.id != link_a.id)
            .ok_or_else(|| {
                AdmissionError::NotFound(format!(
                    "generation {second} has no link in shot {shot_id} distinct from {first}"
                ))
            })?;
        let stages = vec![
            vec![FrameWrite {
                link_id: link_a.id.clone(),
                timeline_frame: None,
            }],
            vec![FrameWrite {
                link_id: link_b.id.clone(),
                timeline_frame: link_a.timeline_frame,
            }],
            vec![FrameWrite {
                link_id: link_a.id.clone(),
                timeline_frame: link_b.timeline_frame,
            }],
        ];
        self.store.apply_frame_stages(shot_id, &stages)?;
        Ok(())
    }

    /// Assigns frames to every unpositioned link in creation order.
    ///
    /// Continues after the highest existing frame (or starts at 0), stepping
    /// by `spacing` (defaulting to the configured spacing).
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidInput`] for a zero spacing,
    /// [`AdmissionError::NotFound`] when the shot is absent, and
    /// [`AdmissionError`] on datastore faults.
    pub fn initialize_timeline_frames(
        &self,
        shot_id: &ShotId,
        spacing: Option<u32>,
    ) -> Result<Vec<TimelinePosition>, AdmissionError> {
        validate_id(shot_id.as_str(), "shot id")?;
        let spacing = spacing.unwrap_or(self.config.frame_spacing);
        if spacing == 0 {
            return Err(AdmissionError::InvalidInput(
                "frame spacing must be greater than zero".to_string(),
            ));
        }
        let lock = self.locks.for_shot(shot_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock poisoned".to_string())))?;
        self.require_shot(shot_id)?;
        let links = self.store.links_for_shot(shot_id)?;
        let mut next = next_frame(&links, spacing);
        let mut stage: Vec<FrameWrite> = Vec::new();
        for link in links.iter().filter(|link| link.timeline_frame.is_none()) {
            stage.push(FrameWrite {
                link_id: link.id.clone(),
                timeline_frame: Some(next),
            });
            next = next.saturating_add(spacing);
        }
        if !stage.is_empty() {
            self.store.apply_frame_stages(shot_id, &[stage])?;
        }
        self.listing(shot_id)
    }

    /// Promotes the unpositioned link for a generation to the next frame
    /// slot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::NotFound`] when the shot is absent or no
    /// unpositioned link exists for the pair, and [`AdmissionError`] on
    /// datastore faults.
    pub fn position_existing_generation(
        &self,
        shot_id: &ShotId,
        generation_id: &GenerationId,
    ) -> Result<TimelinePosition, AdmissionError> {
        validate_id(shot_id.as_str(), "shot id")?;
        validate_id(generation_id.as_str(), "generation id")?;
        let lock = self.locks.for_shot(shot_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| AdmissionError::Store(StoreError::Db("shot lock poisoned".to_string())))?;
        self.require_shot(shot_id)?;
        let links = self.store.links_for_shot(shot_id)?;
        let link = links
            .iter()
            .find(|link| link.generation_id == *generation_id && link.timeline_frame.is_none())
            .ok_or_else(|| {
                AdmissionError::NotFound(format!(
                    "generation {generation_id} has no unpositioned link in shot {shot_id}"
                ))
            })?;
        let frame = next_frame(&links, self.config.frame_spacing);
        self.store.apply_frame_stages(
            shot_id,
            &[vec![FrameWrite {
                link_id: link.id.clone(),
                timeline_frame: Some(frame),
            }]],
        )?;
        Ok(TimelinePosition {
            link_id: link.id.clone(),
            generation_id: link.generation_id.clone(),
            timeline_frame: Some(frame),
        })
    }

    /// Ensures the shot exists, failing closed otherwise.
    fn require_shot(&self, shot_id: &ShotId) -> Result<(), AdmissionError> {
        if self.store.load_shot(shot_id)?.is_none() {
            return Err(AdmissionError::NotFound(format!("shot {shot_id}")));
        }
        Ok(())
    }

    /// Returns the shot's current frame listing in ascending frame order
    /// (nulls last, then creation time, then generation identifier).
    fn listing(&self, shot_id: &ShotId) -> Result<Vec<TimelinePosition>, AdmissionError> {
        let links = self.store.links_for_shot(shot_id)?;
        Ok(links
            .into_iter()
            .map(|link| TimelinePosition {
                link_id: link.id,
                generation_id: link.generation_id,
                timeline_frame: link.timeline_frame,
            })
            .collect())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Computes the next append slot: highest existing frame plus spacing, or 0
/// when the shot has no positioned links.
fn next_frame(links: &[ShotLink], spacing: u32) -> u32 {
    links
        .iter()
        .filter_map(|link| link.timeline_frame)
        .max()
        .map_or(0, |highest| highest.saturating_add(spacing))
}

/// Rejects empty identifiers at the admission boundary.
fn validate_id(raw: &str, label: &str) -> Result<(), AdmissionError> {
    if raw.is_empty() {
        return Err(AdmissionError::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(())
}
