// crates/frameline-core/src/core/media.rs
// ============================================================================
// Module: Frameline Media Model
// Description: Generations, shots, shot-links, and the denormalized shot index.
// Purpose: Model materialized artifacts and their ordered timeline placement.
// Dependencies: crate::core::{identifiers, params, registry, time}, serde
// ============================================================================

//! ## Overview
//! A generation is the artifact materialized when a generation-category task
//! completes. Shots are ordered containers of generations; each placement is
//! a shot-link carrying an optional timeline frame. The `(shot, frame)` pair
//! is unique for non-null frames only. `shot_data` is a denormalized index
//! on the generation, rebuilt by the store inside every link mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::GenerationId;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::ShotId;
use crate::core::identifiers::ShotLinkId;
use crate::core::identifiers::TaskId;
use crate::core::params::TaskParams;
use crate::core::registry::is_video_tool_type;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Frame spacing convention used when appending to a shot timeline.
pub const TIMELINE_FRAME_SPACING: u32 = 50;

// ============================================================================
// SECTION: Generation Type
// ============================================================================

/// Artifact class of a materialized generation.
///
/// # Invariants
/// - Variants are stable for serialization and store persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    /// Still-image artifact.
    Image,
    /// Video artifact.
    Video,
}

impl GenerationType {
    /// Returns the stable persistence label for the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Parses a persistence label back into a type.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    /// Derives the artifact class from a registry tool type.
    #[must_use]
    pub fn for_tool_type(tool_type: &str) -> Self {
        if is_video_tool_type(tool_type) {
            Self::Video
        } else {
            Self::Image
        }
    }
}

// ============================================================================
// SECTION: Shot Data Index
// ============================================================================

/// Denormalized mapping from shot identifier to the ordered list of timeline
/// frames at which a generation appears.
///
/// # Invariants
/// - Every value is an array, never a scalar; the legacy scalar format is
///   migrated away from on write.
/// - Frames within a shot entry are sorted ascending with nulls last.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShotData(BTreeMap<String, Vec<Option<u32>>>);

impl ShotData {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns true when no shot entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the frame list recorded for a shot.
    #[must_use]
    pub fn frames(&self, shot_id: &ShotId) -> Option<&[Option<u32>]> {
        self.0.get(shot_id.as_str()).map(Vec::as_slice)
    }

    /// Replaces the frame list for a shot, restoring the sorted-nulls-last
    /// ordering invariant. An empty list removes the entry.
    pub fn set_frames(&mut self, shot_id: &ShotId, mut frames: Vec<Option<u32>>) {
        if frames.is_empty() {
            self.0.remove(shot_id.as_str());
            return;
        }
        frames.sort_by_key(|frame| (frame.is_none(), frame.unwrap_or(0)));
        self.0.insert(shot_id.as_str().to_string(), frames);
    }

    /// Iterates over shot entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Option<u32>])> {
        self.0.iter().map(|(shot, frames)| (shot.as_str(), frames.as_slice()))
    }
}

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Materialized generation artifact.
///
/// # Invariants
/// - `tasks` lists the originating task identifiers; materialization inserts
///   a single-element list.
/// - `shot_data` is authored solely by the shot-link engine's
///   denormalization contract; `None` means no links exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// Generation identifier.
    pub id: GenerationId,
    /// Owning project identifier.
    pub project_id: ProjectId,
    /// Artifact class.
    pub generation_type: GenerationType,
    /// Storage location of the artifact.
    pub location: String,
    /// Optional thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Composed generation params.
    pub params: TaskParams,
    /// Originating task identifiers.
    pub tasks: Vec<TaskId>,
    /// Denormalized shot index; `None` when the generation is unlinked.
    pub shot_data: Option<ShotData>,
    /// Optional primary-variant reference.
    pub primary_variant: Option<GenerationId>,
    /// Materialization timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Shot and Shot-Link
// ============================================================================

/// Shot row, an ordered container of generations within a project.
///
/// # Invariants
/// - Ordering of contained generations is by shot-link `timeline_frame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    /// Shot identifier.
    pub id: ShotId,
    /// Owning project identifier.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Free-form settings used by timeline tools.
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

/// Positioning metadata carried on a shot-link.
///
/// # Invariants
/// - All fields are optional; an empty record serializes to an empty object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkMetadata {
    /// Set when a user explicitly placed the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_positioned: Option<bool>,
    /// Drag origin recorded by timeline tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drag_source: Option<String>,
    /// Set when the link was positioned automatically on append.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_positioned: Option<bool>,
}

impl LinkMetadata {
    /// Returns metadata marking an automatically positioned append.
    #[must_use]
    pub const fn auto_positioned() -> Self {
        Self {
            user_positioned: None,
            drag_source: None,
            auto_positioned: Some(true),
        }
    }

    /// Returns true when no metadata fields are set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.user_positioned.is_none()
            && self.drag_source.is_none()
            && self.auto_positioned.is_none()
    }
}

/// Association of one generation to one shot at an optional timeline frame.
///
/// # Invariants
/// - `(shot_id, timeline_frame)` is unique for non-null frames; null frames
///   may repeat.
/// - Duplicate `(shot_id, generation_id)` links are permitted and
///   semantically meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotLink {
    /// Shot-link identifier.
    pub id: ShotLinkId,
    /// Shot identifier.
    pub shot_id: ShotId,
    /// Generation identifier.
    pub generation_id: GenerationId,
    /// Optional non-negative timeline frame.
    pub timeline_frame: Option<u32>,
    /// Positioning metadata.
    #[serde(default)]
    pub metadata: LinkMetadata,
    /// Creation timestamp, the secondary ordering key within a shot.
    pub created_at: Timestamp,
}
