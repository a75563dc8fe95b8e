// crates/frameline-core/src/core/registry.rs
// ============================================================================
// Module: Frameline Task-Type Registry
// Description: Task-type registry entries, run types, and tool-type aliases.
// Purpose: Classify queued work by execution class, category, and tooling.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! Every task names a registry entry that classifies it: `run_type` selects
//! the execution environment (`gpu` or `api`), `category` decides whether
//! completion materializes a generation, and `tool_type` is propagated into
//! generation params. Historical tool-type spellings are normalized through
//! a small alias table so downstream matching stays exact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TaskTypeName;

// ============================================================================
// SECTION: Run Type
// ============================================================================

/// Execution class of a task type.
///
/// # Invariants
/// - Variants are stable for serialization and store persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// GPU-executed task type.
    #[default]
    Gpu,
    /// API-executed task type.
    Api,
}

impl RunType {
    /// Returns the stable persistence label for the run type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Api => "api",
        }
    }

    /// Parses a run-type label leniently.
    ///
    /// Unknown labels yield `None`; callers treat that as no filter.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "gpu" => Some(Self::Gpu),
            "api" => Some(Self::Api),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Category and Billing
// ============================================================================

/// Functional category of a task type.
///
/// # Invariants
/// - Variants are stable for serialization and store persistence.
/// - Only `Generation` tasks materialize generations on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Media-producing task type.
    Generation,
    /// Multi-task coordination type, excluded from concurrency accounting.
    Orchestration,
    /// Post-processing type.
    Processing,
    /// Maintenance or housekeeping type.
    Utility,
}

impl TaskCategory {
    /// Returns the stable persistence label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Orchestration => "orchestration",
            Self::Processing => "processing",
            Self::Utility => "utility",
        }
    }

    /// Parses a category label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "generation" => Some(Self::Generation),
            "orchestration" => Some(Self::Orchestration),
            "processing" => Some(Self::Processing),
            "utility" => Some(Self::Utility),
            _ => None,
        }
    }
}

/// Billing basis for a task type.
///
/// # Invariants
/// - Variants are stable for serialization; cost math is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    /// Billed per second of execution.
    PerSecond,
    /// Billed per produced unit.
    PerUnit,
}

impl BillingType {
    /// Returns the stable persistence label for the billing type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerSecond => "per_second",
            Self::PerUnit => "per_unit",
        }
    }

    /// Parses a billing-type label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "per_second" => Some(Self::PerSecond),
            "per_unit" => Some(Self::PerUnit),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Registry Entry
// ============================================================================

/// Task-type registry entry.
///
/// # Invariants
/// - `name` is unique within the registry.
/// - Inactive entries are never claimable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeSpec {
    /// Unique registry key.
    pub name: TaskTypeName,
    /// Execution class.
    pub run_type: RunType,
    /// Functional category.
    pub category: TaskCategory,
    /// Tool tag propagated into generation params.
    pub tool_type: String,
    /// Billing basis.
    pub billing_type: BillingType,
    /// Whether the entry is claimable at all.
    pub is_active: bool,
}

// ============================================================================
// SECTION: Tool-Type Normalization
// ============================================================================

/// Tool types whose completed output is a video artifact.
const VIDEO_TOOL_TYPES: [&str; 2] = ["travel-between-images", "edit-travel"];

/// Historical tool-type spellings mapped to their canonical forms.
const TOOL_TYPE_ALIASES: [(&str, &str); 3] = [
    ("travel_between_images", "travel-between-images"),
    ("edit_travel", "edit-travel"),
    ("travel_stitch", "travel-stitch"),
];

/// Normalizes a tool type through the historical alias table.
#[must_use]
pub fn canonical_tool_type(tool_type: &str) -> &str {
    for (alias, canonical) in TOOL_TYPE_ALIASES {
        if tool_type == alias {
            return canonical;
        }
    }
    tool_type
}

/// Returns true when the tool type produces video generations.
#[must_use]
pub fn is_video_tool_type(tool_type: &str) -> bool {
    VIDEO_TOOL_TYPES.contains(&canonical_tool_type(tool_type))
}

/// Returns true for travel-stitch-like tool types, which carry the full
/// orchestrator payload and have their shot linkage extracted from it.
#[must_use]
pub fn carries_full_orchestrator_payload(tool_type: &str) -> bool {
    canonical_tool_type(tool_type).starts_with("travel")
}
