// crates/frameline-core/src/core/worker.rs
// ============================================================================
// Module: Frameline Workers
// Description: Worker registry rows and lifecycle status.
// Purpose: Model the external processes that long-poll the claim surface.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! Workers are external processes. The claim engine auto-registers unknown
//! workers as external and active, refreshes heartbeats on claim attempts,
//! and uses `current_model` for affinity-aware FIFO ranking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::WorkerId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Worker Status
// ============================================================================

/// Worker lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// Worker is polling for claims.
    Active,
    /// Worker is registered but not polling.
    Inactive,
    /// Worker has been terminated.
    Terminated,
}

impl WorkerStatus {
    /// Returns the stable persistence label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Terminated => "terminated",
        }
    }

    /// Parses a persistence label back into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Worker Row
// ============================================================================

/// Instance class assigned to auto-registered workers.
pub const EXTERNAL_INSTANCE_TYPE: &str = "external";

/// Worker registry row.
///
/// # Invariants
/// - `current_model`, when present, names the model loaded on the worker
///   and drives affinity ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Worker identifier.
    pub id: WorkerId,
    /// Instance class label.
    pub instance_type: String,
    /// Lifecycle status.
    pub status: WorkerStatus,
    /// Timestamp of the most recent heartbeat.
    pub last_heartbeat: Option<Timestamp>,
    /// Model currently loaded on the worker, used for affinity matching.
    pub current_model: Option<String>,
    /// Free-form worker metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Worker {
    /// Creates an external, active worker with the provided heartbeat, as
    /// used by claim-time auto-registration.
    #[must_use]
    pub fn external(id: WorkerId, heartbeat: Timestamp) -> Self {
        Self {
            id,
            instance_type: EXTERNAL_INSTANCE_TYPE.to_string(),
            status: WorkerStatus::Active,
            last_heartbeat: Some(heartbeat),
            current_model: None,
            metadata: Map::new(),
        }
    }
}
