// crates/frameline-dispatch/src/config.rs
// ============================================================================
// Module: Scheduler Config
// Description: Tunables for the admission surface and its engines.
// Purpose: Centralize the concurrency cap, frame spacing, and stuck threshold.
// Dependencies: frameline-core, serde
// ============================================================================

//! ## Overview
//! Scheduler tunables with conservative defaults: the hard per-user
//! concurrency cap (5), the timeline frame spacing convention (50), and the
//! stuck-task reporting threshold (10 minutes). Values are validated before
//! the surface is built.

// ============================================================================
// SECTION: Imports
// ============================================================================

use frameline_core::PER_USER_CONCURRENCY_CAP;
use frameline_core::TIMELINE_FRAME_SPACING;
use serde::Deserialize;

use crate::error::AdmissionError;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the admission surface.
///
/// # Invariants
/// - `per_user_cap` and `frame_spacing` are greater than zero.
/// - `stuck_after_ms` is greater than zero; it is a reporting signal only.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SchedulerConfig {
    /// Hard per-user cap on concurrent non-orchestrator tasks.
    #[serde(default = "default_per_user_cap")]
    pub per_user_cap: usize,
    /// Frame spacing used when appending to a shot timeline.
    #[serde(default = "default_frame_spacing")]
    pub frame_spacing: u32,
    /// Age in milliseconds after which an In-Progress task is reported stuck.
    #[serde(default = "default_stuck_after_ms")]
    pub stuck_after_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            per_user_cap: default_per_user_cap(),
            frame_spacing: default_frame_spacing(),
            stuck_after_ms: default_stuck_after_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::InvalidInput`] when a tunable is out of
    /// range.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.per_user_cap == 0 {
            return Err(AdmissionError::InvalidInput(
                "per_user_cap must be greater than zero".to_string(),
            ));
        }
        if self.frame_spacing == 0 {
            return Err(AdmissionError::InvalidInput(
                "frame_spacing must be greater than zero".to_string(),
            ));
        }
        if self.stuck_after_ms <= 0 {
            return Err(AdmissionError::InvalidInput(
                "stuck_after_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default per-user concurrency cap.
const fn default_per_user_cap() -> usize {
    PER_USER_CONCURRENCY_CAP
}

/// Returns the default timeline frame spacing.
const fn default_frame_spacing() -> u32 {
    TIMELINE_FRAME_SPACING
}

/// Returns the default stuck-task reporting threshold in milliseconds.
const fn default_stuck_after_ms() -> i64 {
    10 * 60 * 1_000
}
