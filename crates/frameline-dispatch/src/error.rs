// crates/frameline-dispatch/src/error.rs
// ============================================================================
// Module: Admission Errors
// Description: Error taxonomy surfaced by the admission operations.
// Purpose: Keep caller-facing failures typed and stable.
// Dependencies: frameline-core, thiserror
// ============================================================================

//! ## Overview
//! Admission operations surface three error kinds: invalid input, absent
//! entities, and datastore faults. Two failure shapes are deliberately not
//! errors: a lifecycle precondition miss returns `false` (no row updated),
//! and claim contention returns an empty result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use frameline_core::StoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Admission Errors
// ============================================================================

/// Errors surfaced by the admission surface.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Malformed identifier, frame value, or request payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Referenced task, generation, shot, or shot-link is absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Datastore fault.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
