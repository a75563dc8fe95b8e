// crates/frameline-core/src/core/mod.rs
// ============================================================================
// Module: Frameline Core Types
// Description: Entity model shared by the scheduler engines and stores.
// Purpose: Group identifiers, entities, payloads, and the time model.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Canonical entity types for the scheduling and materialization subsystem:
//! identifiers, accounts, tasks, the task-type registry, workers, media
//! entities, opaque params payloads, and the injected time model.

/// Users, capability settings, and projects.
pub mod account;
/// Canonical opaque identifiers.
pub mod identifiers;
/// Generations, shots, shot-links, and the denormalized shot index.
pub mod media;
/// Opaque task payloads and the tolerant accessor layer.
pub mod params;
/// Task-type registry entries and tool-type normalization.
pub mod registry;
/// Task rows and lifecycle status.
pub mod task;
/// Timestamps and injected clocks.
pub mod time;
/// Worker registry rows.
pub mod worker;
