// crates/frameline-dispatch/src/lib.rs
// ============================================================================
// Module: Frameline Dispatch
// Description: Scheduling engines and the admission surface.
// Purpose: Compose claim, count, completion, and timeline behavior over an
//          injected datastore and clock.
// Dependencies: frameline-core, serde, serde_json, thiserror, tracing, uuid
// ============================================================================

//! ## Overview
//! `frameline-dispatch` hosts the request-driven engines of the scheduling
//! subsystem: atomic affinity-aware FIFO claims, capacity-bounded counts and
//! rejection analysis, completion-time generation materialization, and the
//! shot timeline engine with its per-shot serialization. The
//! [`AdmissionSurface`] facade is the boundary consumed by workers and
//! control-plane callers.

/// Claim engine and claim request/response types.
pub mod claim;
/// Completion engine and the media path normalizer seam.
pub mod completion;
/// Scheduler tunables.
pub mod config;
/// Count and analysis engine.
pub mod counts;
/// Admission error taxonomy.
pub mod error;
/// Admission surface facade and builder.
pub mod surface;
/// Shot-link and timeline engine.
pub mod timeline;
/// Shared queue view helpers.
mod view;

pub use crate::claim::ClaimEngine;
pub use crate::claim::ClaimedTask;
pub use crate::claim::ServiceClaimRequest;
pub use crate::claim::UserClaimRequest;
pub use crate::completion::CompletionEngine;
pub use crate::completion::IdentityNormalizer;
pub use crate::completion::MediaPathNormalizer;
pub use crate::config::SchedulerConfig;
pub use crate::counts::CountEngine;
pub use crate::counts::QueueAnalysis;
pub use crate::counts::QueueBreakdown;
pub use crate::counts::RejectionCounts;
pub use crate::counts::UserQueueStats;
pub use crate::error::AdmissionError;
pub use crate::surface::AdmissionSurface;
pub use crate::surface::AdmissionSurfaceBuilder;
pub use crate::timeline::TimelineEngine;
pub use crate::timeline::TimelineFrameChange;
pub use crate::timeline::TimelinePosition;
