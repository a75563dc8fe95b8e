// crates/frameline-core/src/lib.rs
// ============================================================================
// Module: Frameline Core
// Description: Entity model, evaluators, and store interfaces for Frameline.
// Purpose: Provide the backend-agnostic core of the scheduling subsystem.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `frameline-core` is the backend-agnostic core of the task scheduling and
//! generation-materialization subsystem: strongly typed entities, the opaque
//! params payload with its tolerant accessor layer, pure eligibility and
//! selection evaluators, and the datastore interfaces the engines consume.
//! It performs no I/O of its own; hosts inject a datastore and a clock.

/// Canonical entity types.
pub mod core;
/// Backend-agnostic datastore contracts.
pub mod interfaces;
/// Pure evaluation logic.
pub mod runtime;

pub use crate::core::account::Project;
pub use crate::core::account::User;
pub use crate::core::account::UserSettings;
pub use crate::core::identifiers::GenerationId;
pub use crate::core::identifiers::ProjectId;
pub use crate::core::identifiers::ShotId;
pub use crate::core::identifiers::ShotLinkId;
pub use crate::core::identifiers::TaskId;
pub use crate::core::identifiers::TaskTypeName;
pub use crate::core::identifiers::UserId;
pub use crate::core::identifiers::WorkerId;
pub use crate::core::media::Generation;
pub use crate::core::media::GenerationType;
pub use crate::core::media::LinkMetadata;
pub use crate::core::media::Shot;
pub use crate::core::media::ShotData;
pub use crate::core::media::ShotLink;
pub use crate::core::media::TIMELINE_FRAME_SPACING;
pub use crate::core::params::TaskParams;
pub use crate::core::registry::BillingType;
pub use crate::core::registry::RunType;
pub use crate::core::registry::TaskCategory;
pub use crate::core::registry::TaskTypeSpec;
pub use crate::core::task::Task;
pub use crate::core::task::TaskStatus;
pub use crate::core::task::TaskWithOwner;
pub use crate::core::time::Clock;
pub use crate::core::time::ManualClock;
pub use crate::core::time::SystemClock;
pub use crate::core::time::Timestamp;
pub use crate::core::worker::Worker;
pub use crate::core::worker::WorkerStatus;
pub use crate::interfaces::AccountStore;
pub use crate::interfaces::FrameWrite;
pub use crate::interfaces::MediaStore;
pub use crate::interfaces::SchedulerStore;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::TaskStore;
pub use crate::interfaces::TaskTransition;
pub use crate::runtime::eligibility::ClaimMode;
pub use crate::runtime::eligibility::PER_USER_CONCURRENCY_CAP;
pub use crate::runtime::eligibility::RejectionReason;
pub use crate::runtime::eligibility::UserCapacitySnapshot;
