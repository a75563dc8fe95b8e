// crates/frameline-store-sqlite/src/lib.rs
// ============================================================================
// Module: Frameline SQLite Store
// Description: Durable SchedulerStore implementation over SQLite.
// Purpose: Provide the production datastore for the scheduling subsystem.
// Dependencies: frameline-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `frameline-store-sqlite` persists Frameline's entity model in `SQLite`
//! and realizes the datastore contracts from `frameline-core`: guarded
//! compare-and-swap status transitions for claims, a partial unique index
//! for `(shot, timeline_frame)`, and transactional `shot_data`
//! denormalization on every shot-link mutation.

/// SQLite-backed entity store.
pub mod store;

pub use crate::store::SqliteEntityStore;
pub use crate::store::SqliteStoreConfig;
pub use crate::store::SqliteStoreError;
pub use crate::store::SqliteStoreMode;
pub use crate::store::SqliteSyncMode;
