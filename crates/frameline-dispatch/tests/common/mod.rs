// crates/frameline-dispatch/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for admission surface tests.
// Purpose: Provide a seeded SQLite-backed surface with a manual clock.
// Dependencies: frameline-core, frameline-dispatch, frameline-store-sqlite,
//               tempfile
// ============================================================================

//! ## Overview
//! This module provides a shared fixture wiring the admission surface over a
//! temporary `SQLite` store and a manually advanced clock, plus seed helpers
//! for users, projects, task types, tasks, shots, and generations.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use frameline_core::BillingType;
use frameline_core::Clock;
use frameline_core::Generation;
use frameline_core::GenerationId;
use frameline_core::GenerationType;
use frameline_core::ManualClock;
use frameline_core::Project;
use frameline_core::ProjectId;
use frameline_core::RunType;
use frameline_core::Shot;
use frameline_core::ShotId;
use frameline_core::Task;
use frameline_core::TaskCategory;
use frameline_core::TaskId;
use frameline_core::TaskParams;
use frameline_core::TaskTypeName;
use frameline_core::TaskTypeSpec;
use frameline_core::Timestamp;
use frameline_core::User;
use frameline_core::UserId;
use frameline_core::interfaces::AccountStore;
use frameline_core::interfaces::MediaStore;
use frameline_core::interfaces::TaskStore;
use frameline_dispatch::AdmissionSurface;
use frameline_dispatch::SchedulerConfig;
use frameline_store_sqlite::SqliteEntityStore;
use frameline_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Admission surface over a temporary store with a manual clock.
pub struct Fixture {
    /// Shared entity store.
    pub store: Arc<SqliteEntityStore>,
    /// Manually advanced clock.
    pub clock: Arc<ManualClock>,
    /// Admission surface under test.
    pub surface: AdmissionSurface<SqliteEntityStore>,
    /// Temp directory keeping the database alive.
    _temp: TempDir,
}

/// Builds a fixture with default scheduler config.
pub fn fixture() -> Fixture {
    fixture_with(SchedulerConfig::default())
}

/// Builds a fixture with the provided scheduler config.
pub fn fixture_with(config: SchedulerConfig) -> Fixture {
    let temp = TempDir::new().expect("temp dir");
    let store_config = SqliteStoreConfig::for_path(temp.path().join("frameline.db"));
    let store = Arc::new(SqliteEntityStore::new(&store_config).expect("store init"));
    let clock = Arc::new(ManualClock::starting_at(Timestamp::from_unix_millis(1_000)));
    let clock_handle: Arc<dyn Clock> = Arc::clone(&clock) as Arc<dyn Clock>;
    let surface = AdmissionSurface::builder(Arc::clone(&store))
        .clock(clock_handle)
        .config(config)
        .build()
        .expect("surface build");
    Fixture {
        store,
        clock,
        surface,
        _temp: temp,
    }
}

// ============================================================================
// SECTION: Seed Helpers
// ============================================================================

/// Inserts a user with default settings.
pub fn seed_user(store: &SqliteEntityStore, id: &str, credits: i64) {
    store.insert_user(&User::new(UserId::new(id), credits)).expect("seed user");
}

/// Inserts a user with explicit capability flags.
pub fn seed_user_flags(
    store: &SqliteEntityStore,
    id: &str,
    credits: i64,
    allows_cloud: bool,
    allows_local: bool,
) {
    let mut user = User::new(UserId::new(id), credits);
    user.settings.allows_cloud = allows_cloud;
    user.settings.allows_local = allows_local;
    store.insert_user(&user).expect("seed user");
}

/// Inserts a project owned by the user.
pub fn seed_project(store: &SqliteEntityStore, id: &str, user_id: &str) {
    store
        .insert_project(&Project {
            id: ProjectId::new(id),
            user_id: UserId::new(user_id),
            name: format!("project {id}"),
        })
        .expect("seed project");
}

/// Inserts an active gpu generation-category task type.
pub fn seed_generation_type(store: &SqliteEntityStore, name: &str, tool_type: &str) {
    seed_task_type(store, name, RunType::Gpu, TaskCategory::Generation, tool_type, true);
}

/// Inserts a task type with explicit classification.
pub fn seed_task_type(
    store: &SqliteEntityStore,
    name: &str,
    run_type: RunType,
    category: TaskCategory,
    tool_type: &str,
    is_active: bool,
) {
    store
        .upsert_task_type(&TaskTypeSpec {
            name: TaskTypeName::new(name),
            run_type,
            category,
            tool_type: tool_type.to_string(),
            billing_type: BillingType::PerSecond,
            is_active,
        })
        .expect("seed task type");
}

/// Inserts a queued task with the provided payload and dependencies.
pub fn seed_task(
    store: &SqliteEntityStore,
    id: &str,
    project_id: &str,
    task_type: &str,
    params: TaskParams,
    created_ms: i64,
    deps: &[&str],
) {
    let dependant_on: BTreeSet<TaskId> = deps.iter().map(|dep| TaskId::new(*dep)).collect();
    store
        .insert_task(&Task::queued(
            TaskId::new(id),
            ProjectId::new(project_id),
            TaskTypeName::new(task_type),
            params,
            dependant_on,
            Timestamp::from_unix_millis(created_ms),
        ))
        .expect("seed task");
}

/// Inserts a shot in the project.
pub fn seed_shot(store: &SqliteEntityStore, id: &str, project_id: &str) {
    store
        .insert_shot(&Shot {
            id: ShotId::new(id),
            project_id: ProjectId::new(project_id),
            name: format!("shot {id}"),
            settings: serde_json::Map::new(),
        })
        .expect("seed shot");
}

/// Inserts an unlinked image generation in the project.
pub fn seed_generation(store: &SqliteEntityStore, id: &str, project_id: &str) {
    store
        .insert_generation(&Generation {
            id: GenerationId::new(id),
            project_id: ProjectId::new(project_id),
            generation_type: GenerationType::Image,
            location: format!("s3://outputs/{id}.png"),
            thumbnail_url: None,
            params: TaskParams::new(),
            tasks: Vec::new(),
            shot_data: None,
            primary_variant: None,
            created_at: Timestamp::from_unix_millis(500),
        })
        .expect("seed generation");
}

/// Builds a params payload selecting a model.
pub fn params_with_model(model: &str) -> TaskParams {
    let mut params = TaskParams::new();
    params.insert("model", serde_json::json!(model));
    params
}
