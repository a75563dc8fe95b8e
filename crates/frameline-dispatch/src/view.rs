// crates/frameline-dispatch/src/view.rs
// ============================================================================
// Module: Queue View Helpers
// Description: Shared snapshot and readiness queries for claim and counts.
// Purpose: Keep store access patterns identical across the two engines.
// Dependencies: frameline-core
// ============================================================================

//! ## Overview
//! The claim and count engines evaluate the same gates over the same store
//! queries. These helpers assemble user capacity snapshots, cache task-type
//! registry lookups for the duration of one operation, and resolve
//! dependency readiness with the dangling-reference rule (a missing
//! dependency is never satisfied).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use frameline_core::RunType;
use frameline_core::StoreError;
use frameline_core::Task;
use frameline_core::TaskId;
use frameline_core::TaskStore;
use frameline_core::TaskTypeName;
use frameline_core::TaskTypeSpec;
use frameline_core::User;
use frameline_core::UserCapacitySnapshot;
use frameline_core::runtime::eligibility::dependencies_satisfied;

// ============================================================================
// SECTION: Run-Type Filter
// ============================================================================

/// Parses a run-type filter leniently; unknown labels mean no filter.
#[must_use]
pub(crate) fn parse_run_type_filter(label: Option<&str>) -> Option<RunType> {
    label.and_then(RunType::parse)
}

// ============================================================================
// SECTION: User Snapshot
// ============================================================================

/// Assembles a user's capacity snapshot from the store.
pub(crate) fn user_snapshot<S: TaskStore>(
    store: &S,
    user: &User,
) -> Result<UserCapacitySnapshot, StoreError> {
    Ok(UserCapacitySnapshot {
        user_id: user.id.clone(),
        credits: user.credits,
        allows_cloud: user.settings.allows_cloud,
        allows_local: user.settings.allows_local,
        in_progress: store.in_progress_count(&user.id, false)?,
        cloud_in_progress: store.in_progress_count(&user.id, true)?,
    })
}

// ============================================================================
// SECTION: Type Cache
// ============================================================================

/// Per-operation cache of task-type registry lookups.
///
/// # Invariants
/// - A cached `None` records a confirmed-absent registry entry.
pub(crate) struct TypeCache {
    /// Cached registry entries keyed by name.
    specs: BTreeMap<TaskTypeName, Option<TaskTypeSpec>>,
}

impl TypeCache {
    /// Creates an empty cache.
    pub(crate) const fn new() -> Self {
        Self {
            specs: BTreeMap::new(),
        }
    }

    /// Resolves a registry entry, caching the result.
    pub(crate) fn spec<S: TaskStore>(
        &mut self,
        store: &S,
        name: &TaskTypeName,
    ) -> Result<Option<&TaskTypeSpec>, StoreError> {
        if !self.specs.contains_key(name) {
            let loaded = store.load_task_type(name)?;
            self.specs.insert(name.clone(), loaded);
        }
        Ok(self.specs.get(name).and_then(Option::as_ref))
    }
}

// ============================================================================
// SECTION: Dependency Readiness
// ============================================================================

/// Resolves whether a task's dependency set is satisfied.
///
/// An empty set is trivially satisfied; a dangling reference is not.
pub(crate) fn dependency_ready<S: TaskStore>(store: &S, task: &Task) -> Result<bool, StoreError> {
    if task.dependant_on.is_empty() {
        return Ok(true);
    }
    let ids: Vec<TaskId> = task.dependant_on.iter().cloned().collect();
    let statuses = store.task_statuses(&ids)?;
    Ok(dependencies_satisfied(&task.dependant_on, &statuses))
}
