// crates/frameline-core/src/core/account.rs
// ============================================================================
// Module: Frameline Accounts
// Description: Users, capability settings, and project ownership containers.
// Purpose: Model the ownership chain every task resolves through.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! Every task belongs to exactly one project and every project to exactly
//! one user. Users carry the credit balance and the two capability flags the
//! eligibility evaluator gates on. Projects are pure ownership containers;
//! deleting one cascades to its tasks, generations, and shots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ProjectId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: User Settings
// ============================================================================

/// Capability flags controlling where a user's tasks may run.
///
/// # Invariants
/// - Both flags default to true for newly created users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Whether service-mode (cloud) claims may take this user's tasks.
    #[serde(default = "default_capability")]
    pub allows_cloud: bool,
    /// Whether user-mode (local) claims may take this user's tasks.
    #[serde(default = "default_capability")]
    pub allows_local: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            allows_cloud: true,
            allows_local: true,
        }
    }
}

/// Returns the default for a capability flag.
const fn default_capability() -> bool {
    true
}

// ============================================================================
// SECTION: User
// ============================================================================

/// User row with credit balance and capability settings.
///
/// # Invariants
/// - `credits` is non-negative; zero means ineligible for claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Credit balance; zero makes the user ineligible.
    pub credits: i64,
    /// Capability settings.
    pub settings: UserSettings,
    /// Free-form preference record.
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

impl User {
    /// Creates a user with default settings and empty preferences.
    #[must_use]
    pub fn new(id: UserId, credits: i64) -> Self {
        Self {
            id,
            credits,
            settings: UserSettings::default(),
            preferences: Map::new(),
        }
    }
}

// ============================================================================
// SECTION: Project
// ============================================================================

/// Project row owning tasks, generations, and shots.
///
/// # Invariants
/// - A project belongs to exactly one user; deleting it cascades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Owning user identifier.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
}
