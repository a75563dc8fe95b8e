// crates/frameline-core/src/core/params.rs
// ============================================================================
// Module: Frameline Task Params
// Description: Opaque structured task payloads with a tolerant accessor layer.
// Purpose: Preserve wire field names verbatim while hiding legacy key aliases
//          and orchestrator precedence chains from the engines.
// Dependencies: crate::core::identifiers, serde, serde_json
// ============================================================================

//! ## Overview
//! Task `params` are an opaque string-keyed tree of scalars, arrays, and
//! nested records. Interop requires the wire field names be preserved
//! verbatim (`orchestrator_details`, `full_orchestrator_payload`, `shot_id`,
//! `add_in_position`, `thumbnail_url`). This module wraps the tree in a
//! tagged record type and exposes accessors that walk the documented
//! precedence chains, tolerating the legacy camel-case aliases
//! (`shotId`, `thumbnailUrl`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::ShotId;

// ============================================================================
// SECTION: Precedence Chains
// ============================================================================

/// Nested containers consulted before top-level keys, in precedence order.
///
/// The `full_orchestrator_payload` container is only consulted for task
/// types that carry the full orchestrator payload (travel-stitch family).
const ORCHESTRATOR_PREFIXES: [&[&str]; 2] =
    [&["originalParams", "orchestrator_details"], &["orchestrator_details"]];

/// Deep payload container consulted between orchestrator details and
/// top-level keys.
const DEEP_PAYLOAD_PREFIX: &[&str] = &["full_orchestrator_payload"];

// ============================================================================
// SECTION: Task Params
// ============================================================================

/// Opaque structured task payload.
///
/// # Invariants
/// - The payload is always a string-keyed record; scalar or array roots are
///   rejected at construction.
/// - Field names are preserved verbatim for wire interop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParams(Map<String, Value>);

impl TaskParams {
    /// Creates an empty params record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON value, returning `None` unless the root is a record.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Returns the raw value stored under a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts or replaces a top-level entry.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Returns the payload as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Returns true when the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // ------------------------------------------------------------------
    // Accessor layer
    // ------------------------------------------------------------------

    /// Extracts the shot identifier embedded in the payload.
    ///
    /// Precedence: `originalParams.orchestrator_details.shot_id`, then
    /// `orchestrator_details.shot_id`, then (when `consult_deep_payload`)
    /// `full_orchestrator_payload.shot_id`, then top-level `shot_id`, then
    /// the legacy `shotId` alias. A malformed candidate (non-string or
    /// empty) is treated as absent and the walk continues.
    #[must_use]
    pub fn shot_id(&self, consult_deep_payload: bool) -> Option<ShotId> {
        self.walk_string("shot_id", Some("shotId"), consult_deep_payload).map(ShotId::new)
    }

    /// Extracts the `add_in_position` flag controlling positioned shot
    /// linking. Uses the same precedence walk as [`Self::shot_id`]; defaults
    /// to `false` when absent or malformed everywhere.
    #[must_use]
    pub fn add_in_position(&self, consult_deep_payload: bool) -> bool {
        self.walk_bool("add_in_position", consult_deep_payload).unwrap_or(false)
    }

    /// Extracts the thumbnail URL embedded in the payload.
    ///
    /// Uses the same precedence walk as [`Self::shot_id`], with the legacy
    /// `thumbnailUrl` alias accepted at the top level.
    #[must_use]
    pub fn thumbnail_url(&self, consult_deep_payload: bool) -> Option<String> {
        self.walk_string("thumbnail_url", Some("thumbnailUrl"), consult_deep_payload)
            .map(str::to_owned)
    }

    /// Returns the model selector used for worker affinity ranking.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        non_empty_str(self.0.get("model"))
    }

    // ------------------------------------------------------------------
    // Precedence walking
    // ------------------------------------------------------------------

    /// Walks the precedence chain for a string-valued key.
    fn walk_string(&self, key: &str, top_alias: Option<&str>, deep: bool) -> Option<&str> {
        for prefix in ORCHESTRATOR_PREFIXES {
            if let Some(found) = non_empty_str(self.nested(prefix, key)) {
                return Some(found);
            }
        }
        if deep
            && let Some(found) = non_empty_str(self.nested(DEEP_PAYLOAD_PREFIX, key))
        {
            return Some(found);
        }
        if let Some(found) = non_empty_str(self.0.get(key)) {
            return Some(found);
        }
        top_alias.and_then(|alias| non_empty_str(self.0.get(alias)))
    }

    /// Walks the precedence chain for a boolean-valued key.
    fn walk_bool(&self, key: &str, deep: bool) -> Option<bool> {
        for prefix in ORCHESTRATOR_PREFIXES {
            if let Some(found) = self.nested(prefix, key).and_then(Value::as_bool) {
                return Some(found);
            }
        }
        if deep
            && let Some(found) = self.nested(DEEP_PAYLOAD_PREFIX, key).and_then(Value::as_bool)
        {
            return Some(found);
        }
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Resolves a nested value under a container prefix.
    fn nested(&self, prefix: &[&str], key: &str) -> Option<&Value> {
        let mut current: &Value = self.0.get(*prefix.first()?)?;
        for segment in &prefix[1 ..] {
            current = current.as_object()?.get(*segment)?;
        }
        current.as_object()?.get(key)
    }
}

impl From<Map<String, Value>> for TaskParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the value as a non-empty string slice, treating anything else as
/// absent.
fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|text| !text.is_empty())
}
