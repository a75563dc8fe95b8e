// crates/frameline-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Entity Store
// Description: Durable SchedulerStore backed by SQLite WAL.
// Purpose: Persist scheduler entities with atomic guarded transitions and
//          transactional shot_data denormalization.
// Dependencies: frameline-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the Frameline datastore contracts over `SQLite`.
//! Claim atomicity is a guarded single-statement compare-and-swap on task
//! status; the `(shot_id, timeline_frame)` partial uniqueness is a partial
//! unique index; staged timeline-frame writes and the `shot_data` rebuild
//! they trigger run inside one transaction. Loads fail closed on unknown
//! status labels and schema version mismatches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use frameline_core::AccountStore;
use frameline_core::FrameWrite;
use frameline_core::Generation;
use frameline_core::GenerationId;
use frameline_core::GenerationType;
use frameline_core::MediaStore;
use frameline_core::Project;
use frameline_core::ProjectId;
use frameline_core::Shot;
use frameline_core::ShotId;
use frameline_core::ShotLink;
use frameline_core::ShotLinkId;
use frameline_core::StoreError;
use frameline_core::Task;
use frameline_core::TaskId;
use frameline_core::TaskParams;
use frameline_core::TaskStatus;
use frameline_core::TaskStore;
use frameline_core::TaskTransition;
use frameline_core::TaskTypeName;
use frameline_core::TaskTypeSpec;
use frameline_core::TaskWithOwner;
use frameline_core::Timestamp;
use frameline_core::User;
use frameline_core::UserId;
use frameline_core::UserSettings;
use frameline_core::Worker;
use frameline_core::WorkerId;
use frameline_core::WorkerStatus;
use frameline_core::core::media::LinkMetadata;
use frameline_core::core::media::ShotData;
use frameline_core::core::registry::BillingType;
use frameline_core::core::registry::RunType;
use frameline_core::core::registry::TaskCategory;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` entity store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Returns a configuration with defaults for the provided path.
    #[must_use]
    pub fn for_path(path: PathBuf) -> Self {
        Self {
            path,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Validates runtime limits in the store configuration.
fn validate_runtime_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw params payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Referenced entity is absent.
    #[error("sqlite store entity not found: {0}")]
    NotFound(String),
    /// Integrity constraint violated at commit.
    #[error("sqlite store integrity violation: {0}")]
    Conflict(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
        }
    }
}

/// Classifies a `rusqlite` error, mapping constraint violations to
/// [`SqliteStoreError::Conflict`].
fn map_db_error(error: &rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return SqliteStoreError::Conflict(error.to_string());
    }
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed entity store with WAL support.
///
/// # Invariants
/// - Write access is serialized through a single mutex-guarded connection.
/// - Reads round-robin over a pool of read connections under WAL.
/// - Every shot-link mutation rebuilds `shot_data` before its transaction
///   commits.
#[derive(Clone)]
pub struct SqliteEntityStore {
    /// Shared writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteEntityStore {
    /// Opens an `SQLite`-backed entity store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized, or when the stored schema version is incompatible.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        validate_runtime_limits(config)?;
        let mut write_connection = open_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Selects the next read connection in round-robin order.
    fn read_connection(&self) -> &Mutex<Connection> {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed);
        &self.read_connections[index % self.read_connections.len()]
    }

    /// Locks a read connection, mapping mutex poisoning to a store error.
    fn lock_read(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.read_connection()
            .lock()
            .map_err(|_| SqliteStoreError::Db("read mutex poisoned".to_string()))
    }

    /// Locks the write connection, mapping mutex poisoning to a store error.
    fn lock_write(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("write mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Validates the configured store path for length and shape.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let display = path.display().to_string();
    if display.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid(format!(
            "store path too long: {} chars (max {MAX_TOTAL_PATH_LENGTH})",
            display.len()
        )));
    }
    for component in path.components() {
        let component = component.as_os_str().to_string_lossy();
        if component.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(format!(
                "store path component too long: {} chars (max {MAX_PATH_COMPONENT_LENGTH})",
                component.len()
            )));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(format!(
            "store path is a directory: {display}"
        )));
    }
    Ok(())
}

/// Creates the parent directory for the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens a connection with the configured pragmas applied.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "synchronous", config.sync_mode.pragma_value())
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .pragma_update(None, "foreign_keys", "on")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the schema, failing closed on version mismatches.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let stored: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match stored {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "store schema version {version} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            credits INTEGER NOT NULL,
            allows_cloud INTEGER NOT NULL DEFAULT 1,
            allows_local INTEGER NOT NULL DEFAULT 1,
            preferences TEXT NOT NULL DEFAULT '{}'
        );
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id);
        CREATE TABLE IF NOT EXISTS task_types (
            name TEXT PRIMARY KEY,
            run_type TEXT NOT NULL DEFAULT 'gpu',
            category TEXT NOT NULL,
            tool_type TEXT NOT NULL,
            billing_type TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS workers (
            id TEXT PRIMARY KEY,
            instance_type TEXT NOT NULL,
            status TEXT NOT NULL,
            last_heartbeat INTEGER,
            current_model TEXT,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            task_type TEXT NOT NULL,
            params TEXT NOT NULL,
            status TEXT NOT NULL,
            dependant_on TEXT NOT NULL DEFAULT '[]',
            output_location TEXT,
            error_message TEXT,
            worker_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER,
            generation_started_at INTEGER,
            generation_processed_at INTEGER,
            generation_created INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status_created
            ON tasks(status, created_at, id);
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        CREATE TABLE IF NOT EXISTS generations (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            generation_type TEXT NOT NULL,
            location TEXT NOT NULL,
            thumbnail_url TEXT,
            params TEXT NOT NULL,
            tasks TEXT NOT NULL DEFAULT '[]',
            shot_data TEXT,
            primary_variant TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS shots (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            settings TEXT NOT NULL DEFAULT '{}'
        );
        CREATE TABLE IF NOT EXISTS shot_links (
            id TEXT PRIMARY KEY,
            shot_id TEXT NOT NULL REFERENCES shots(id) ON DELETE CASCADE,
            generation_id TEXT NOT NULL REFERENCES generations(id) ON DELETE CASCADE,
            timeline_frame INTEGER,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_shot_links_shot_frame
            ON shot_links(shot_id, timeline_frame)
            WHERE timeline_frame IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_shot_links_generation
            ON shot_links(generation_id);
        CREATE INDEX IF NOT EXISTS idx_shot_links_shot ON shot_links(shot_id);",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: JSON Column Helpers
// ============================================================================

/// Serializes a JSON-backed column value.
fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes a JSON-backed column value.
fn from_json_text<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(text).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a persisted task status label, failing closed on unknown labels.
fn parse_status(label: &str) -> Result<TaskStatus, SqliteStoreError> {
    TaskStatus::parse(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unknown task status: {label}")))
}

/// Parses a persisted timestamp column.
const fn timestamp_from(millis: Option<i64>) -> Option<Timestamp> {
    match millis {
        Some(value) => Some(Timestamp::from_unix_millis(value)),
        None => None,
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Intermediate task row fetched before domain mapping.
struct TaskRow {
    /// Task identifier.
    id: String,
    /// Owning project identifier.
    project_id: String,
    /// Registry key.
    task_type: String,
    /// Raw params JSON.
    params: String,
    /// Status label.
    status: String,
    /// Raw dependency JSON array.
    dependant_on: String,
    /// Output location.
    output_location: Option<String>,
    /// Error message.
    error_message: Option<String>,
    /// Worker binding.
    worker_id: Option<String>,
    /// Creation timestamp.
    created_at: i64,
    /// Mutation timestamp.
    updated_at: Option<i64>,
    /// Claim timestamp.
    generation_started_at: Option<i64>,
    /// Terminal timestamp.
    generation_processed_at: Option<i64>,
    /// Materialization latch.
    generation_created: bool,
}

impl TaskRow {
    /// Reads a task row from a query result.
    fn read(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            task_type: row.get(2)?,
            params: row.get(3)?,
            status: row.get(4)?,
            dependant_on: row.get(5)?,
            output_location: row.get(6)?,
            error_message: row.get(7)?,
            worker_id: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            generation_started_at: row.get(11)?,
            generation_processed_at: row.get(12)?,
            generation_created: row.get(13)?,
        })
    }

    /// Maps the raw row into the domain task type.
    fn into_task(self) -> Result<Task, SqliteStoreError> {
        let params = TaskParams::from_value(from_json_text(&self.params)?)
            .ok_or_else(|| SqliteStoreError::Invalid("task params root must be a record".to_string()))?;
        let dependant_on: BTreeSet<TaskId> = from_json_text(&self.dependant_on)?;
        Ok(Task {
            id: TaskId::new(self.id),
            project_id: ProjectId::new(self.project_id),
            task_type: TaskTypeName::new(self.task_type),
            params,
            status: parse_status(&self.status)?,
            dependant_on,
            output_location: self.output_location,
            error_message: self.error_message,
            worker_id: self.worker_id.map(WorkerId::new),
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: timestamp_from(self.updated_at),
            generation_started_at: timestamp_from(self.generation_started_at),
            generation_processed_at: timestamp_from(self.generation_processed_at),
            generation_created: self.generation_created,
        })
    }
}

/// Column list used by every task query.
const TASK_COLUMNS: &str = "tasks.id, tasks.project_id, tasks.task_type, tasks.params, \
     tasks.status, tasks.dependant_on, tasks.output_location, tasks.error_message, \
     tasks.worker_id, tasks.created_at, tasks.updated_at, tasks.generation_started_at, \
     tasks.generation_processed_at, tasks.generation_created";

/// Maps a shot-link query row into the domain type.
fn shot_link_from_row(row: &rusqlite::Row<'_>) -> Result<(ShotLink, String), rusqlite::Error> {
    let id: String = row.get(0)?;
    let shot_id: String = row.get(1)?;
    let generation_id: String = row.get(2)?;
    let timeline_frame: Option<i64> = row.get(3)?;
    let metadata: String = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let link = ShotLink {
        id: ShotLinkId::new(id),
        shot_id: ShotId::new(shot_id),
        generation_id: GenerationId::new(generation_id),
        timeline_frame: timeline_frame.and_then(|frame| u32::try_from(frame).ok()),
        metadata: LinkMetadata::default(),
        created_at: Timestamp::from_unix_millis(created_at),
    };
    Ok((link, metadata))
}

// ============================================================================
// SECTION: Account Store
// ============================================================================

impl AccountStore for SqliteEntityStore {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let preferences = to_json_text(&user.preferences)?;
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO users (id, credits, allows_cloud, allows_local, preferences)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.as_str(),
                    user.credits,
                    user.settings.allows_cloud,
                    user.settings.allows_local,
                    preferences
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_user(&self, user_id: &UserId) -> Result<Option<User>, StoreError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, credits, allows_cloud, allows_local, preferences
                 FROM users WHERE id = ?1",
                params![user_id.as_str()],
                user_from_row,
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        row.map(User::try_from).transpose().map_err(StoreError::from)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, credits, allows_cloud, allows_local, preferences
                 FROM users ORDER BY id",
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let rows = stmt
            .query_map([], user_from_row)
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let mut users = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| StoreError::from(map_db_error(&err)))?;
            users.push(User::try_from(raw).map_err(StoreError::from)?);
        }
        Ok(users)
    }

    fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO projects (id, user_id, name) VALUES (?1, ?2, ?3)",
                params![project.id.as_str(), project.user_id.as_str(), project.name],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_project(&self, project_id: &ProjectId) -> Result<Option<Project>, StoreError> {
        let guard = self.lock_read()?;
        guard
            .query_row(
                "SELECT id, user_id, name FROM projects WHERE id = ?1",
                params![project_id.as_str()],
                |row| {
                    let id: String = row.get(0)?;
                    let user_id: String = row.get(1)?;
                    let name: String = row.get(2)?;
                    Ok(Project {
                        id: ProjectId::new(id),
                        user_id: UserId::new(user_id),
                        name,
                    })
                },
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))
    }

    fn delete_project(&self, project_id: &ProjectId) -> Result<(), StoreError> {
        let guard = self.lock_write()?;
        guard
            .execute("DELETE FROM projects WHERE id = ?1", params![project_id.as_str()])
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }
}

/// Raw user row before settings mapping.
struct UserRow {
    /// User identifier.
    id: String,
    /// Credit balance.
    credits: i64,
    /// Cloud capability flag.
    allows_cloud: bool,
    /// Local capability flag.
    allows_local: bool,
    /// Raw preferences JSON.
    preferences: String,
}

/// Reads a raw user row from a query result.
fn user_from_row(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        credits: row.get(1)?,
        allows_cloud: row.get(2)?,
        allows_local: row.get(3)?,
        preferences: row.get(4)?,
    })
}

impl TryFrom<UserRow> for User {
    type Error = SqliteStoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(row.id),
            credits: row.credits,
            settings: UserSettings {
                allows_cloud: row.allows_cloud,
                allows_local: row.allows_local,
            },
            preferences: from_json_text(&row.preferences)?,
        })
    }
}

// ============================================================================
// SECTION: Task Store
// ============================================================================

impl TaskStore for SqliteEntityStore {
    fn upsert_task_type(&self, spec: &TaskTypeSpec) -> Result<(), StoreError> {
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO task_types (name, run_type, category, tool_type, billing_type, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET
                     run_type = excluded.run_type,
                     category = excluded.category,
                     tool_type = excluded.tool_type,
                     billing_type = excluded.billing_type,
                     is_active = excluded.is_active",
                params![
                    spec.name.as_str(),
                    spec.run_type.as_str(),
                    spec.category.as_str(),
                    spec.tool_type,
                    spec.billing_type.as_str(),
                    spec.is_active
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_task_type(&self, name: &TaskTypeName) -> Result<Option<TaskTypeSpec>, StoreError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT name, run_type, category, tool_type, billing_type, is_active
                 FROM task_types WHERE name = ?1",
                params![name.as_str()],
                |row| {
                    let name: String = row.get(0)?;
                    let run_type: String = row.get(1)?;
                    let category: String = row.get(2)?;
                    let tool_type: String = row.get(3)?;
                    let billing_type: String = row.get(4)?;
                    let is_active: bool = row.get(5)?;
                    Ok((name, run_type, category, tool_type, billing_type, is_active))
                },
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let Some((name, run_type, category, tool_type, billing_type, is_active)) = row else {
            return Ok(None);
        };
        let spec = TaskTypeSpec {
            name: TaskTypeName::new(name),
            run_type: RunType::parse(&run_type).ok_or_else(|| {
                StoreError::Invalid(format!("unknown run type: {run_type}"))
            })?,
            category: TaskCategory::parse(&category).ok_or_else(|| {
                StoreError::Invalid(format!("unknown task category: {category}"))
            })?,
            tool_type,
            billing_type: BillingType::parse(&billing_type).ok_or_else(|| {
                StoreError::Invalid(format!("unknown billing type: {billing_type}"))
            })?,
            is_active,
        };
        Ok(Some(spec))
    }

    fn upsert_worker(&self, worker: &Worker) -> Result<(), StoreError> {
        let metadata = to_json_text(&worker.metadata)?;
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO workers (id, instance_type, status, last_heartbeat, current_model, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     instance_type = excluded.instance_type,
                     status = excluded.status,
                     last_heartbeat = excluded.last_heartbeat,
                     current_model = excluded.current_model,
                     metadata = excluded.metadata",
                params![
                    worker.id.as_str(),
                    worker.instance_type,
                    worker.status.as_str(),
                    worker.last_heartbeat.map(Timestamp::as_unix_millis),
                    worker.current_model,
                    metadata
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_worker(&self, worker_id: &WorkerId) -> Result<Option<Worker>, StoreError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, instance_type, status, last_heartbeat, current_model, metadata
                 FROM workers WHERE id = ?1",
                params![worker_id.as_str()],
                |row| {
                    let id: String = row.get(0)?;
                    let instance_type: String = row.get(1)?;
                    let status: String = row.get(2)?;
                    let last_heartbeat: Option<i64> = row.get(3)?;
                    let current_model: Option<String> = row.get(4)?;
                    let metadata: String = row.get(5)?;
                    Ok((id, instance_type, status, last_heartbeat, current_model, metadata))
                },
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let Some((id, instance_type, status, last_heartbeat, current_model, metadata)) = row
        else {
            return Ok(None);
        };
        let worker = Worker {
            id: WorkerId::new(id),
            instance_type,
            status: WorkerStatus::parse(&status).ok_or_else(|| {
                StoreError::Invalid(format!("unknown worker status: {status}"))
            })?,
            last_heartbeat: timestamp_from(last_heartbeat),
            current_model,
            metadata: from_json_text(&metadata).map_err(StoreError::from)?,
        };
        Ok(Some(worker))
    }

    fn touch_worker_heartbeat(
        &self,
        worker_id: &WorkerId,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let guard = self.lock_write()?;
        guard
            .execute(
                "UPDATE workers SET last_heartbeat = ?1 WHERE id = ?2",
                params![now.as_unix_millis(), worker_id.as_str()],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let params_json = to_json_text(&task.params)?;
        let deps_json = to_json_text(&task.dependant_on)?;
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO tasks (id, project_id, task_type, params, status, dependant_on,
                     output_location, error_message, worker_id, created_at, updated_at,
                     generation_started_at, generation_processed_at, generation_created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    task.id.as_str(),
                    task.project_id.as_str(),
                    task.task_type.as_str(),
                    params_json,
                    task.status.as_str(),
                    deps_json,
                    task.output_location,
                    task.error_message,
                    task.worker_id.as_ref().map(WorkerId::as_str),
                    task.created_at.as_unix_millis(),
                    task.updated_at.map(Timestamp::as_unix_millis),
                    task.generation_started_at.map(Timestamp::as_unix_millis),
                    task.generation_processed_at.map(Timestamp::as_unix_millis),
                    task.generation_created
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_task(&self, task_id: &TaskId) -> Result<Option<Task>, StoreError> {
        let guard = self.lock_read()?;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE tasks.id = ?1");
        let row = guard
            .query_row(&sql, params![task_id.as_str()], TaskRow::read)
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        row.map(TaskRow::into_task).transpose().map_err(StoreError::from)
    }

    fn task_statuses(
        &self,
        task_ids: &[TaskId],
    ) -> Result<BTreeMap<TaskId, TaskStatus>, StoreError> {
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare("SELECT status FROM tasks WHERE id = ?1")
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let mut statuses = BTreeMap::new();
        for task_id in task_ids {
            let label: Option<String> = stmt
                .query_row(params![task_id.as_str()], |row| row.get(0))
                .optional()
                .map_err(|err| StoreError::from(map_db_error(&err)))?;
            if let Some(label) = label {
                statuses.insert(task_id.clone(), parse_status(&label).map_err(StoreError::from)?);
            }
        }
        Ok(statuses)
    }

    fn queued_tasks(&self, user_id: Option<&UserId>) -> Result<Vec<TaskWithOwner>, StoreError> {
        let guard = self.lock_read()?;
        let base = format!(
            "SELECT {TASK_COLUMNS}, projects.user_id FROM tasks
             JOIN projects ON tasks.project_id = projects.id
             WHERE tasks.status = 'queued'"
        );
        let sql = if user_id.is_some() {
            format!("{base} AND projects.user_id = ?1 ORDER BY tasks.created_at, tasks.id")
        } else {
            format!("{base} ORDER BY tasks.created_at, tasks.id")
        };
        let mut stmt = guard.prepare(&sql).map_err(|err| StoreError::from(map_db_error(&err)))?;
        let map_row = |row: &rusqlite::Row<'_>| -> Result<(TaskRow, String), rusqlite::Error> {
            let task = TaskRow::read(row)?;
            let owner: String = row.get(14)?;
            Ok((task, owner))
        };
        let rows: Vec<(TaskRow, String)> = match user_id {
            Some(user_id) => stmt
                .query_map(params![user_id.as_str()], map_row)
                .map_err(|err| StoreError::from(map_db_error(&err)))?
                .collect::<Result<_, _>>()
                .map_err(|err| StoreError::from(map_db_error(&err)))?,
            None => stmt
                .query_map([], map_row)
                .map_err(|err| StoreError::from(map_db_error(&err)))?
                .collect::<Result<_, _>>()
                .map_err(|err| StoreError::from(map_db_error(&err)))?,
        };
        let mut tasks = Vec::with_capacity(rows.len());
        for (row, owner) in rows {
            tasks.push(TaskWithOwner {
                task: row.into_task().map_err(StoreError::from)?,
                user_id: UserId::new(owner),
            });
        }
        Ok(tasks)
    }

    fn in_progress_count(&self, user_id: &UserId, cloud_only: bool) -> Result<usize, StoreError> {
        let guard = self.lock_read()?;
        let base = "SELECT COUNT(*) FROM tasks
             JOIN projects ON tasks.project_id = projects.id
             WHERE projects.user_id = ?1
               AND tasks.status = 'in_progress'
               AND tasks.task_type NOT LIKE '%orchestrator%'";
        let sql = if cloud_only {
            format!("{base} AND tasks.worker_id IS NOT NULL")
        } else {
            base.to_string()
        };
        let count: i64 = guard
            .query_row(&sql, params![user_id.as_str()], |row| row.get(0))
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn in_progress_started_before(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        let guard = self.lock_read()?;
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE status = 'in_progress'
                   AND generation_started_at IS NOT NULL
                   AND generation_started_at < ?1",
                params![cutoff.as_unix_millis()],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn claim_task(
        &self,
        task_id: &TaskId,
        worker_id: Option<&WorkerId>,
        cap: usize,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let cap = i64::try_from(cap).unwrap_or(i64::MAX);
        let guard = self.lock_write()?;
        let changed = guard
            .execute(
                "UPDATE tasks SET
                     status = 'in_progress',
                     worker_id = COALESCE(?2, worker_id),
                     generation_started_at = ?3,
                     updated_at = ?3
                 WHERE id = ?1 AND status = 'queued'
                   AND (SELECT COUNT(*) FROM tasks live
                        JOIN projects live_project ON live.project_id = live_project.id
                        WHERE live_project.user_id =
                              (SELECT owner.user_id FROM tasks claimed
                               JOIN projects owner ON claimed.project_id = owner.id
                               WHERE claimed.id = ?1)
                          AND live.status = 'in_progress'
                          AND live.task_type NOT LIKE '%orchestrator%') < ?4",
                params![
                    task_id.as_str(),
                    worker_id.map(WorkerId::as_str),
                    now.as_unix_millis(),
                    cap
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(changed == 1)
    }

    fn transition_task(
        &self,
        task_id: &TaskId,
        expected: &[TaskStatus],
        transition: &TaskTransition,
    ) -> Result<bool, StoreError> {
        if expected.is_empty() {
            return Err(StoreError::Invalid(
                "guarded transition requires at least one expected status".to_string(),
            ));
        }
        let placeholders =
            expected.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "UPDATE tasks SET
                 status = ?,
                 worker_id = COALESCE(?, worker_id),
                 output_location = COALESCE(?, output_location),
                 error_message = COALESCE(?, error_message),
                 generation_started_at = COALESCE(?, generation_started_at),
                 generation_processed_at = COALESCE(?, generation_processed_at),
                 updated_at = ?
             WHERE id = ? AND status IN ({placeholders})"
        );
        let mut values: Vec<SqlValue> = vec![
            SqlValue::Text(transition.to.as_str().to_string()),
            transition
                .worker_id
                .as_ref()
                .map_or(SqlValue::Null, |worker| SqlValue::Text(worker.as_str().to_string())),
            transition
                .output_location
                .as_ref()
                .map_or(SqlValue::Null, |location| SqlValue::Text(location.clone())),
            transition
                .error_message
                .as_ref()
                .map_or(SqlValue::Null, |message| SqlValue::Text(message.clone())),
            transition
                .generation_started_at
                .map_or(SqlValue::Null, |at| SqlValue::Integer(at.as_unix_millis())),
            transition
                .generation_processed_at
                .map_or(SqlValue::Null, |at| SqlValue::Integer(at.as_unix_millis())),
            SqlValue::Integer(transition.updated_at.as_unix_millis()),
            SqlValue::Text(task_id.as_str().to_string()),
        ];
        for status in expected {
            values.push(SqlValue::Text(status.as_str().to_string()));
        }
        let guard = self.lock_write()?;
        let changed = guard
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(changed == 1)
    }

    fn mark_generation_created(&self, task_id: &TaskId) -> Result<bool, StoreError> {
        let guard = self.lock_write()?;
        let changed = guard
            .execute(
                "UPDATE tasks SET generation_created = 1
                 WHERE id = ?1 AND generation_created = 0",
                params![task_id.as_str()],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(changed == 1)
    }
}

// ============================================================================
// SECTION: Media Store
// ============================================================================

impl MediaStore for SqliteEntityStore {
    fn insert_generation(&self, generation: &Generation) -> Result<(), StoreError> {
        let params_json = to_json_text(&generation.params)?;
        let tasks_json = to_json_text(&generation.tasks)?;
        let shot_data_json =
            generation.shot_data.as_ref().map(to_json_text).transpose().map_err(StoreError::from)?;
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO generations (id, project_id, generation_type, location,
                     thumbnail_url, params, tasks, shot_data, primary_variant, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    generation.id.as_str(),
                    generation.project_id.as_str(),
                    generation.generation_type.as_str(),
                    generation.location,
                    generation.thumbnail_url,
                    params_json,
                    tasks_json,
                    shot_data_json,
                    generation.primary_variant.as_ref().map(GenerationId::as_str),
                    generation.created_at.as_unix_millis()
                ],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_generation(
        &self,
        generation_id: &GenerationId,
    ) -> Result<Option<Generation>, StoreError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, project_id, generation_type, location, thumbnail_url, params,
                     tasks, shot_data, primary_variant, created_at
                 FROM generations WHERE id = ?1",
                params![generation_id.as_str()],
                generation_row,
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        row.map(GenerationRow::into_generation).transpose().map_err(StoreError::from)
    }

    fn list_generations(&self, project_id: &ProjectId) -> Result<Vec<Generation>, StoreError> {
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, project_id, generation_type, location, thumbnail_url, params,
                     tasks, shot_data, primary_variant, created_at
                 FROM generations WHERE project_id = ?1 ORDER BY created_at, id",
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], generation_row)
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let mut generations = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| StoreError::from(map_db_error(&err)))?;
            generations.push(raw.into_generation().map_err(StoreError::from)?);
        }
        Ok(generations)
    }

    fn insert_shot(&self, shot: &Shot) -> Result<(), StoreError> {
        let settings = to_json_text(&shot.settings)?;
        let guard = self.lock_write()?;
        guard
            .execute(
                "INSERT INTO shots (id, project_id, name, settings) VALUES (?1, ?2, ?3, ?4)",
                params![shot.id.as_str(), shot.project_id.as_str(), shot.name, settings],
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn load_shot(&self, shot_id: &ShotId) -> Result<Option<Shot>, StoreError> {
        let guard = self.lock_read()?;
        let row = guard
            .query_row(
                "SELECT id, project_id, name, settings FROM shots WHERE id = ?1",
                params![shot_id.as_str()],
                |row| {
                    let id: String = row.get(0)?;
                    let project_id: String = row.get(1)?;
                    let name: String = row.get(2)?;
                    let settings: String = row.get(3)?;
                    Ok((id, project_id, name, settings))
                },
            )
            .optional()
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let Some((id, project_id, name, settings)) = row else {
            return Ok(None);
        };
        Ok(Some(Shot {
            id: ShotId::new(id),
            project_id: ProjectId::new(project_id),
            name,
            settings: from_json_text(&settings).map_err(StoreError::from)?,
        }))
    }

    fn insert_shot_link(&self, link: &ShotLink) -> Result<(), StoreError> {
        let metadata = to_json_text(&link.metadata)?;
        let mut guard = self.lock_write()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(map_db_error(&err)))?;
        tx.execute(
            "INSERT INTO shot_links (id, shot_id, generation_id, timeline_frame, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                link.id.as_str(),
                link.shot_id.as_str(),
                link.generation_id.as_str(),
                link.timeline_frame.map(i64::from),
                metadata,
                link.created_at.as_unix_millis()
            ],
        )
        .map_err(|err| StoreError::from(map_db_error(&err)))?;
        rebuild_shot_data(&tx, &link.generation_id).map_err(StoreError::from)?;
        tx.commit().map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }

    fn links_for_shot(&self, shot_id: &ShotId) -> Result<Vec<ShotLink>, StoreError> {
        let guard = self.lock_read()?;
        let mut stmt = guard
            .prepare(
                "SELECT id, shot_id, generation_id, timeline_frame, metadata, created_at
                 FROM shot_links WHERE shot_id = ?1
                 ORDER BY timeline_frame IS NULL, timeline_frame, created_at, generation_id",
            )
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let rows = stmt
            .query_map(params![shot_id.as_str()], shot_link_from_row)
            .map_err(|err| StoreError::from(map_db_error(&err)))?;
        let mut links = Vec::new();
        for row in rows {
            let (mut link, metadata) =
                row.map_err(|err| StoreError::from(map_db_error(&err)))?;
            link.metadata = from_json_text(&metadata).map_err(StoreError::from)?;
            links.push(link);
        }
        Ok(links)
    }

    fn apply_frame_stages(
        &self,
        shot_id: &ShotId,
        stages: &[Vec<FrameWrite>],
    ) -> Result<(), StoreError> {
        let mut guard = self.lock_write()?;
        let tx = guard.transaction().map_err(|err| StoreError::from(map_db_error(&err)))?;
        let mut affected: BTreeSet<GenerationId> = BTreeSet::new();
        for stage in stages {
            for write in stage {
                let generation: Option<String> = tx
                    .query_row(
                        "SELECT generation_id FROM shot_links WHERE id = ?1 AND shot_id = ?2",
                        params![write.link_id.as_str(), shot_id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|err| StoreError::from(map_db_error(&err)))?;
                let Some(generation) = generation else {
                    return Err(StoreError::NotFound(format!(
                        "shot link {} is not part of shot {}",
                        write.link_id, shot_id
                    )));
                };
                affected.insert(GenerationId::new(generation));
                tx.execute(
                    "UPDATE shot_links SET timeline_frame = ?1 WHERE id = ?2 AND shot_id = ?3",
                    params![
                        write.timeline_frame.map(i64::from),
                        write.link_id.as_str(),
                        shot_id.as_str()
                    ],
                )
                .map_err(|err| StoreError::from(map_db_error(&err)))?;
            }
        }
        for generation_id in &affected {
            rebuild_shot_data(&tx, generation_id).map_err(StoreError::from)?;
        }
        tx.commit().map_err(|err| StoreError::from(map_db_error(&err)))?;
        Ok(())
    }
}

/// Raw generation row before domain mapping.
struct GenerationRow {
    /// Generation identifier.
    id: String,
    /// Owning project identifier.
    project_id: String,
    /// Artifact class label.
    generation_type: String,
    /// Storage location.
    location: String,
    /// Thumbnail URL.
    thumbnail_url: Option<String>,
    /// Raw params JSON.
    params: String,
    /// Raw originating-task JSON array.
    tasks: String,
    /// Raw shot-data JSON.
    shot_data: Option<String>,
    /// Primary-variant reference.
    primary_variant: Option<String>,
    /// Materialization timestamp.
    created_at: i64,
}

/// Reads a raw generation row from a query result.
fn generation_row(row: &rusqlite::Row<'_>) -> Result<GenerationRow, rusqlite::Error> {
    Ok(GenerationRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        generation_type: row.get(2)?,
        location: row.get(3)?,
        thumbnail_url: row.get(4)?,
        params: row.get(5)?,
        tasks: row.get(6)?,
        shot_data: row.get(7)?,
        primary_variant: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl GenerationRow {
    /// Maps the raw row into the domain generation type.
    fn into_generation(self) -> Result<Generation, SqliteStoreError> {
        let params = TaskParams::from_value(from_json_text(&self.params)?).ok_or_else(|| {
            SqliteStoreError::Invalid("generation params root must be a record".to_string())
        })?;
        let shot_data: Option<ShotData> =
            self.shot_data.as_deref().map(from_json_text).transpose()?;
        Ok(Generation {
            id: GenerationId::new(self.id),
            project_id: ProjectId::new(self.project_id),
            generation_type: GenerationType::parse(&self.generation_type).ok_or_else(|| {
                SqliteStoreError::Invalid(format!(
                    "unknown generation type: {}",
                    self.generation_type
                ))
            })?,
            location: self.location,
            thumbnail_url: self.thumbnail_url,
            params,
            tasks: from_json_text(&self.tasks)?,
            shot_data,
            primary_variant: self.primary_variant.map(GenerationId::new),
            created_at: Timestamp::from_unix_millis(self.created_at),
        })
    }
}

// ============================================================================
// SECTION: Shot Data Denormalization
// ============================================================================

/// Rebuilds a generation's `shot_data` index from its current links.
///
/// Runs inside the caller's transaction so link mutation and index update
/// commit together. No links at all yields a null index.
fn rebuild_shot_data(
    tx: &Transaction<'_>,
    generation_id: &GenerationId,
) -> Result<(), SqliteStoreError> {
    let mut stmt = tx
        .prepare(
            "SELECT shot_id, timeline_frame FROM shot_links
             WHERE generation_id = ?1 ORDER BY shot_id",
        )
        .map_err(|err| map_db_error(&err))?;
    let rows = stmt
        .query_map(params![generation_id.as_str()], |row| {
            let shot_id: String = row.get(0)?;
            let frame: Option<i64> = row.get(1)?;
            Ok((shot_id, frame))
        })
        .map_err(|err| map_db_error(&err))?;
    let mut grouped: BTreeMap<String, Vec<Option<u32>>> = BTreeMap::new();
    for row in rows {
        let (shot_id, frame) = row.map_err(|err| map_db_error(&err))?;
        grouped
            .entry(shot_id)
            .or_default()
            .push(frame.and_then(|value| u32::try_from(value).ok()));
    }
    let shot_data_json = if grouped.is_empty() {
        None
    } else {
        let mut shot_data = ShotData::new();
        for (shot_id, frames) in grouped {
            shot_data.set_frames(&ShotId::new(shot_id), frames);
        }
        Some(to_json_text(&shot_data)?)
    };
    tx.execute(
        "UPDATE generations SET shot_data = ?1 WHERE id = ?2",
        params![shot_data_json, generation_id.as_str()],
    )
    .map_err(|err| map_db_error(&err))?;
    Ok(())
}
