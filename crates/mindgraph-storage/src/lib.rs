use chrono::{DateTime, TimeZone, Utc};
use mindgraph_core::{TreeNode, UiSettings};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod schema;
mod session;
mod settings;

const SCHEMA_VERSION: u32 = 1;

/// Version tag written into every session payload.
pub const FORMAT_VERSION: &str = "2.0";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Payload encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Other error: {0}")]
    Other(String),
}

/// Everything needed to restore a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub input: String,
    /// Stored as a flat pre-order list so decoding never nests deeper than one node.
    #[serde(default, with = "flat_tree")]
    pub tree: Option<TreeNode>,
    #[serde(default)]
    pub settings: UiSettings,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub version: String,
}

impl SessionPayload {
    pub fn new(input: impl Into<String>, tree: Option<&TreeNode>, settings: UiSettings) -> Self {
        Self {
            input: input.into(),
            tree: tree.cloned(),
            settings,
            timestamp: Utc::now().timestamp_millis(),
            version: FORMAT_VERSION.to_string(),
        }
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

mod flat_tree {
    use mindgraph_core::{FlatNode, TreeNode};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(tree: &Option<TreeNode>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        tree.as_ref().map(TreeNode::flatten).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<TreeNode>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Vec<FlatNode>>::deserialize(deserializer)?
            .map(TreeNode::unflatten)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

/// SQLite-backed keyed store for sessions and UI settings.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let _ = conn.busy_timeout(Duration::from_millis(2_500));
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    fn init(&self) -> Result<(), StorageError> {
        schema::create_tables(&self.conn)?;
        schema::apply_schema_migrations(self)
    }

    fn schema_version(&self) -> Result<u32, StorageError> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version.max(0) as u32)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StorageError> {
        self.conn
            .pragma_update(None, "user_version", version.to_string())?;
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Upsert the payload under `key`. Nothing is written if encoding fails.
    pub fn save_session(&self, key: &str, payload: &SessionPayload) -> Result<(), StorageError> {
        session::save_session(&self.conn, key, payload)
    }

    pub fn load_session(&self, key: &str) -> Result<Option<SessionPayload>, StorageError> {
        session::load_session(&self.conn, key)
    }

    /// Returns whether a session was stored under `key`.
    pub fn clear_session(&self, key: &str) -> Result<bool, StorageError> {
        session::clear_session(&self.conn, key)
    }

    /// Stored session keys, most recently saved first.
    pub fn session_keys(&self) -> Result<Vec<String>, StorageError> {
        session::session_keys(&self.conn)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn save_settings(&self, key: &str, settings: &UiSettings) -> Result<(), StorageError> {
        settings::save_settings(&self.conn, key, settings)
    }

    pub fn load_settings(&self, key: &str) -> Result<Option<UiSettings>, StorageError> {
        settings::load_settings(&self.conn, key)
    }
}

#[cfg(test)]
mod tests;
