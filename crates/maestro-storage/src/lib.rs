use chrono::{DateTime, Utc};
use maestro_core::{WorkspaceSnapshot, SNAPSHOT_SCHEMA_VERSION};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const STORE_SCHEMA_VERSION: i64 = 2;

/// Save log rows kept per snapshot key; older rows are pruned on save.
pub const SAVE_HISTORY_LIMIT: usize = 200;

const DEFAULT_SNAPSHOT_KEY: &str = "default";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
    #[error("unsupported snapshot version {found}, max supported {supported}")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },
}

/// Durable mirror of the workspace graph. The in-memory store stays the
/// source of truth; implementations only need to persist whole snapshots.
pub trait SnapshotStore: Send {
    fn save(&mut self, snapshot: &WorkspaceSnapshot) -> Result<(), StorageError>;
    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError>;
    fn clear(&mut self) -> Result<(), StorageError>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn save(&mut self, snapshot: &WorkspaceSnapshot) -> Result<(), StorageError> {
        (**self).save(snapshot)
    }

    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError> {
        (**self).load()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub saved_at: DateTime<Utc>,
    pub space_count: usize,
    pub segment_count: usize,
    pub tab_count: usize,
}

pub struct SqliteSnapshotStore {
    conn: Connection,
    key: String,
    save_history: usize,
}

impl SqliteSnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let store = Self {
            conn,
            key: DEFAULT_SNAPSHOT_KEY.to_string(),
            save_history: SAVE_HISTORY_LIMIT,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Scopes reads and writes to a named slot, for keeping several
    /// workspaces in one database file.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Caps the save log for this key. Zero is treated as one.
    pub fn with_save_history(mut self, limit: usize) -> Self {
        self.save_history = limit.max(1);
        self
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let mut current = self.schema_version()?;
        if current > STORE_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: STORE_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_workspace_snapshot.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
            current = 1;
        }

        if current < 2 {
            let sql = include_str!("../migrations/0002_snapshot_saves.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 2", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn last_saved_at(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let saved_at: Option<String> = self
            .conn
            .query_row(
                "SELECT saved_at FROM workspace_snapshots WHERE snapshot_key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?;
        saved_at.map(parse_timestamp).transpose()
    }

    /// Most recent saves first.
    pub fn recent_saves(&self, limit: usize) -> Result<Vec<SaveRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT saved_at, space_count, segment_count, tab_count
            FROM snapshot_saves
            WHERE snapshot_key = ?1
            ORDER BY save_id DESC
            LIMIT ?2
            ",
        )?;
        let rows = stmt.query_map(params![self.key, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (saved_at, space_count, segment_count, tab_count) = row?;
            records.push(SaveRecord {
                saved_at: parse_timestamp(saved_at)?,
                space_count: space_count.max(0) as usize,
                segment_count: segment_count.max(0) as usize,
                tab_count: tab_count.max(0) as usize,
            });
        }
        Ok(records)
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&mut self, snapshot: &WorkspaceSnapshot) -> Result<(), StorageError> {
        let payload_json = serde_json::to_string(snapshot)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let saved_at = snapshot.saved_at.to_rfc3339();

        let tx = self.conn.transaction()?;
        tx.execute(
            "
            INSERT INTO workspace_snapshots (
                snapshot_key,
                schema_version,
                payload_json,
                saved_at
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(snapshot_key) DO UPDATE SET
                schema_version=excluded.schema_version,
                payload_json=excluded.payload_json,
                saved_at=excluded.saved_at
            ",
            params![self.key, snapshot.schema_version, payload_json, saved_at],
        )?;
        tx.execute(
            "
            INSERT INTO snapshot_saves (
                snapshot_key,
                saved_at,
                space_count,
                segment_count,
                tab_count
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                self.key,
                saved_at,
                snapshot.spaces.len() as i64,
                snapshot.segment_count() as i64,
                snapshot.tabs.len() as i64,
            ],
        )?;
        let pruned = tx.execute(
            "
            DELETE FROM snapshot_saves
            WHERE snapshot_key = ?1
              AND save_id NOT IN (
                SELECT save_id FROM snapshot_saves
                WHERE snapshot_key = ?1
                ORDER BY save_id DESC
                LIMIT ?2
              )
            ",
            params![self.key, self.save_history as i64],
        )?;
        tx.commit()?;
        if pruned > 0 {
            debug!(key = %self.key, pruned, "pruned save log");
        }
        Ok(())
    }

    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM workspace_snapshots WHERE snapshot_key = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(|json| import_json(&json)).transpose()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM workspace_snapshots WHERE snapshot_key = ?1",
            params![self.key],
        )?;
        self.conn.execute(
            "DELETE FROM snapshot_saves WHERE snapshot_key = ?1",
            params![self.key],
        )?;
        Ok(())
    }
}

/// Keeps the serialized payload in memory. Useful for ephemeral sessions and
/// tests; it still goes through JSON so date handling matches the SQLite path.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    payload: Option<String>,
    saves: usize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, snapshot: &WorkspaceSnapshot) -> Result<(), StorageError> {
        self.payload = Some(export_json(snapshot)?);
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<WorkspaceSnapshot>, StorageError> {
        self.payload.as_deref().map(import_json).transpose()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.payload = None;
        Ok(())
    }
}

/// Pretty JSON backup of a snapshot.
pub fn export_json(snapshot: &WorkspaceSnapshot) -> Result<String, StorageError> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|err| StorageError::Serialization(err.to_string()))
}

pub fn import_json(json: &str) -> Result<WorkspaceSnapshot, StorageError> {
    let snapshot: WorkspaceSnapshot =
        serde_json::from_str(json).map_err(|err| StorageError::Serialization(err.to_string()))?;
    if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSnapshotVersion {
            found: snapshot.schema_version,
            supported: SNAPSHOT_SCHEMA_VERSION,
        });
    }
    Ok(snapshot)
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}
