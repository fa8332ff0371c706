// Handles SQLite storage: answer history and stored configuration

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::HistoryError;
use crate::history::{EntryId, HistoryEntry, HistorySink, Role, Turn};

/// Open (or create) the database file, creating its directory if needed.
pub fn open_db(path: &Path) -> Result<Connection, HistoryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), HistoryError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS app_config (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        CREATE TABLE IF NOT EXISTS history_entries (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS history_turns (
            entry_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (entry_id, position),
            FOREIGN KEY (entry_id) REFERENCES history_entries(id)
        );",
    )?;
    Ok(())
}

/// Inserts or updates a configuration key-value pair.
pub fn update_config_value(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Retrieves a configuration value by key. Returns `None` if the key doesn't exist.
pub fn get_config_value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

/// History sink backed by SQLite.
#[derive(Clone)]
pub struct SqliteHistory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistory {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Most recent entries first, turns in their original order.
    pub async fn recent_entries(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(
            "SELECT id, kind FROM history_entries ORDER BY rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut heads = Vec::new();
        for row in rows {
            heads.push(row?);
        }

        let mut turn_stmt = conn.prepare(
            "SELECT role, content FROM history_turns WHERE entry_id = ?1 ORDER BY position ASC",
        )?;
        let mut entries = Vec::with_capacity(heads.len());
        for (id, kind) in heads {
            let turn_rows = turn_stmt.query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut turns = Vec::new();
            for turn in turn_rows {
                let (role, content) = turn?;
                turns.push(Turn {
                    role: role.parse::<Role>()?,
                    content,
                });
            }
            entries.push(HistoryEntry {
                id: id.parse::<EntryId>()?,
                kind,
                turns,
            });
        }

        Ok(entries)
    }
}

#[async_trait]
impl HistorySink for SqliteHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let id = entry.id.to_string();

        tx.execute(
            "INSERT INTO history_entries (id, kind, created_at) VALUES (?1, ?2, ?3)",
            params![id, entry.kind, chrono::Utc::now().to_rfc3339()],
        )?;
        for (position, turn) in entry.turns.iter().enumerate() {
            tx.execute(
                "INSERT INTO history_turns (entry_id, position, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![id, position as i64, turn.role.as_str(), turn.content],
            )?;
        }
        tx.commit()?;

        debug!(entry_id = %id, turns = entry.turns.len(), "history entry saved");
        Ok(())
    }
}
