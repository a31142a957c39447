use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{Dataset, DatasetKind};

/// Setting key the cached advice text lives under.
pub const ADVICE_KEY: &str = "advice";

/// Metadata about a stored dataset.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StoredDataset {
    pub kind: DatasetKind,
    pub rows: usize,
    pub file_name: Option<String>,
    pub updated_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS datasets (
                    kind TEXT PRIMARY KEY CHECK (kind IN ('nutrition', 'measurement', 'exercise')),
                    rows_json TEXT NOT NULL,
                    row_count INTEGER NOT NULL,
                    file_name TEXT,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
            tracing::debug!("database migrated to version 1");
        }

        Ok(())
    }

    // --- Datasets ---

    /// Replace the stored dataset of `kind` as a whole.
    pub fn save_dataset(&self, kind: DatasetKind, rows: &Dataset, file_name: Option<&str>) -> Result<()> {
        let json = serde_json::to_string(rows).context("Failed to serialize dataset")?;
        let now = Local::now().to_rfc3339();
        let count = i64::try_from(rows.len()).context("Dataset too large")?;
        self.conn.execute(
            "INSERT INTO datasets (kind, rows_json, row_count, file_name, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(kind) DO UPDATE SET
                rows_json = excluded.rows_json,
                row_count = excluded.row_count,
                file_name = excluded.file_name,
                updated_at = excluded.updated_at",
            params![kind.as_str(), json, count, file_name, now],
        )?;
        Ok(())
    }

    /// The stored dataset of `kind`; empty when nothing was imported.
    pub fn load_dataset(&self, kind: DatasetKind) -> Result<Dataset> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT rows_json FROM datasets WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => serde_json::from_str(&j)
                .with_context(|| format!("Stored {kind} dataset is corrupt")),
            None => Ok(Vec::new()),
        }
    }

    pub fn list_datasets(&self) -> Result<Vec<StoredDataset>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, row_count, file_name, updated_at FROM datasets ORDER BY kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (kind, count, file_name, updated_at) = row?;
            results.push(StoredDataset {
                kind: kind.parse()?,
                rows: usize::try_from(count).unwrap_or_default(),
                file_name,
                updated_at,
            });
        }
        Ok(results)
    }

    pub fn delete_dataset(&self, kind: DatasetKind) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM datasets WHERE kind = ?1", params![kind.as_str()])?;
        Ok(rows > 0)
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }
}

/// Cached advice text under the fixed [`ADVICE_KEY`].
pub struct AdviceCache<'a> {
    db: &'a Database,
}

impl<'a> AdviceCache<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self) -> Result<Option<String>> {
        Ok(self.db.get_setting(ADVICE_KEY)?.filter(|a| !a.is_empty()))
    }

    pub fn set(&self, advice: &str) -> Result<()> {
        self.db.set_setting(ADVICE_KEY, advice)
    }

    pub fn clear(&self) -> Result<bool> {
        self.db.delete_setting(ADVICE_KEY)
    }
}
