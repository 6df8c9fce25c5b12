//! History Store (§4.B): an append-only, per-test log of [`TestResult`]s
//! backed by sqlite.
//!
//! Grounded in `loom::user_message::SqliteUserMessageStore`: one
//! `rusqlite::Connection` opened per blocking operation via
//! `tokio::task::spawn_blocking`, wrapped by an async trait. Per-name
//! concurrency is a `DashMap` of per-name `RwLock` handles, the same shape
//! the framework uses for per-thread checkpoints in `loom::memory`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rusqlite::{params, Connection};
use tokio::sync::RwLock;

use crate::domain::TestResult;
use crate::error::HistoryError;

/// Append-only, per-test result log (§4.B).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, result: TestResult) -> Result<(), HistoryError>;
    async fn list(&self, qualified_name: &str) -> Result<Vec<TestResult>, HistoryError>;
    async fn list_all(&self) -> Result<HashMap<String, TestResult>, HistoryError>;
    async fn delete_at(&self, qualified_name: &str, index: usize) -> Result<(), HistoryError>;
    async fn truncate(&self, qualified_name: &str) -> Result<(), HistoryError>;
    async fn truncate_all(&self) -> Result<(), HistoryError>;
}

fn open(db_path: &Path) -> Result<Connection, HistoryError> {
    let conn = Connection::open(db_path)?;
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS test_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            qualified_name TEXT NOT NULL,
            seq INTEGER NOT NULL,
            data TEXT NOT NULL
        )
        "#,
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_test_results_name ON test_results(qualified_name, seq)",
        [],
    )?;
    Ok(conn)
}

/// Sqlite-backed [`HistoryStore`]. `seq` is the stable-within-process-lifetime
/// index from §3; `delete_at` renumbers subsequent rows inside a single
/// `BEGIN IMMEDIATE` transaction so a crash mid-write leaves the last-good
/// state (§4.B "Persistence").
pub struct SqliteHistoryStore {
    db_path: PathBuf,
    /// Per-name lock guarding the logical read/write section around the
    /// blocking sqlite call for that name.
    locks: DashMap<String, Arc<RwLock<()>>>,
    /// Held exclusively by `truncate_all`; held shared by everything else so
    /// a global wipe cannot race an in-flight per-name mutation.
    global: RwLock<()>,
}

impl SqliteHistoryStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let db_path = db_path.into();
        open(&db_path)?;
        Ok(Self {
            db_path,
            locks: DashMap::new(),
            global: RwLock::new(()),
        })
    }

    fn lock_for(&self, qualified_name: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(qualified_name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, result: TestResult) -> Result<(), HistoryError> {
        let _global = self.global.read().await;
        let lock = self.lock_for(&result.qualified_name);
        let _guard = lock.write().await;

        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), HistoryError> {
            let conn = open(&db_path)?;
            let data = serde_json::to_string(&result)?;
            let next_seq: i64 = conn.query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM test_results WHERE qualified_name = ?1",
                params![result.qualified_name],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO test_results (qualified_name, seq, data) VALUES (?1, ?2, ?3)",
                params![result.qualified_name, next_seq, data],
            )?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn list(&self, qualified_name: &str) -> Result<Vec<TestResult>, HistoryError> {
        let _global = self.global.read().await;
        let lock = self.lock_for(qualified_name);
        let _guard = lock.read().await;

        let db_path = self.db_path.clone();
        let qualified_name = qualified_name.to_string();
        let rows: Vec<String> = tokio::task::spawn_blocking(move || -> Result<Vec<String>, HistoryError> {
            let conn = open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT data FROM test_results WHERE qualified_name = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt
                .query_map(params![qualified_name], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await??;

        rows.into_iter()
            .map(|data| serde_json::from_str(&data).map_err(HistoryError::from))
            .collect()
    }

    async fn list_all(&self) -> Result<HashMap<String, TestResult>, HistoryError> {
        let _global = self.global.read().await;

        let db_path = self.db_path.clone();
        let rows: Vec<(String, String)> =
            tokio::task::spawn_blocking(move || -> Result<Vec<(String, String)>, HistoryError> {
                let conn = open(&db_path)?;
                let mut stmt = conn.prepare(
                    r#"
                    SELECT qualified_name, data FROM test_results t
                    WHERE seq = (SELECT MAX(seq) FROM test_results WHERE qualified_name = t.qualified_name)
                    "#,
                )?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await??;

        let mut out = HashMap::with_capacity(rows.len());
        for (name, data) in rows {
            out.insert(name, serde_json::from_str(&data)?);
        }
        Ok(out)
    }

    async fn delete_at(&self, qualified_name: &str, index: usize) -> Result<(), HistoryError> {
        let _global = self.global.read().await;
        let lock = self.lock_for(qualified_name);
        let _guard = lock.write().await;

        let db_path = self.db_path.clone();
        let qualified_name = qualified_name.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), HistoryError> {
            let mut conn = open(&db_path)?;
            let tx = conn.transaction()?;
            let id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM test_results WHERE qualified_name = ?1 AND seq = ?2",
                    params![qualified_name, index as i64],
                    |row| row.get(0),
                )
                .ok();
            let Some(id) = id else {
                return Err(HistoryError::IndexOutOfRange {
                    qualified_name,
                    index,
                });
            };
            tx.execute("DELETE FROM test_results WHERE id = ?1", params![id])?;
            tx.execute(
                "UPDATE test_results SET seq = seq - 1 WHERE qualified_name = ?1 AND seq > ?2",
                params![qualified_name, index as i64],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn truncate(&self, qualified_name: &str) -> Result<(), HistoryError> {
        let _global = self.global.read().await;
        let lock = self.lock_for(qualified_name);
        let _guard = lock.write().await;

        let db_path = self.db_path.clone();
        let qualified_name = qualified_name.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), HistoryError> {
            let conn = open(&db_path)?;
            conn.execute(
                "DELETE FROM test_results WHERE qualified_name = ?1",
                params![qualified_name],
            )?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn truncate_all(&self) -> Result<(), HistoryError> {
        let _global = self.global.write().await;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), HistoryError> {
            let conn = open(&db_path)?;
            conn.execute("DELETE FROM test_results", [])?;
            Ok(())
        })
        .await??;
        Ok(())
    }
}
