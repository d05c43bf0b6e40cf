//! SQLite append log. One `records` table holds the rows of every logical table.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concierge_core::error::{ConciergeError, Result};
use concierge_core::traits::AppendLog;
use rusqlite::{Connection, params};

fn db_err(e: rusqlite::Error) -> ConciergeError {
    ConciergeError::Persistence(e.to_string())
}

pub struct SqliteLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        tracing::debug!("📒 Records database: {}", path.display());
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                table_name TEXT NOT NULL,
                row_json TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_records_table ON records(table_name);",
        )
        .map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Rows of `table` in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn
            .prepare("SELECT row_json FROM records WHERE table_name = ?1 ORDER BY id")
            .map_err(db_err)?;
        let raw = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        raw.iter()
            .map(|json| serde_json::from_str::<Vec<String>>(json).map_err(ConciergeError::from))
            .collect()
    }
}

#[async_trait]
impl AppendLog for SqliteLog {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, table: &str, row: Vec<String>) -> Result<()> {
        let row_json = serde_json::to_string(&row)?;
        let table = table.to_string();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|p| p.into_inner());
            conn.execute(
                "INSERT INTO records (table_name, row_json) VALUES (?1, ?2)",
                params![table, row_json],
            )
            .map(|_| ())
            .map_err(db_err)
        })
        .await
        .map_err(|e| ConciergeError::Persistence(format!("append task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let log = SqliteLog::in_memory().unwrap();
        log.append("leads", vec!["2025-01-01".into(), "id-1".into(), "Ana".into()])
            .await
            .unwrap();
        log.append("visits", vec!["x".into()]).await.unwrap();
        log.append("leads", vec!["2025-01-02".into(), "id-2".into(), "Bo, \"Jr\"".into()])
            .await
            .unwrap();

        let leads = log.rows("leads").unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[1][2], "Bo, \"Jr\"");
        assert_eq!(log.rows("visits").unwrap().len(), 1);
        assert!(log.rows("missing").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        {
            let log = SqliteLog::open(&path).unwrap();
            log.append("leads", vec!["a".into()]).await.unwrap();
        }
        let reopened = SqliteLog::open(&path).unwrap();
        assert_eq!(reopened.rows("leads").unwrap(), vec![vec!["a".to_string()]]);
    }
}
