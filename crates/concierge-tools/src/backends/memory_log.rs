//! In-memory append log for dry runs and tests.

use std::sync::Mutex;

use async_trait::async_trait;
use concierge_core::error::Result;
use concierge_core::traits::AppendLog;

#[derive(Default)]
pub struct MemoryLog {
    rows: Mutex<Vec<(String, Vec<String>)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to `table`, oldest first.
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        let rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        rows.iter()
            .filter(|(t, _)| t == table)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AppendLog for MemoryLog {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, table: &str, row: Vec<String>) -> Result<()> {
        tracing::debug!("memory log: {table} += {} column(s)", row.len());
        self.rows
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((table.to_string(), row));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rows_per_table() {
        let log = MemoryLog::new();
        log.append("leads", vec!["a".into()]).await.unwrap();
        log.append("visits", vec!["b".into()]).await.unwrap();
        log.append("leads", vec!["c".into()]).await.unwrap();
        assert_eq!(log.rows("leads"), vec![vec!["a".to_string()], vec!["c".to_string()]]);
        assert_eq!(log.len(), 3);
        assert!(log.rows("other").is_empty());
    }
}
