//! In-process remote store
//!
//! Keeps each table as a vector of JSON rows and can be switched
//! "unreachable" to simulate an outage.

use super::{RemoteStore, Table};
use crate::error::{Result, VaymnError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug)]
pub struct MemoryRemote {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    reachable: AtomicBool,
    requests: AtomicUsize,
}

impl MemoryRemote {
    /// Empty, reachable store
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Number of requests attempted, including failed ones
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Current rows of `table`, in storage order
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.lock().get(&table).cloned().unwrap_or_default()
    }

    /// Replace the contents of `table` directly, bypassing reachability
    pub fn set_rows(&self, table: Table, rows: Vec<Value>) {
        self.lock().insert(table, rows);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Table, Vec<Value>>> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, table: Table) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.is_reachable() {
            Ok(())
        } else {
            Err(VaymnError::RemoteUnreachable(format!(
                "memory remote is offline ({})",
                table
            )))
        }
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn require_id(table: Table, row: &Value) -> Result<String> {
    row_id(row).map(str::to_string).ok_or_else(|| {
        VaymnError::remote_failed("row has no id", Some(400), Some(table.to_string()))
    })
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select_ordered(&self, table: Table) -> Result<Vec<Value>> {
        self.begin(table)?;

        let column = table.order_column();
        let mut rows = self.rows(table);
        rows.sort_by(|a, b| {
            let a = a.get(column).and_then(Value::as_str).unwrap_or_default();
            let b = b.get(column).and_then(Value::as_str).unwrap_or_default();
            a.cmp(b)
        });
        Ok(rows)
    }

    async fn count(&self, table: Table) -> Result<u64> {
        self.begin(table)?;
        Ok(self.rows(table).len() as u64)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        self.begin(table)?;

        let mut tables = self.lock();
        let existing = tables.entry(table).or_default();
        let mut batch = HashSet::new();
        for row in &rows {
            let id = require_id(table, row)?;
            let taken = existing.iter().any(|r| row_id(r) == Some(id.as_str()));
            if taken || !batch.insert(id.clone()) {
                return Err(VaymnError::remote_failed(
                    format!("duplicate key value violates unique constraint (id={})", id),
                    Some(409),
                    Some(table.to_string()),
                ));
            }
        }
        existing.extend(rows);
        Ok(())
    }

    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        self.begin(table)?;

        let mut tables = self.lock();
        let existing = tables.entry(table).or_default();
        for row in rows {
            let id = require_id(table, &row)?;
            match existing.iter_mut().find(|r| row_id(r) == Some(id.as_str())) {
                Some(slot) => *slot = row,
                None => existing.push(row),
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<()> {
        self.begin(table)?;

        if let Some(existing) = self.lock().get_mut(&table) {
            existing.retain(|r| row_id(r) != Some(id));
        }
        Ok(())
    }

    async fn probe(&self, table: Table) -> Result<()> {
        self.begin(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_select_is_ordered() {
        let remote = MemoryRemote::new();
        remote.set_rows(
            Table::Books,
            vec![json!({"id": "2", "title": "Zorba"}), json!({"id": "1", "title": "Anna"})],
        );

        let rows = remote.select_ordered(Table::Books).await.unwrap();
        assert_eq!(rows[0]["title"], "Anna");
        assert_eq!(rows[1]["title"], "Zorba");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let remote = MemoryRemote::new();
        remote
            .upsert(Table::Users, vec![json!({"id": "u1", "name": "A"})])
            .await
            .unwrap();
        remote
            .upsert(Table::Users, vec![json!({"id": "u1", "name": "B"}), json!({"id": "u2", "name": "C"})])
            .await
            .unwrap();

        let rows = remote.rows(Table::Users);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "B");
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let remote = MemoryRemote::new();
        remote.insert(Table::Admins, vec![json!({"id": "a1"})]).await.unwrap();
        let err = remote.insert(Table::Admins, vec![json!({"id": "a1"})]).await.unwrap_err();
        assert!(matches!(err, VaymnError::RemoteRequestFailed { status_code: Some(409), .. }));
        assert_eq!(remote.rows(Table::Admins).len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_within_batch() {
        let remote = MemoryRemote::new();
        let err = remote
            .insert(Table::Books, vec![json!({"id": "b1"}), json!({"id": "b2"}), json!({"id": "b1"})])
            .await
            .unwrap_err();

        assert!(matches!(err, VaymnError::RemoteRequestFailed { status_code: Some(409), .. }));
        assert!(remote.rows(Table::Books).is_empty());
    }

    #[tokio::test]
    async fn test_offline_fails_every_request() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);

        assert!(remote.probe(Table::Books).await.is_err());
        assert!(remote.count(Table::Books).await.is_err());
        assert!(remote.delete(Table::Books, "x").await.is_err());
        assert_eq!(remote.request_count(), 3);
    }
}
