// VAYMN - Library Mirror Core
// Copyright (C) 2025 VAYMN contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Local mirror queries
//!
//! Key/value access to the `MirrorEntries` table. Values are JSON documents;
//! callers decide how to decode them.

use crate::error::{Result, VaymnError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

/// Read the raw JSON stored under `key`
///
/// Returns `None` when the key has never been written.
pub async fn get_entry(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM MirrorEntries WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Read and decode the document stored under `key`
///
/// # Errors
/// `CorruptEntry` if the stored JSON does not decode as `T`.
pub async fn get_json<T: DeserializeOwned>(pool: &SqlitePool, key: &str) -> Result<Option<T>> {
    match get_entry(pool, key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| VaymnError::CorruptEntry {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Insert or replace the raw JSON under `key`
pub async fn put_entry(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO MirrorEntries (key, value) VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Serialize `value` and store it under `key`
pub async fn put_json<T: Serialize + ?Sized>(pool: &SqlitePool, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    put_entry(pool, key, &raw).await
}

/// Write several entries in one transaction
///
/// Either every entry is stored or none is.
pub async fn put_entries(pool: &SqlitePool, entries: &[(&str, String)]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (key, value) in entries {
        sqlx::query(
            r#"
            INSERT INTO MirrorEntries (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(*key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Delete every entry
pub async fn clear_entries(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM MirrorEntries").execute(pool).await?;
    Ok(result.rows_affected())
}

/// All stored keys with their last update time, ordered by key
pub async fn list_entries(pool: &SqlitePool) -> Result<Vec<(String, String)>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT key, updated_at FROM MirrorEntries ORDER BY key")
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let db = Database::new_in_memory().await.unwrap();
        assert_eq!(get_entry(db.pool(), "vaymn_books").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = Database::new_in_memory().await.unwrap();

        put_json(db.pool(), "vaymn_users", &vec!["a"]).await.unwrap();
        put_json(db.pool(), "vaymn_users", &vec!["b", "c"]).await.unwrap();

        let stored: Option<Vec<String>> = get_json(db.pool(), "vaymn_users").await.unwrap();
        assert_eq!(stored, Some(vec!["b".to_string(), "c".to_string()]));
        assert_eq!(list_entries(db.pool()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_reported() {
        let db = Database::new_in_memory().await.unwrap();
        put_entry(db.pool(), "vaymn_books", "{not json").await.unwrap();

        let err = get_json::<Vec<String>>(db.pool(), "vaymn_books").await.unwrap_err();
        assert!(matches!(err, VaymnError::CorruptEntry { .. }));
    }

    #[tokio::test]
    async fn test_put_entries_and_clear() {
        let db = Database::new_in_memory().await.unwrap();

        put_entries(
            db.pool(),
            &[
                ("vaymn_books", "[]".to_string()),
                ("vaymn_users", "[]".to_string()),
                ("vaymn_session", "null".to_string()),
            ],
        )
        .await
        .unwrap();

        let keys: Vec<String> = list_entries(db.pool())
            .await
            .unwrap()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec!["vaymn_books", "vaymn_session", "vaymn_users"]);

        assert_eq!(clear_entries(db.pool()).await.unwrap(), 3);
        assert!(list_entries(db.pool()).await.unwrap().is_empty());
    }
}
