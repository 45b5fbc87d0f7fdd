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


//! Database migrations
//!
//! Schema creation for the local mirror. Migrations are plain runtime SQL so
//! no database connection is needed at build time.
//!
//! # Schema
//! The mirror is a small key/value table. Each collection (and the session)
//! lives under its own key as one serialized JSON document, so a collection
//! is always replaced as a whole.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

/// Run all database migrations
///
/// Migrations are tracked in the `_migrations` table.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;

    run_migration(pool, 1, "mirror_entries", create_mirror_entries(pool)).await?;

    Ok(())
}

/// Create migrations tracking table
async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run a single migration if it hasn't been applied yet
async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    tracing::debug!(migration = name, "applied migration");
    Ok(())
}

async fn create_mirror_entries(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
-- One row per local key: vaymn_books, vaymn_users, vaymn_admins, vaymn_session
CREATE TABLE IF NOT EXISTS MirrorEntries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,           -- serialized JSON document
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
        "#,
    )
    .await?;

    Ok(())
}
