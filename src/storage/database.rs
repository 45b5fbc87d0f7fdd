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


//! Local mirror database
//!
//! One SQLite file per device, opened in WAL mode so a read refresh and a
//! queued write on different collections do not serialize on the file.
//! The schema is applied on every open.

use crate::error::{Result, VaymnError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// File name of the mirror inside the platform data directory
const DATABASE_FILE: &str = "mirror.db";

/// Handle to the local mirror; cheap to clone
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the mirror at `database_path`
    ///
    /// # Errors
    /// Returns error if the parent directory cannot be created, the file
    /// cannot be opened, or the schema cannot be applied
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    VaymnError::FileIoError(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
            _ => {}
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::debug!(path = %path.display(), "opened local mirror database");
        Ok(db)
    }

    /// Private in-memory mirror, used by tests and throwaway sessions
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.disable_statement_logging();

        // Each :memory: connection is a separate database; pin the pool to one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| VaymnError::MigrationFailed(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// `VAYMN/mirror.db` under the platform's per-user data directory,
    /// or `./mirror.db` when none can be determined
    pub fn get_default_path() -> PathBuf {
        let data_dir = if cfg!(target_os = "windows") {
            std::env::var_os("APPDATA").map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join("Library").join("Application Support"))
        } else if cfg!(target_os = "linux") {
            std::env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        } else {
            None
        };

        match data_dir {
            Some(dir) => dir.join("VAYMN").join(DATABASE_FILE),
            None => PathBuf::from(".").join(DATABASE_FILE),
        }
    }

    /// `PRAGMA integrity_check` reports `ok`
    pub async fn check_integrity(&self) -> Result<bool> {
        let verdict: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;
        Ok(verdict == "ok")
    }
}
