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


//! Persistence mirror
//!
//! Owns every read and write of the three collections (books, users, admins)
//! and the session singleton. Callers get the same API whether or not a
//! remote store is configured or reachable.
//!
//! # Consistency policy
//! Last-write-wins, biased towards the remote on reads:
//! - A successful remote read overwrites the local copy (remote wins).
//! - A write lands locally first and stays there even if the remote write
//!   fails; the next successful read reconciles the two.
//! - Edits made concurrently on two devices can silently drop one of them.
//!
//! # Write serialization
//! Each collection has a single-slot lock. A mutation holds it across its
//! read-modify-write and the local write, so concurrent writers queue
//! instead of overwriting each other. The slot is released before the
//! remote write: a slow or hung remote never holds up local reads and
//! writes. The slot also counts local writes; a read refresh only
//! overwrites the local copy when no write landed while its remote fetch
//! was in flight.
//!
//! # Failure semantics
//! Remote failures are logged at `warn` and swallowed. Local storage
//! failures propagate, since there is nothing beneath the local tier.
//!
//! # Usage Example
//! ```no_run
//! use std::sync::Arc;
//! use vaymn_core::mirror::Mirror;
//! use vaymn_core::remote::MemoryRemote;
//! use vaymn_core::storage::Database;
//!
//! # async fn example() -> vaymn_core::error::Result<()> {
//! let db = Database::new("./mirror.db").await?;
//! let mirror = Mirror::new(db, Some(Arc::new(MemoryRemote::new())));
//!
//! mirror.seed_if_empty().await;
//! let books = mirror.get_books().await;
//! println!("{} books on the shelves", books.len());
//! # Ok(())
//! # }
//! ```

pub mod circulation;
pub mod session;
pub mod snapshot;

pub use snapshot::{Collections, Snapshot, BACKUP_FILE_NAME};

use crate::config::MirrorConfig;
use crate::error::{Result, VaymnError};
use crate::remote::{PostgrestClient, RemoteStore, Table};
use crate::seed;
use crate::storage::models::{Book, Record, User};
use crate::storage::{queries, Database};
use chrono::Utc;
use futures_util::future::join3;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Local key of the session singleton
pub const SESSION_KEY: &str = "vaymn_session";

/// A mirrored collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Books,
    Users,
    Admins,
}

impl Collection {
    /// Local storage key
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Books => "vaymn_books",
            Collection::Users => "vaymn_users",
            Collection::Admins => "vaymn_admins",
        }
    }

    pub fn table(&self) -> Table {
        match self {
            Collection::Books => Table::Books,
            Collection::Users => Table::Users,
            Collection::Admins => Table::Admins,
        }
    }
}

/// Guards for all three collection slots, taken in a fixed order
type AllSlots<'a> = (MutexGuard<'a, u64>, MutexGuard<'a, u64>, MutexGuard<'a, u64>);

/// Persistence mirror service
///
/// Build one per application and share it by reference (or `Arc`).
#[derive(Debug)]
pub struct Mirror {
    db: Database,
    remote: Option<Arc<dyn RemoteStore>>,
    /// Write slots; the value is the number of local writes so far
    books: Mutex<u64>,
    users: Mutex<u64>,
    admins: Mutex<u64>,
    session: Mutex<()>,
}

impl Mirror {
    /// Mirror over `db`, optionally backed by `remote`
    pub fn new(db: Database, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            db,
            remote,
            books: Mutex::new(0),
            users: Mutex::new(0),
            admins: Mutex::new(0),
            session: Mutex::new(()),
        }
    }

    /// Mirror with no remote store; the local copy is the only copy
    pub fn local_only(db: Database) -> Self {
        Self::new(db, None)
    }

    /// Open the database and remote client described by `config`
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or the HTTP client
    /// cannot be built. An unreachable remote is not an error.
    pub async fn open(config: &MirrorConfig) -> Result<Self> {
        let db = Database::new(&config.database_path).await?;

        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote {
            Some(remote) => Some(Arc::new(PostgrestClient::new(remote, config.request_timeout)?)),
            None => None,
        };

        info!(
            database = %config.database_path.display(),
            cloud = remote.is_some(),
            "persistence mirror ready"
        );
        Ok(Self::new(db, remote))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Whether a remote store is configured
    ///
    /// Reports configuration only; reachability is discovered by the next
    /// read or write.
    pub fn is_cloud_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// Probe the remote store with a one-row read
    pub async fn test_cloud_connection(&self) -> bool {
        let Some(remote) = &self.remote else {
            return false;
        };

        match remote.probe(Table::Books).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "cloud connection probe failed");
                false
            }
        }
    }

    // ========================================================================
    // SEEDING
    // ========================================================================

    /// Populate an empty remote store with the bootstrap data set
    ///
    /// No-op without a remote store, when the remote `books` table already
    /// has rows, or when the remote cannot be reached.
    pub async fn seed_if_empty(&self) {
        let Some(remote) = &self.remote else {
            return;
        };

        match remote.count(Table::Books).await {
            Ok(0) => {
                let (books, users, admins) = match bootstrap_rows() {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "could not serialize bootstrap data, seeding skipped");
                        return;
                    }
                };

                let results = join3(
                    remote.insert(Table::Books, books),
                    remote.insert(Table::Users, users),
                    remote.insert(Table::Admins, admins),
                )
                .await;

                log_remote_batch("seed", results);
                info!("seeded remote store with bootstrap data");
            }
            Ok(rows) => debug!(rows, "remote catalog already populated"),
            Err(e) => warn!(error = %e, "database seeding skipped, remote tables unavailable"),
        }
    }

    /// Unconditionally repopulate both stores with the bootstrap data set
    ///
    /// The local write is atomic across the three collections and must
    /// succeed; the remote upserts are best-effort.
    pub async fn force_seed(&self) -> Result<Collections> {
        let collections = Collections {
            books: seed::bootstrap_books(),
            users: seed::bootstrap_users(),
            admins: seed::bootstrap_admins(),
        };

        let mut slots = self.lock_all().await;
        self.write_local_set(&collections, &mut slots).await?;
        drop(slots);

        if let Some(remote) = &self.remote {
            let (books, users, admins) = bootstrap_rows()?;
            let results = join3(
                remote.upsert(Table::Books, books),
                remote.upsert(Table::Users, users),
                remote.upsert(Table::Admins, admins),
            )
            .await;
            log_remote_batch("force seed", results);
        }

        info!("force-seeded local mirror");
        Ok(collections)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub async fn get_books(&self) -> Vec<Book> {
        self.read_collection(Collection::Books, seed::bootstrap_books).await
    }

    pub async fn get_users(&self) -> Vec<User> {
        self.read_collection(Collection::Users, seed::bootstrap_users).await
    }

    pub async fn get_admins(&self) -> Vec<User> {
        self.read_collection(Collection::Admins, seed::bootstrap_admins).await
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub async fn update_book(&self, book: Book) -> Result<()> {
        self.upsert_record(Collection::Books, seed::bootstrap_books, book).await
    }

    pub async fn update_user(&self, user: User) -> Result<()> {
        self.upsert_record(Collection::Users, seed::bootstrap_users, user).await
    }

    pub async fn update_admin(&self, admin: User) -> Result<()> {
        self.upsert_record(Collection::Admins, seed::bootstrap_admins, admin).await
    }

    pub async fn delete_book(&self, id: &str) -> Result<()> {
        self.delete_record::<Book>(Collection::Books, seed::bootstrap_books, id).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        self.delete_record::<User>(Collection::Users, seed::bootstrap_users, id).await
    }

    pub async fn delete_admin(&self, id: &str) -> Result<()> {
        self.delete_record::<User>(Collection::Admins, seed::bootstrap_admins, id).await
    }

    /// Replace the whole local catalog, then push it in one remote upsert
    pub async fn save_all_books(&self, books: Vec<Book>) -> Result<()> {
        let rows = to_rows(&books)?;

        {
            let mut generation = self.slot(Collection::Books).lock().await;
            queries::put_json(self.db.pool(), Collection::Books.key(), &books).await?;
            *generation += 1;
        }

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.upsert(Table::Books, rows).await {
                warn!(table = %Table::Books, error = %e, "remote bulk upsert failed, keeping local copy");
            }
        }
        Ok(())
    }

    // ========================================================================
    // EXPORT / IMPORT / RESET
    // ========================================================================

    /// Current collections (read remote-first) with a timestamp
    pub async fn export_snapshot(&self) -> Snapshot {
        Snapshot {
            books: self.get_books().await,
            users: self.get_users().await,
            admins: self.get_admins().await,
            timestamp: Utc::now(),
        }
    }

    /// Write a snapshot to `dir`/[`BACKUP_FILE_NAME`] and return its path
    pub async fn export_full_database<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let snapshot = self.export_snapshot().await;
        let path = dir.as_ref().join(BACKUP_FILE_NAME);

        let body = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&path, body).await.map_err(|e| {
            VaymnError::FileIoError(format!("Failed to write backup {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), books = snapshot.books.len(), "exported database");
        Ok(path)
    }

    /// Replace all three local collections with a serialized snapshot
    ///
    /// Returns `Ok(false)` and writes nothing when the payload is malformed
    /// or has no `books` collection. Missing `users`/`admins` import as
    /// empty. Only the local mirror is written.
    pub async fn import_database(&self, content: &str) -> Result<bool> {
        let collections = match Snapshot::parse_collections(content) {
            Ok(collections) => collections,
            Err(reason) => {
                warn!(%reason, "rejected database import");
                return Ok(false);
            }
        };

        let mut slots = self.lock_all().await;
        self.write_local_set(&collections, &mut slots).await?;

        info!(
            books = collections.books.len(),
            users = collections.users.len(),
            admins = collections.admins.len(),
            "imported database"
        );
        Ok(true)
    }

    /// Clear all local state, session included
    pub async fn factory_reset(&self) -> Result<()> {
        let (mut books, mut users, mut admins) = self.lock_all().await;
        let _session = self.session.lock().await;

        let removed = queries::clear_entries(self.db.pool()).await?;
        *books += 1;
        *users += 1;
        *admins += 1;

        info!(removed, "factory reset cleared local mirror");
        Ok(())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn slot(&self, collection: Collection) -> &Mutex<u64> {
        match collection {
            Collection::Books => &self.books,
            Collection::Users => &self.users,
            Collection::Admins => &self.admins,
        }
    }

    async fn lock_all(&self) -> AllSlots<'_> {
        let books = self.books.lock().await;
        let users = self.users.lock().await;
        let admins = self.admins.lock().await;
        (books, users, admins)
    }

    /// Store all three collections in one transaction
    async fn write_local_set(&self, collections: &Collections, slots: &mut AllSlots<'_>) -> Result<()> {
        queries::put_entries(
            self.db.pool(),
            &[
                (Collection::Books.key(), serde_json::to_string(&collections.books)?),
                (Collection::Users.key(), serde_json::to_string(&collections.users)?),
                (Collection::Admins.key(), serde_json::to_string(&collections.admins)?),
            ],
        )
        .await?;

        *slots.0 += 1;
        *slots.1 += 1;
        *slots.2 += 1;
        Ok(())
    }

    /// Remote first, then local, then bootstrap; never fails
    async fn read_collection<T: Record>(
        &self,
        collection: Collection,
        bootstrap: fn() -> Vec<T>,
    ) -> Vec<T> {
        if let Some(remote) = &self.remote {
            let seen = *self.slot(collection).lock().await;

            match fetch_remote::<T>(&**remote, collection.table()).await {
                Ok(rows) => return self.refresh_local(collection, seen, rows, bootstrap).await,
                Err(e) => {
                    warn!(table = %collection.table(), error = %e, "remote read failed, serving local mirror")
                }
            }
        }

        match self.load_local::<T>(collection).await {
            Ok(Some(rows)) => rows,
            Ok(None) => bootstrap(),
            Err(e) => {
                warn!(key = collection.key(), error = %e, "local mirror unreadable, serving bootstrap data");
                bootstrap()
            }
        }
    }

    /// Overwrite the local copy with freshly fetched rows
    ///
    /// Skipped when a local write happened after `seen` was taken; the
    /// newer local copy is returned instead.
    async fn refresh_local<T: Record>(
        &self,
        collection: Collection,
        seen: u64,
        rows: Vec<T>,
        bootstrap: fn() -> Vec<T>,
    ) -> Vec<T> {
        let generation = self.slot(collection).lock().await;

        if *generation != seen {
            drop(generation);
            debug!(key = collection.key(), "local write landed during remote read, keeping local copy");
            return match self.load_local::<T>(collection).await {
                Ok(Some(local)) => local,
                Ok(None) => bootstrap(),
                Err(_) => rows,
            };
        }

        if let Err(e) = queries::put_json(self.db.pool(), collection.key(), &rows).await {
            warn!(key = collection.key(), error = %e, "could not refresh local mirror");
        }
        rows
    }

    async fn load_local<T: Record>(&self, collection: Collection) -> Result<Option<Vec<T>>> {
        queries::get_json(self.db.pool(), collection.key()).await
    }

    /// Local rows for a read-modify-write; never-populated means bootstrap
    async fn load_for_write<T: Record>(
        &self,
        collection: Collection,
        bootstrap: fn() -> Vec<T>,
    ) -> Result<Vec<T>> {
        Ok(self.load_local(collection).await?.unwrap_or_else(bootstrap))
    }

    async fn upsert_record<T: Record>(
        &self,
        collection: Collection,
        bootstrap: fn() -> Vec<T>,
        record: T,
    ) -> Result<()> {
        self.modify_record(collection, bootstrap, record.id().to_string(), |slot| {
            *slot = Some(record);
            Ok(())
        })
        .await
        .map(|_| ())
    }

    async fn delete_record<T: Record>(
        &self,
        collection: Collection,
        bootstrap: fn() -> Vec<T>,
        id: &str,
    ) -> Result<()> {
        let mut generation = self.slot(collection).lock().await;

        let mut rows = self.load_for_write(collection, bootstrap).await?;
        rows.retain(|r| r.id() != id);
        queries::put_json(self.db.pool(), collection.key(), &rows).await?;
        *generation += 1;
        drop(generation);

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(collection.table(), id).await {
                warn!(table = %collection.table(), id, error = %e, "remote delete failed, keeping local copy");
            }
        }
        Ok(())
    }

    /// Read-modify-write of one record under the collection's write slot
    ///
    /// `change` receives the current row (or `None`) and leaves the row to
    /// store in its place; leaving `None` is an error. The stored row is
    /// appended when it did not exist, replaced in place otherwise, and then
    /// pushed to the remote store best-effort once the slot is released.
    pub(crate) async fn modify_record<T, F>(
        &self,
        collection: Collection,
        bootstrap: fn() -> Vec<T>,
        id: String,
        change: F,
    ) -> Result<T>
    where
        T: Record,
        F: FnOnce(&mut Option<T>) -> Result<()>,
    {
        let mut generation = self.slot(collection).lock().await;

        let mut rows = self.load_for_write(collection, bootstrap).await?;
        let position = rows.iter().position(|r| r.id() == id);

        let mut current = position.map(|i| rows[i].clone());
        change(&mut current)?;
        let updated = current.ok_or_else(|| VaymnError::not_found(format!("{} {}", collection.table(), id)))?;
        let row = serde_json::to_value(&updated)?;

        match position {
            Some(i) => rows[i] = updated.clone(),
            None => rows.push(updated.clone()),
        }
        queries::put_json(self.db.pool(), collection.key(), &rows).await?;
        *generation += 1;
        drop(generation);

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.upsert(collection.table(), vec![row]).await {
                warn!(table = %collection.table(), id = %id, error = %e, "remote upsert failed, keeping local copy");
            }
        }
        Ok(updated)
    }
}

async fn fetch_remote<T: Record>(remote: &dyn RemoteStore, table: Table) -> Result<Vec<T>> {
    let rows = remote.select_ordered(table).await?;
    serde_json::from_value(Value::Array(rows)).map_err(|e| VaymnError::InvalidRemoteResponse {
        message: format!("{} rows do not match the local model: {}", table, e),
        response_body: None,
    })
}

fn to_rows<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|r| serde_json::to_value(r).map_err(VaymnError::from))
        .collect()
}

fn bootstrap_rows() -> Result<(Vec<Value>, Vec<Value>, Vec<Value>)> {
    Ok((
        to_rows(&seed::bootstrap_books())?,
        to_rows(&seed::bootstrap_users())?,
        to_rows(&seed::bootstrap_admins())?,
    ))
}

fn log_remote_batch(operation: &str, results: (Result<()>, Result<()>, Result<()>)) {
    let (books, users, admins) = results;
    for (table, result) in [(Table::Books, books), (Table::Users, users), (Table::Admins, admins)] {
        if let Err(e) = result {
            warn!(%table, operation, error = %e, "remote batch write failed");
        }
    }
}
