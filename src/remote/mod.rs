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


//! Remote store tier
//!
//! The authoritative, network-hosted copy of the three collections. Rows
//! cross this boundary as JSON objects keyed by `id`; the mirror does the
//! typed (de)serialization.
//!
//! Two backends:
//! - [`PostgrestClient`]: a PostgREST/Supabase REST endpoint over HTTP
//! - [`MemoryRemote`]: an in-process store with a reachability switch

pub mod client;
pub mod memory;

pub use client::PostgrestClient;
pub use memory::MemoryRemote;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Remote tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Books,
    Users,
    Admins,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Books, Table::Users, Table::Admins];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Books => "books",
            Table::Users => "users",
            Table::Admins => "admins",
        }
    }

    /// Column reads are ordered by
    pub fn order_column(&self) -> &'static str {
        match self {
            Table::Books => "title",
            Table::Users | Table::Admins => "name",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the mirror needs from a remote store
///
/// Every method may fail; the mirror decides what a failure means.
#[async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// All rows, ascending by [`Table::order_column`]
    async fn select_ordered(&self, table: Table) -> Result<Vec<Value>>;

    /// Exact row count
    async fn count(&self, table: Table) -> Result<u64>;

    /// Plain insert; conflicts on `id` are errors
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<()>;

    /// Insert or replace by `id`
    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()>;

    /// Remove the row with this `id`; absent rows are not an error
    async fn delete(&self, table: Table, id: &str) -> Result<()>;

    /// Cheapest request that proves the table is reachable
    async fn probe(&self, table: Table) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_and_ordering() {
        assert_eq!(Table::Books.to_string(), "books");
        assert_eq!(Table::Books.order_column(), "title");
        assert_eq!(Table::Admins.order_column(), "name");
        assert_eq!(Table::ALL.len(), 3);
    }
}
