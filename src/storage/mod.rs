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


//! Local storage tier
//!
//! The on-device copy of every collection, kept in SQLite with sqlx.
//!
//! # Layout
//! Four independent keys, each holding one JSON document:
//! - `vaymn_books`: array of books
//! - `vaymn_users`: array of student accounts
//! - `vaymn_admins`: array of administrator accounts
//! - `vaymn_session`: the signed-in account, or `null`
//!
//! # Usage Example
//! ```no_run
//! use vaymn_core::storage::{queries, Database};
//!
//! # async fn example() -> vaymn_core::error::Result<()> {
//! let db = Database::new("./mirror.db").await?;
//! queries::put_entry(db.pool(), "vaymn_books", "[]").await?;
//! let raw = queries::get_entry(db.pool(), "vaymn_books").await?;
//! assert_eq!(raw.as_deref(), Some("[]"));
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::{Book, Record, Role, User, LOAN_PERIOD_DAYS};
