//! Full-database snapshots
//!
//! The backup document is `{books, users, admins, timestamp}`. Imports only
//! insist on `books`; the account collections default to empty.

use crate::storage::models::{Book, User};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File name used by [`crate::mirror::Mirror::export_full_database`]
pub const BACKUP_FILE_NAME: &str = "vaymn_backup.json";

/// The three collections as one set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    pub books: Vec<Book>,
    pub users: Vec<User>,
    pub admins: Vec<User>,
}

/// Exported backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub books: Vec<Book>,
    pub users: Vec<User>,
    pub admins: Vec<User>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn into_collections(self) -> Collections {
        Collections {
            books: self.books,
            users: self.users,
            admins: self.admins,
        }
    }

    /// Validate an import payload
    ///
    /// Accepts any JSON object with a non-null `books` array; `timestamp` is
    /// not required. Returns the reason on rejection.
    pub fn parse_collections(content: &str) -> std::result::Result<Collections, String> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| format!("not valid JSON: {}", e))?;
        let object = value
            .as_object()
            .ok_or_else(|| "snapshot is not a JSON object".to_string())?;

        let books = match object.get("books") {
            None | Some(Value::Null) => return Err("snapshot has no books collection".to_string()),
            Some(books) => decode::<Book>("books", books)?,
        };

        Ok(Collections {
            books,
            users: optional_collection(object, "users")?,
            admins: optional_collection(object, "admins")?,
        })
    }
}

fn optional_collection<T: DeserializeOwned>(
    object: &Map<String, Value>,
    name: &str,
) -> std::result::Result<Vec<T>, String> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => decode(name, value),
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> std::result::Result<Vec<T>, String> {
    Vec::<T>::deserialize(value).map_err(|e| format!("{} collection is malformed: {}", name, e))
}
