//! Entity models for VAYMN
//!
//! Books, users and admins as they are stored in the local mirror and in the
//! remote tables. Field names serialize in camelCase because that is the
//! column naming of the remote tables; absent optional fields are omitted.
//!
//! # Storage adaptations
//! - Waitlists and badges are JSON arrays
//! - Timestamps are RFC 3339 strings
//! - Roles are the upper-case tags `USER` / `ADMIN`

use crate::error::{Result, VaymnError};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Length of a loan in days
pub const LOAN_PERIOD_DAYS: i64 = 7;

/// A row in one of the mirrored collections
///
/// Identity is the opaque `id`; upserts and deletes match on it.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

// ============================================================================
// ENUMS
// ============================================================================

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A physical book in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    /// URL or data-URI
    #[serde(default)]
    pub cover_image: String,
    /// Shelf location
    #[serde(default)]
    pub stand_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
    pub is_available: bool,
    /// Borrower's `libraryId` (not the user's `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_date: Option<DateTime<Utc>>,
    /// FIFO queue of `libraryId`s
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist: Option<Vec<String>>,
}

impl Book {
    /// New available book with a freshly generated id
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
        stand_number: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
            cover_image: String::new(),
            stand_number: stand_number.into(),
            description: None,
            trailer_url: None,
            is_available: true,
            issued_to: None,
            issued_date: None,
            waitlist: None,
        }
    }

    /// `isAvailable == false` iff `issuedTo` is set, and an available book
    /// carries no issue date.
    pub fn is_consistent(&self) -> bool {
        if self.is_available {
            self.issued_to.is_none() && self.issued_date.is_none()
        } else {
            self.issued_to.is_some()
        }
    }

    /// Check the book out to `library_id`
    ///
    /// The borrower is dropped from the waitlist if they were queued.
    ///
    /// # Errors
    /// `InvalidState` if the book is already out.
    pub fn issue_to(&mut self, library_id: &str, now: DateTime<Utc>) -> Result<()> {
        if !self.is_available {
            return Err(VaymnError::invalid_state(format!(
                "'{}' is already issued",
                self.title
            )));
        }

        self.is_available = false;
        self.issued_to = Some(library_id.to_string());
        self.issued_date = Some(now);
        self.leave_waitlist(library_id);
        Ok(())
    }

    /// Return the book to the shelf
    pub fn mark_returned(&mut self) {
        self.is_available = true;
        self.issued_to = None;
        self.issued_date = None;
    }

    /// Queue `library_id` for the book; joining twice keeps a single entry
    ///
    /// # Errors
    /// `InvalidState` if `library_id` is the current borrower.
    pub fn join_waitlist(&mut self, library_id: &str) -> Result<()> {
        if self.issued_to.as_deref() == Some(library_id) {
            return Err(VaymnError::invalid_state(format!(
                "'{}' is already issued to {}",
                self.title, library_id
            )));
        }

        let queue = self.waitlist.get_or_insert_with(Vec::new);
        if !queue.iter().any(|entry| entry == library_id) {
            queue.push(library_id.to_string());
        }
        Ok(())
    }

    pub fn leave_waitlist(&mut self, library_id: &str) {
        if let Some(queue) = self.waitlist.as_mut() {
            queue.retain(|entry| entry != library_id);
            if queue.is_empty() {
                self.waitlist = None;
            }
        }
    }

    pub fn next_in_waitlist(&self) -> Option<&str> {
        self.waitlist
            .as_ref()
            .and_then(|queue| queue.first())
            .map(String::as_str)
    }

    /// Whole days left on the loan, rounded up and never negative
    ///
    /// Returns 0 for books that are not issued.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let Some(issued) = self.issued_date else {
            return 0;
        };

        let deadline = issued + Duration::days(LOAN_PERIOD_DAYS);
        let remaining_secs = (deadline - now).num_seconds();
        if remaining_secs <= 0 {
            return 0;
        }
        (remaining_secs + 86_399) / 86_400
    }
}

impl Record for Book {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A student or administrator account
///
/// Admins and students share this shape; which collection a record lives in
/// decides how it is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Human-facing identifier used for login and loans
    pub library_id: String,
    /// Stored in plaintext
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badges: Option<BTreeSet<String>>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        library_id: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            library_id: library_id.into(),
            password: password.into(),
            email: email.into(),
            role,
            xp: None,
            badges: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Plain comparison against the stored password
    pub fn matches_credentials(&self, library_id: &str, password: &str) -> bool {
        self.library_id == library_id && self.password == password
    }
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_book() -> Book {
        let mut book = Book::new("Dune", "Frank Herbert", "Sci-Fi", "A-12");
        book.id = "b1".to_string();
        book
    }

    #[test]
    fn test_book_serializes_camel_case_and_skips_absent_fields() {
        let json = serde_json::to_value(sample_book()).unwrap();
        assert_eq!(json["standNumber"], "A-12");
        assert_eq!(json["isAvailable"], true);
        assert!(json.get("issuedTo").is_none());
        assert!(json.get("waitlist").is_none());
    }

    #[test]
    fn test_book_parses_minimal_row() {
        let book: Book = serde_json::from_str(
            r#"{"id":"b9","title":"Emma","author":"Austen","genre":"Classic","isAvailable":false,"issuedTo":"LIB-1"}"#,
        )
        .unwrap();
        assert_eq!(book.cover_image, "");
        assert_eq!(book.issued_to.as_deref(), Some("LIB-1"));
        assert!(book.is_consistent());
    }

    #[test]
    fn test_issue_and_return_restore_availability() {
        let original = sample_book();
        let mut book = original.clone();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();

        book.issue_to("LIB-7", now).unwrap();
        assert!(!book.is_available);
        assert!(book.is_consistent());

        book.mark_returned();
        assert_eq!(book, original);
    }

    #[test]
    fn test_issue_twice_fails() {
        let mut book = sample_book();
        book.issue_to("LIB-7", Utc::now()).unwrap();
        let err = book.issue_to("LIB-8", Utc::now()).unwrap_err();
        assert!(matches!(err, VaymnError::InvalidState(_)));
        assert_eq!(book.issued_to.as_deref(), Some("LIB-7"));
    }

    #[test]
    fn test_waitlist_is_fifo_without_duplicates() {
        let mut book = sample_book();
        book.issue_to("LIB-1", Utc::now()).unwrap();
        book.join_waitlist("LIB-2").unwrap();
        book.join_waitlist("LIB-3").unwrap();
        book.join_waitlist("LIB-2").unwrap();
        assert_eq!(book.waitlist.as_ref().unwrap().len(), 2);
        assert_eq!(book.next_in_waitlist(), Some("LIB-2"));

        assert!(book.join_waitlist("LIB-1").is_err());

        book.mark_returned();
        book.issue_to("LIB-2", Utc::now()).unwrap();
        assert_eq!(book.next_in_waitlist(), Some("LIB-3"));

        book.leave_waitlist("LIB-3");
        assert!(book.waitlist.is_none());
    }

    #[test]
    fn test_days_remaining() {
        let issued = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut book = sample_book();
        assert_eq!(book.days_remaining(issued), 0);

        book.issue_to("LIB-1", issued).unwrap();
        assert_eq!(book.days_remaining(issued), 7);
        assert_eq!(book.days_remaining(issued + Duration::hours(30)), 6);
        assert_eq!(book.days_remaining(issued + Duration::days(9)), 0);
    }

    #[test]
    fn test_user_role_wire_format() {
        let admin = User::new("Ada", "ADM-1", "pw", "ada@vaymn.edu", Role::Admin);
        let json = serde_json::to_value(&admin).unwrap();
        assert_eq!(json["role"], "ADMIN");
        assert_eq!(json["libraryId"], "ADM-1");
        assert!(admin.matches_credentials("ADM-1", "pw"));
        assert!(!admin.matches_credentials("ADM-1", "PW"));
    }
}
