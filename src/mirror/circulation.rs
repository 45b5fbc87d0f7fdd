//! Loans and waitlists
//!
//! Each operation is a single read-modify-write of one book under the
//! books write slot, pushed to the remote store like any other update.

use super::{Collection, Mirror};
use crate::error::{Result, VaymnError};
use crate::seed;
use crate::storage::models::{Book, User};
use chrono::Utc;
use tracing::info;

impl Mirror {
    /// Check `book_id` out to `borrower`
    ///
    /// # Errors
    /// `RecordNotFound` for unknown ids, `InvalidState` if the book is out.
    pub async fn issue_book(&self, book_id: &str, borrower: &User) -> Result<Book> {
        let book = self
            .change_book(book_id, |book| book.issue_to(&borrower.library_id, Utc::now()))
            .await?;

        info!(book = %book.title, library_id = %borrower.library_id, "book issued");
        Ok(book)
    }

    /// Put `book_id` back on the shelf
    pub async fn return_book(&self, book_id: &str) -> Result<Book> {
        let book = self
            .change_book(book_id, |book| {
                book.mark_returned();
                Ok(())
            })
            .await?;

        if let Some(next) = book.next_in_waitlist() {
            info!(book = %book.title, next, "book returned, waitlist pending");
        }
        Ok(book)
    }

    /// Queue `reader` for `book_id`
    pub async fn join_waitlist(&self, book_id: &str, reader: &User) -> Result<Book> {
        self.change_book(book_id, |book| book.join_waitlist(&reader.library_id))
            .await
    }

    async fn change_book<F>(&self, book_id: &str, change: F) -> Result<Book>
    where
        F: FnOnce(&mut Book) -> Result<()>,
    {
        self.modify_record(
            Collection::Books,
            seed::bootstrap_books,
            book_id.to_string(),
            |slot| match slot.as_mut() {
                Some(book) => change(book),
                None => Err(VaymnError::not_found(format!("book {}", book_id))),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, Table};
    use crate::storage::models::Role;
    use crate::storage::Database;
    use std::sync::Arc;

    fn reader(library_id: &str) -> User {
        User::new("Reader", library_id, "pw", "r@vaymn.edu", Role::User)
    }

    #[tokio::test]
    async fn test_issue_then_return_round_trip() {
        let mirror = Mirror::local_only(Database::new_in_memory().await.unwrap());
        let before = mirror.get_books().await;

        let issued = mirror.issue_book("bk-004", &reader("VAY-1001")).await.unwrap();
        assert!(!issued.is_available);
        assert!(issued.is_consistent());

        let returned = mirror.return_book("bk-004").await.unwrap();
        let original = before.iter().find(|b| b.id == "bk-004").unwrap();
        assert_eq!(&returned, original);
        assert_eq!(mirror.get_books().await, before);
    }

    #[tokio::test]
    async fn test_issue_unknown_or_taken_book() {
        let mirror = Mirror::local_only(Database::new_in_memory().await.unwrap());

        let err = mirror.issue_book("missing", &reader("VAY-1")).await.unwrap_err();
        assert!(matches!(err, VaymnError::RecordNotFound(_)));

        mirror.issue_book("bk-001", &reader("VAY-1")).await.unwrap();
        let err = mirror.issue_book("bk-001", &reader("VAY-2")).await.unwrap_err();
        assert!(matches!(err, VaymnError::InvalidState(_)));

        // The failed attempt left the collection length alone
        assert_eq!(mirror.get_books().await.len(), seed::bootstrap_books().len());
    }

    #[tokio::test]
    async fn test_waitlist_reaches_remote() {
        let remote = Arc::new(MemoryRemote::new());
        let mirror = Mirror::new(Database::new_in_memory().await.unwrap(), Some(remote.clone()));
        mirror.force_seed().await.unwrap();

        mirror.issue_book("bk-002", &reader("VAY-1")).await.unwrap();
        mirror.join_waitlist("bk-002", &reader("VAY-2")).await.unwrap();

        let row = remote
            .rows(Table::Books)
            .into_iter()
            .find(|r| r["id"] == "bk-002")
            .unwrap();
        assert_eq!(row["issuedTo"], "VAY-1");
        assert_eq!(row["waitlist"][0], "VAY-2");

        let returned = mirror.return_book("bk-002").await.unwrap();
        assert_eq!(returned.next_in_waitlist(), Some("VAY-2"));
    }
}
