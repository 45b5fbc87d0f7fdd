//! Bootstrap data set
//!
//! The default catalog and accounts used when no data exists anywhere:
//! seeded into an empty remote store, and served by reads when the local
//! mirror has never been populated. Ids are fixed so reseeding converges on
//! the same rows instead of duplicating them.

use crate::storage::models::{Book, Role, User};
use std::collections::BTreeSet;

fn book(id: &str, title: &str, author: &str, genre: &str, stand: &str, description: &str) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        genre: genre.to_string(),
        cover_image: format!("https://covers.vaymn.app/{}.jpg", id),
        stand_number: stand.to_string(),
        description: Some(description.to_string()),
        trailer_url: None,
        is_available: true,
        issued_to: None,
        issued_date: None,
        waitlist: None,
    }
}

fn account(id: &str, name: &str, library_id: &str, password: &str, email: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        library_id: library_id.to_string(),
        password: password.to_string(),
        email: email.to_string(),
        role,
        xp: None,
        badges: None,
    }
}

pub fn bootstrap_books() -> Vec<Book> {
    vec![
        book("bk-001", "1984", "George Orwell", "Dystopian", "A-01",
            "A totalitarian state watches every move of Winston Smith."),
        book("bk-002", "A Brief History of Time", "Stephen Hawking", "Science", "C-04",
            "From the Big Bang to black holes, for the general reader."),
        book("bk-003", "Clean Code", "Robert C. Martin", "Technology", "D-02",
            "Practices for writing readable, maintainable software."),
        book("bk-004", "Dune", "Frank Herbert", "Science Fiction", "A-07",
            "Politics, religion and ecology on the desert planet Arrakis."),
        book("bk-005", "Pride and Prejudice", "Jane Austen", "Classic", "B-03",
            "Elizabeth Bennet and Mr. Darcy misjudge each other."),
        book("bk-006", "Sapiens", "Yuval Noah Harari", "History", "C-11",
            "A short history of humankind."),
        book("bk-007", "The Alchemist", "Paulo Coelho", "Fiction", "B-09",
            "A shepherd boy travels to Egypt in search of treasure."),
        book("bk-008", "The Pragmatic Programmer", "Andrew Hunt & David Thomas", "Technology", "D-05",
            "Advice for programmers on craft and career."),
    ]
}

pub fn bootstrap_users() -> Vec<User> {
    let mut reader = account("usr-001", "Aarav Sharma", "VAY-1001", "student123", "aarav@vaymn.edu", Role::User);
    reader.xp = Some(120);
    reader.badges = Some(BTreeSet::from(["first-loan".to_string()]));

    vec![
        reader,
        account("usr-002", "Meera Iyer", "VAY-1002", "student123", "meera@vaymn.edu", Role::User),
        account("usr-003", "Rohan Das", "VAY-1003", "student123", "rohan@vaymn.edu", Role::User),
    ]
}

pub fn bootstrap_admins() -> Vec<User> {
    vec![account(
        "adm-001",
        "Head Librarian",
        "ADMIN-01",
        "admin123",
        "librarian@vaymn.edu",
        Role::Admin,
    )]
}
