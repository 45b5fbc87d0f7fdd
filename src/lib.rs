//! VAYMN library core
//!
//! The persistence layer of the VAYMN library-management app: a local-first
//! mirror of the remote catalog (books), student accounts (users),
//! administrator accounts (admins) and the device-local session.
//!
//! Start from [`mirror::Mirror`]; build it once with [`mirror::Mirror::open`]
//! and hand it to whatever needs the data.

pub mod config;
pub mod error;
pub mod mirror;
pub mod remote;
pub mod seed;
pub mod storage;

pub use config::{MirrorConfig, RemoteConfig};
pub use error::{Result, VaymnError};
pub use mirror::{Collections, Mirror, Snapshot};
pub use storage::models::{Book, Role, User};
