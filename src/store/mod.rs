//! Persisted implementations of the `Store` port: small enough to fit
//! in a local single-file database.

pub mod sqlite;

pub use sqlite::SqliteStore;
