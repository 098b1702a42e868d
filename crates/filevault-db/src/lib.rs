//! Filevault metadata persistence
//!
//! Repository traits for file and share-link metadata, with a PostgreSQL implementation
//! (sqlx) and an in-process implementation used by tests and single-process tools.

pub mod db;

pub use db::{
    connect, run_migrations, FileRepository, InMemoryDatabase, InMemoryFileRepository,
    InMemoryShareLinkRepository, PostgresFileRepository, PostgresShareLinkRepository,
    ShareLinkRepository,
};
