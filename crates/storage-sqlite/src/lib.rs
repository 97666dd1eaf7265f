//! SQLite storage implementation for fundsync.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the store and source traits defined in `fundsync-core` and contains:
//! - Connection pooling for the backend (read-write) and legacy sources (read-only)
//! - Diesel migrations for the backend schema
//! - A transactional backend session implementing every store
//! - Raw SQL accessors for the legacy tables, with the shared exclusion rules
//!
//! # Architecture
//!
//! This crate is the only place in the workspace where Diesel dependencies exist.
//! The migration engine in `core` is database-agnostic and works with traits.
//!
//! ```text
//!   legacy replicas ──► source (read-only) ──┐
//!                                            ▼
//!                                 core (migration engine)
//!                                            │
//!                                            ▼
//!                      backend (SqliteBackendSession) ──► backend DB
//! ```

pub mod backend;
pub mod db;
pub mod errors;
mod rows;
pub mod schema;
pub mod source;
pub mod utils;

// Re-export database utilities
pub use db::{
    create_pool, create_source_pool, database_path, get_connection, init, run_migrations,
    DbConnection, DbPool,
};

pub use backend::{SqliteBackendSession, SqliteSessionFactory};
pub use source::{SqliteAuthorizationSource, SqliteFundsSource, SqliteKiidSource};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from fundsync-core for convenience
pub use fundsync_core::errors::{DatabaseError, Error, Result};
