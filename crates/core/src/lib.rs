//! Fundsync Core - source records, backend entities, store traits and the
//! incremental migration engine.
//!
//! This crate is database-agnostic. It defines the traits that the
//! `storage-sqlite` crate implements for the legacy source databases and for
//! the backend database, and drives them through the migration tasks.

pub mod backend;
pub mod constants;
pub mod errors;
pub mod migration;
pub mod source;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
