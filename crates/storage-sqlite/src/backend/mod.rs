//! Backend repositories.
//!
//! Every store trait from `fundsync_core::backend` is implemented on
//! [`SqliteBackendSession`], so a task's reads and writes share its
//! transaction.

mod access;
mod ledger;
pub mod model;
mod rates;
mod reference;
mod session;

pub use session::{SqliteBackendSession, SqliteSessionFactory};
