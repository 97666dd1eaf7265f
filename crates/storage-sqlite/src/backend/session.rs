//! Transactional backend session over one pooled connection.

use std::sync::Arc;

use diesel::connection::{Connection, TransactionManager};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};

use crate::db::{get_connection, DbConnection, DbPool};
use crate::errors::IntoCore;
use crate::rows::{ChecksumRow, CodeRow, StampRow};
use fundsync_core::backend::{BackendSession, SessionFactory};
use fundsync_core::errors::Result;
use fundsync_core::migration::{DatasetStamp, PartitionChecksum};

type Transactions = <SqliteConnection as Connection>::TransactionManager;

/// A [`BackendSession`] backed by SQLite.
///
/// The transaction is opened on creation and stays open until `commit` or
/// `rollback`. A session dropped while open is rolled back.
pub struct SqliteBackendSession {
    conn: DbConnection,
    open: bool,
}

impl SqliteBackendSession {
    pub fn begin(mut conn: DbConnection) -> Result<Self> {
        Transactions::begin_transaction(&mut *conn).into_core()?;
        Ok(Self { conn, open: true })
    }

    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub(crate) fn stamp_of(&mut self, table: &str) -> Result<DatasetStamp> {
        let row = diesel::sql_query(format!(
            "SELECT COUNT(*) AS row_count, MAX(updated) AS last_update FROM {}",
            table
        ))
        .get_result::<StampRow>(self.conn())
        .into_core()?;
        Ok(row.into())
    }

    pub(crate) fn codes_by_query(&mut self, sql: &str) -> Result<Vec<String>> {
        let rows = diesel::sql_query(sql)
            .load::<CodeRow>(self.conn())
            .into_core()?;
        Ok(rows.into_iter().map(|r| r.code).collect())
    }

    pub(crate) fn checksums_by_query(&mut self, sql: &str) -> Result<Vec<PartitionChecksum>> {
        let rows = diesel::sql_query(sql)
            .load::<ChecksumRow>(self.conn())
            .into_core()?;
        Ok(rows.into_iter().map(PartitionChecksum::from).collect())
    }

    /// Loads rows of a per-security report query binding the security code.
    pub(crate) fn load_for_security<R>(&mut self, sql: &str, security_code: &str) -> Result<Vec<R>>
    where
        R: QueryableByName<diesel::sqlite::Sqlite> + 'static,
    {
        diesel::sql_query(sql)
            .bind::<Text, _>(security_code)
            .load::<R>(self.conn())
            .into_core()
    }

    fn finish(&mut self, commit: bool) -> Result<()> {
        self.open = false;
        if commit {
            Transactions::commit_transaction(&mut *self.conn).into_core()
        } else {
            Transactions::rollback_transaction(&mut *self.conn).into_core()
        }
    }
}

impl BackendSession for SqliteBackendSession {
    fn checkpoint(&mut self) -> Result<()> {
        debug!("Checkpoint: committing and reopening the transaction");
        Transactions::commit_transaction(&mut *self.conn).into_core()?;
        Transactions::begin_transaction(&mut *self.conn).into_core()
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish(true)
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish(false)
    }
}

impl Drop for SqliteBackendSession {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = Transactions::rollback_transaction(&mut *self.conn) {
                warn!("Rollback of abandoned backend session failed: {}", e);
            }
        }
    }
}

/// Opens [`SqliteBackendSession`]s from the backend pool.
pub struct SqliteSessionFactory {
    pool: Arc<DbPool>,
}

impl SqliteSessionFactory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl SessionFactory for SqliteSessionFactory {
    fn begin(&self) -> Result<Box<dyn BackendSession>> {
        let conn = get_connection(&self.pool)?;
        Ok(Box::new(SqliteBackendSession::begin(conn)?))
    }
}
