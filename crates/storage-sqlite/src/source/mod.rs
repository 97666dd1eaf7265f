//! Read-only accessors for the legacy databases.
//!
//! Queries are raw SQL against the fixed legacy table names; every count,
//! list and page of a dataset goes through the same [`Dataset`] filter so
//! staleness checks and copies agree on which rows exist.

mod authorization;
mod funds;
mod kiid;
pub mod model;
pub mod schema;

pub use authorization::SqliteAuthorizationSource;
pub use funds::SqliteFundsSource;
pub use kiid::SqliteKiidSource;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Nullable, Text, Timestamp};
use diesel::sqlite::Sqlite;

use crate::db::{get_connection, DbPool};
use crate::errors::IntoCore;
use crate::rows::{ChecksumRow, CodeRow, NumberRow, StampRow};
use crate::utils::{chunk_for_sqlite, placeholders};
use fundsync_core::errors::Result;
use fundsync_core::migration::{DatasetStamp, PartitionChecksum};
use fundsync_core::source::Page;

type SourceQuery<'a> = BoxedSqlQuery<'a, Sqlite, SqlQuery>;

fn load<R>(pool: &DbPool, query: SourceQuery<'_>) -> Result<Vec<R>>
where
    R: QueryableByName<Sqlite> + 'static,
{
    let mut conn = get_connection(pool)?;
    query.load::<R>(&mut conn).into_core()
}

/// One legacy table as seen by the migration: its columns, natural key and
/// exclusion filter.
struct Dataset {
    table: &'static str,
    columns: &'static str,
    key: &'static str,
    filter: String,
}

impl Dataset {
    fn new(table: &'static str, columns: &'static str, key: &'static str) -> Self {
        Self {
            table,
            columns,
            key,
            filter: "1 = 1".to_string(),
        }
    }

    fn filtered(mut self, filter: String) -> Self {
        self.filter = filter;
        self
    }

    fn stamp(&self, pool: &DbPool) -> Result<DatasetStamp> {
        let sql = format!(
            "SELECT COUNT(*) AS row_count, MAX(UPDATED) AS last_update FROM {} WHERE {}",
            self.table, self.filter
        );
        let mut conn = get_connection(pool)?;
        let row = diesel::sql_query(sql)
            .get_result::<StampRow>(&mut conn)
            .into_core()?;
        Ok(row.into())
    }

    /// Rows updated at or after `since`, oldest first.
    fn page<R>(&self, pool: &DbPool, since: Option<NaiveDateTime>, page: Page) -> Result<Vec<R>>
    where
        R: QueryableByName<Sqlite> + 'static,
    {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} AND (? IS NULL OR UPDATED >= ?) \
             ORDER BY UPDATED, {} LIMIT ? OFFSET ?",
            self.columns, self.table, self.filter, self.key
        );
        let query = diesel::sql_query(sql)
            .into_boxed()
            .bind::<Nullable<Timestamp>, _>(since)
            .bind::<Nullable<Timestamp>, _>(since)
            .bind::<BigInt, _>(page.limit)
            .bind::<BigInt, _>(page.offset);
        load(pool, query)
    }

    fn codes(&self, pool: &DbPool) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT {k} AS code FROM {} WHERE {} ORDER BY {k}",
            self.table,
            self.filter,
            k = self.key
        );
        let rows: Vec<CodeRow> = load(pool, diesel::sql_query(sql).into_boxed())?;
        Ok(rows.into_iter().map(|r| r.code).collect())
    }

    fn numbers(&self, pool: &DbPool) -> Result<Vec<i64>> {
        let sql = format!(
            "SELECT {k} AS number FROM {} WHERE {} ORDER BY {k}",
            self.table,
            self.filter,
            k = self.key
        );
        let rows: Vec<NumberRow> = load(pool, diesel::sql_query(sql).into_boxed())?;
        Ok(rows.into_iter().map(|r| r.number).collect())
    }

    fn keyed_sql(&self, count: usize) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} AND {k} IN ({}) ORDER BY {k}",
            self.columns,
            self.table,
            self.filter,
            placeholders(count),
            k = self.key
        )
    }

    fn by_codes<R>(&self, pool: &DbPool, codes: &[String]) -> Result<Vec<R>>
    where
        R: QueryableByName<Sqlite> + 'static,
    {
        let mut rows = Vec::with_capacity(codes.len());
        for chunk in chunk_for_sqlite(codes) {
            let mut query = diesel::sql_query(self.keyed_sql(chunk.len())).into_boxed();
            for code in chunk {
                query = query.bind::<Text, _>(code.clone());
            }
            rows.extend(load::<R>(pool, query)?);
        }
        Ok(rows)
    }

    fn by_numbers<R>(&self, pool: &DbPool, numbers: &[i64]) -> Result<Vec<R>>
    where
        R: QueryableByName<Sqlite> + 'static,
    {
        let mut rows = Vec::with_capacity(numbers.len());
        for chunk in chunk_for_sqlite(numbers) {
            let mut query = diesel::sql_query(self.keyed_sql(chunk.len())).into_boxed();
            for number in chunk {
                query = query.bind::<BigInt, _>(*number);
            }
            rows.extend(load::<R>(pool, query)?);
        }
        Ok(rows)
    }

    fn all<R>(&self, pool: &DbPool) -> Result<Vec<R>>
    where
        R: QueryableByName<Sqlite> + 'static,
    {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            self.columns, self.table, self.filter, self.key
        );
        load(pool, diesel::sql_query(sql).into_boxed())
    }

    /// Rows matching one extra text condition, e.g. `SECID = ?`.
    fn matching<R>(
        &self,
        pool: &DbPool,
        condition: &str,
        value: &str,
        order: &str,
    ) -> Result<Vec<R>>
    where
        R: QueryableByName<Sqlite> + 'static,
    {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} AND {} ORDER BY {}",
            self.columns, self.table, self.filter, condition, order
        );
        let query = diesel::sql_query(sql)
            .into_boxed()
            .bind::<Text, _>(value.to_string());
        load(pool, query)
    }

    /// Per-security aggregates; the expressions come from `utils`.
    fn checksums(
        &self,
        pool: &DbPool,
        amount: &str,
        value: &str,
        minutes: &str,
    ) -> Result<Vec<PartitionChecksum>> {
        let sql = format!(
            "SELECT SECID AS partition, COUNT(*) AS row_count, {} AS amount_micros, \
             {} AS value_micros, {} AS minutes FROM {} WHERE {} GROUP BY SECID ORDER BY SECID",
            amount, value, minutes, self.table, self.filter
        );
        let rows: Vec<ChecksumRow> = load(pool, diesel::sql_query(sql).into_boxed())?;
        Ok(rows.into_iter().map(PartitionChecksum::from).collect())
    }
}
