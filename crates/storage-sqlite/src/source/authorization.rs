use std::sync::Arc;

use chrono::NaiveDate;
use diesel::sql_types::Date;

use super::load;
use super::model::AuthorizationRow;
use super::schema::VALID_AUTHORIZATION;
use crate::db::DbPool;
use crate::rows::StampRow;
use fundsync_core::errors::Result;
use fundsync_core::migration::DatasetStamp;
use fundsync_core::source::{AuthorizationRecord, AuthorizationSource};

fn valid_grants_sql() -> String {
    format!(
        "SELECT AUTHORIZED_SSN AS ssn, COMPANY_CODE AS company_code, MAX(UPDATED) AS updated \
         FROM \"Authorization\" WHERE {} \
         GROUP BY AUTHORIZED_SSN, COMPANY_CODE \
         ORDER BY AUTHORIZED_SSN, COMPANY_CODE",
        VALID_AUTHORIZATION
    )
}

/// Accessor for the authorization ("salkku") database.
pub struct SqliteAuthorizationSource {
    pool: Arc<DbPool>,
}

impl SqliteAuthorizationSource {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl AuthorizationSource for SqliteAuthorizationSource {
    fn access_stamp(&self, today: NaiveDate) -> Result<DatasetStamp> {
        let sql = format!(
            "SELECT COUNT(*) AS row_count, MAX(updated) AS last_update FROM ({})",
            valid_grants_sql()
        );
        let query = diesel::sql_query(sql)
            .into_boxed()
            .bind::<Date, _>(today)
            .bind::<Date, _>(today);
        let rows: Vec<StampRow> = load(&self.pool, query)?;
        Ok(rows
            .into_iter()
            .next()
            .map(DatasetStamp::from)
            .unwrap_or_else(DatasetStamp::empty))
    }

    fn valid_authorizations(&self, today: NaiveDate) -> Result<Vec<AuthorizationRecord>> {
        let query = diesel::sql_query(valid_grants_sql())
            .into_boxed()
            .bind::<Date, _>(today)
            .bind::<Date, _>(today);
        let rows: Vec<AuthorizationRow> = load(&self.pool, query)?;
        Ok(rows.into_iter().map(AuthorizationRecord::from).collect())
    }
}
