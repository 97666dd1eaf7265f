use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::model::CompanyAccessDB;
use super::session::SqliteBackendSession;
use crate::errors::IntoCore;
use crate::schema::{companies, company_access};
use crate::utils::chunk_for_sqlite;
use fundsync_core::backend::{CompanyAccess, CompanyAccessEntry, CompanyAccessStore};
use fundsync_core::errors::Result;
use fundsync_core::migration::DatasetStamp;

impl CompanyAccessStore for SqliteBackendSession {
    fn company_access_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("company_access")
    }

    fn company_access_entries(&mut self) -> Result<Vec<CompanyAccessEntry>> {
        let rows = company_access::table
            .inner_join(companies::table)
            .select((
                company_access::id,
                company_access::ssn,
                companies::original_id,
                company_access::updated,
            ))
            .load::<(String, String, String, NaiveDateTime)>(self.conn())
            .into_core()?;
        Ok(rows
            .into_iter()
            .map(|(id, ssn, company_code, updated)| CompanyAccessEntry {
                id,
                ssn,
                company_code,
                updated,
            })
            .collect())
    }

    fn insert_company_access(&mut self, access: &CompanyAccess) -> Result<()> {
        diesel::insert_into(company_access::table)
            .values(CompanyAccessDB::from(access))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_company_access(&mut self, access: &CompanyAccess) -> Result<()> {
        let db = CompanyAccessDB::from(access);
        diesel::update(company_access::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn delete_company_access(&mut self, ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in chunk_for_sqlite(ids) {
            deleted +=
                diesel::delete(company_access::table.filter(company_access::id.eq_any(chunk)))
                    .execute(self.conn())
                    .into_core()?;
        }
        Ok(deleted)
    }
}
