//! Reference entity stores: funds, securities, companies and portfolios.

use diesel::dsl::{count_star, max};
use diesel::prelude::*;

use super::model::{CompanyDB, FundDB, PortfolioDB, SecurityDB};
use super::session::SqliteBackendSession;
use crate::errors::IntoCore;
use crate::schema::{companies, funds, portfolios, securities};
use crate::utils::chunk_for_sqlite;
use fundsync_core::backend::{
    Company, CompanyStore, Fund, FundStore, Portfolio, PortfolioStore, Security, SecurityStore,
};
use fundsync_core::errors::Result;
use fundsync_core::migration::DatasetStamp;

impl FundStore for SqliteBackendSession {
    fn fund_stamp(&mut self) -> Result<DatasetStamp> {
        let (count, last_update) = funds::table
            .select((count_star(), max(funds::updated)))
            .first::<(i64, Option<chrono::NaiveDateTime>)>(self.conn())
            .into_core()?;
        Ok(DatasetStamp::new(count, last_update))
    }

    fn find_fund(&mut self, original_id: &str) -> Result<Option<Fund>> {
        funds::table
            .filter(funds::original_id.eq(original_id))
            .select(FundDB::as_select())
            .first::<FundDB>(self.conn())
            .optional()
            .into_core()?
            .map(Fund::try_from)
            .transpose()
    }

    fn insert_fund(&mut self, fund: &Fund) -> Result<()> {
        diesel::insert_into(funds::table)
            .values(FundDB::from(fund))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_fund(&mut self, fund: &Fund) -> Result<()> {
        let db = FundDB::from(fund);
        diesel::update(funds::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn fund_codes(&mut self) -> Result<Vec<String>> {
        funds::table
            .select(funds::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn placeholder_fund_codes(&mut self) -> Result<Vec<String>> {
        funds::table
            .filter(funds::updated.is_null())
            .select(funds::original_id)
            .load::<String>(self.conn())
            .into_core()
    }
}

impl SecurityStore for SqliteBackendSession {
    fn security_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("securities")
    }

    fn find_security(&mut self, original_id: &str) -> Result<Option<Security>> {
        let found = securities::table
            .filter(securities::original_id.eq(original_id))
            .select(SecurityDB::as_select())
            .first::<SecurityDB>(self.conn())
            .optional()
            .into_core()?;
        Ok(found.map(Security::from))
    }

    fn insert_security(&mut self, security: &Security) -> Result<()> {
        diesel::insert_into(securities::table)
            .values(SecurityDB::from(security))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_security(&mut self, security: &Security) -> Result<()> {
        let db = SecurityDB::from(security);
        diesel::update(securities::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn security_codes(&mut self) -> Result<Vec<String>> {
        securities::table
            .select(securities::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn placeholder_security_codes(&mut self) -> Result<Vec<String>> {
        securities::table
            .filter(securities::updated.is_null())
            .select(securities::original_id)
            .load::<String>(self.conn())
            .into_core()
    }
}

impl CompanyStore for SqliteBackendSession {
    fn company_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("companies")
    }

    fn find_company(&mut self, original_id: &str) -> Result<Option<Company>> {
        let found = companies::table
            .filter(companies::original_id.eq(original_id))
            .select(CompanyDB::as_select())
            .first::<CompanyDB>(self.conn())
            .optional()
            .into_core()?;
        Ok(found.map(Company::from))
    }

    fn insert_company(&mut self, company: &Company) -> Result<()> {
        diesel::insert_into(companies::table)
            .values(CompanyDB::from(company))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_company(&mut self, company: &Company) -> Result<()> {
        let db = CompanyDB::from(company);
        diesel::update(companies::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn company_codes(&mut self) -> Result<Vec<String>> {
        companies::table
            .select(companies::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn placeholder_company_codes(&mut self) -> Result<Vec<String>> {
        companies::table
            .filter(companies::updated.is_null())
            .select(companies::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn company_codes_in_use(&mut self) -> Result<Vec<String>> {
        self.codes_by_query(
            "SELECT c.original_id AS code FROM companies c WHERE c.id IN (
                SELECT company_id FROM portfolios
                UNION SELECT c_company_id FROM portfolio_logs WHERE c_company_id IS NOT NULL
                UNION SELECT company_id FROM company_access
            )",
        )
    }

    fn delete_companies(&mut self, original_ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in chunk_for_sqlite(original_ids) {
            deleted += diesel::delete(companies::table.filter(companies::original_id.eq_any(chunk)))
                .execute(self.conn())
                .into_core()?;
        }
        Ok(deleted)
    }
}

impl PortfolioStore for SqliteBackendSession {
    fn portfolio_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("portfolios")
    }

    fn find_portfolio(&mut self, original_id: &str) -> Result<Option<Portfolio>> {
        let found = portfolios::table
            .filter(portfolios::original_id.eq(original_id))
            .select(PortfolioDB::as_select())
            .first::<PortfolioDB>(self.conn())
            .optional()
            .into_core()?;
        Ok(found.map(Portfolio::from))
    }

    fn insert_portfolio(&mut self, portfolio: &Portfolio) -> Result<()> {
        diesel::insert_into(portfolios::table)
            .values(PortfolioDB::from(portfolio))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_portfolio(&mut self, portfolio: &Portfolio) -> Result<()> {
        let db = PortfolioDB::from(portfolio);
        diesel::update(portfolios::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn portfolio_codes(&mut self) -> Result<Vec<String>> {
        portfolios::table
            .select(portfolios::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn placeholder_portfolio_codes(&mut self) -> Result<Vec<String>> {
        portfolios::table
            .filter(portfolios::updated.is_null())
            .select(portfolios::original_id)
            .load::<String>(self.conn())
            .into_core()
    }

    fn portfolio_codes_in_use(&mut self) -> Result<Vec<String>> {
        self.codes_by_query(
            "SELECT p.original_id AS code FROM portfolios p WHERE p.id IN (
                SELECT portfolio_id FROM portfolio_logs
                UNION SELECT portfolio_id FROM portfolio_transactions
            )",
        )
    }

    fn delete_portfolios(&mut self, original_ids: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in chunk_for_sqlite(original_ids) {
            deleted +=
                diesel::delete(portfolios::table.filter(portfolios::original_id.eq_any(chunk)))
                    .execute(self.conn())
                    .into_core()?;
        }
        Ok(deleted)
    }
}
