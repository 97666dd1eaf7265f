use std::sync::Arc;

use chrono::NaiveDateTime;

use super::model::{
    CompanyRow, PortfolioLogRow, PortfolioRow, PortfolioTransactionRow, RateRow, SecurityRow,
    COMPANY_COLUMNS, PORTFOLIO_COLUMNS, PORTFOLIO_LOG_COLUMNS, PORTFOLIO_TRANSACTION_COLUMNS,
    RATE_COLUMNS, SECURITY_COLUMNS,
};
use super::schema::{
    company_filter, portfolio_filter, portfolio_log_filter, portfolio_transaction_filter,
};
use super::{load, Dataset};
use crate::db::DbPool;
use crate::rows::CodeRow;
use crate::utils::{micro_sum, minute_sum};
use fundsync_core::errors::Result;
use fundsync_core::migration::{DatasetStamp, PartitionChecksum};
use fundsync_core::source::{
    CompanyRecord, FundsSource, Page, PortfolioLogRecord, PortfolioRecord,
    PortfolioTransactionRecord, RateRecord, SecurityRecord,
};

fn securities() -> Dataset {
    Dataset::new("TABLE_SECURITY", SECURITY_COLUMNS, "SECID")
}

fn companies() -> Dataset {
    Dataset::new("TABLE_COMPANY", COMPANY_COLUMNS, "COMID").filtered(company_filter())
}

fn portfolios() -> Dataset {
    Dataset::new("TABLE_PORTFOL", PORTFOLIO_COLUMNS, "PORID").filtered(portfolio_filter())
}

fn portfolio_logs() -> Dataset {
    Dataset::new("TABLE_PORTLOG", PORTFOLIO_LOG_COLUMNS, "TRANS_NR")
        .filtered(portfolio_log_filter())
}

fn portfolio_transactions() -> Dataset {
    Dataset::new("TABLE_PORTRANS", PORTFOLIO_TRANSACTION_COLUMNS, "TRANS_NR")
        .filtered(portfolio_transaction_filter())
}

fn rates() -> Dataset {
    Dataset::new("TABLE_RATE", RATE_COLUMNS, "SECID, RATE_DATE")
}

fn last_rates() -> Dataset {
    Dataset::new("TABLE_RATELAST", RATE_COLUMNS, "SECID")
}

fn decode<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = fundsync_core::Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Accessor for the legacy operational database.
pub struct SqliteFundsSource {
    pool: Arc<DbPool>,
}

impl SqliteFundsSource {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl FundsSource for SqliteFundsSource {
    fn security_stamp(&self) -> Result<DatasetStamp> {
        securities().stamp(&self.pool)
    }

    fn securities_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<SecurityRecord>> {
        let rows: Vec<SecurityRow> = securities().page(&self.pool, since, page)?;
        Ok(rows.into_iter().map(SecurityRecord::from).collect())
    }

    fn security_codes(&self) -> Result<Vec<String>> {
        securities().codes(&self.pool)
    }

    fn securities_by_codes(&self, codes: &[String]) -> Result<Vec<SecurityRecord>> {
        let rows: Vec<SecurityRow> = securities().by_codes(&self.pool, codes)?;
        Ok(rows.into_iter().map(SecurityRecord::from).collect())
    }

    fn company_stamp(&self) -> Result<DatasetStamp> {
        companies().stamp(&self.pool)
    }

    fn companies_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<CompanyRecord>> {
        let rows: Vec<CompanyRow> = companies().page(&self.pool, since, page)?;
        Ok(rows.into_iter().map(CompanyRecord::from).collect())
    }

    fn company_codes(&self) -> Result<Vec<String>> {
        companies().codes(&self.pool)
    }

    fn companies_by_codes(&self, codes: &[String]) -> Result<Vec<CompanyRecord>> {
        let rows: Vec<CompanyRow> = companies().by_codes(&self.pool, codes)?;
        Ok(rows.into_iter().map(CompanyRecord::from).collect())
    }

    fn portfolio_stamp(&self) -> Result<DatasetStamp> {
        portfolios().stamp(&self.pool)
    }

    fn portfolios_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioRecord>> {
        let rows: Vec<PortfolioRow> = portfolios().page(&self.pool, since, page)?;
        Ok(rows.into_iter().map(PortfolioRecord::from).collect())
    }

    fn portfolio_codes(&self) -> Result<Vec<String>> {
        portfolios().codes(&self.pool)
    }

    fn portfolios_by_codes(&self, codes: &[String]) -> Result<Vec<PortfolioRecord>> {
        let rows: Vec<PortfolioRow> = portfolios().by_codes(&self.pool, codes)?;
        Ok(rows.into_iter().map(PortfolioRecord::from).collect())
    }

    fn portfolio_codes_for_company(&self, company_code: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT PORID AS code FROM TABLE_PORTFOL WHERE {} AND COMID = ? ORDER BY PORID",
            portfolio_filter()
        );
        let query = diesel::sql_query(sql)
            .into_boxed()
            .bind::<diesel::sql_types::Text, _>(company_code.to_string());
        let rows: Vec<CodeRow> = load(&self.pool, query)?;
        Ok(rows.into_iter().map(|r| r.code).collect())
    }

    fn portfolio_log_stamp(&self) -> Result<DatasetStamp> {
        portfolio_logs().stamp(&self.pool)
    }

    fn portfolio_logs_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioLogRecord>> {
        let rows: Vec<PortfolioLogRow> = portfolio_logs().page(&self.pool, since, page)?;
        decode(rows)
    }

    fn portfolio_log_numbers(&self) -> Result<Vec<i64>> {
        portfolio_logs().numbers(&self.pool)
    }

    fn portfolio_logs_by_numbers(&self, numbers: &[i64]) -> Result<Vec<PortfolioLogRecord>> {
        let rows: Vec<PortfolioLogRow> = portfolio_logs().by_numbers(&self.pool, numbers)?;
        decode(rows)
    }

    fn portfolio_log_checksums(&self) -> Result<Vec<PartitionChecksum>> {
        portfolio_logs().checksums(
            &self.pool,
            &micro_sum("AMOUNT"),
            &micro_sum("TOT_C_VALUE"),
            &minute_sum("PMT_DATE"),
        )
    }

    fn portfolio_logs_for_security(
        &self,
        security_code: &str,
    ) -> Result<Vec<PortfolioLogRecord>> {
        let rows: Vec<PortfolioLogRow> =
            portfolio_logs().matching(&self.pool, "SECID = ?", security_code, "TRANS_NR")?;
        decode(rows)
    }

    fn portfolio_transaction_stamp(&self) -> Result<DatasetStamp> {
        portfolio_transactions().stamp(&self.pool)
    }

    fn portfolio_transactions_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioTransactionRecord>> {
        let rows: Vec<PortfolioTransactionRow> =
            portfolio_transactions().page(&self.pool, since, page)?;
        decode(rows)
    }

    fn portfolio_transaction_numbers(&self) -> Result<Vec<i64>> {
        portfolio_transactions().numbers(&self.pool)
    }

    fn portfolio_transactions_by_numbers(
        &self,
        numbers: &[i64],
    ) -> Result<Vec<PortfolioTransactionRecord>> {
        let rows: Vec<PortfolioTransactionRow> =
            portfolio_transactions().by_numbers(&self.pool, numbers)?;
        decode(rows)
    }

    fn portfolio_transaction_checksums(&self) -> Result<Vec<PartitionChecksum>> {
        portfolio_transactions().checksums(
            &self.pool,
            &micro_sum("AMOUNT"),
            &micro_sum("PUR_C_VALUE"),
            &minute_sum("PUR_DATE"),
        )
    }

    fn portfolio_transactions_for_security(
        &self,
        security_code: &str,
    ) -> Result<Vec<PortfolioTransactionRecord>> {
        let rows: Vec<PortfolioTransactionRow> = portfolio_transactions().matching(
            &self.pool,
            "SECID = ?",
            security_code,
            "TRANS_NR",
        )?;
        decode(rows)
    }

    fn rate_stamp(&self) -> Result<DatasetStamp> {
        rates().stamp(&self.pool)
    }

    fn rates_page(&self, since: Option<NaiveDateTime>, page: Page) -> Result<Vec<RateRecord>> {
        let rows: Vec<RateRow> = rates().page(&self.pool, since, page)?;
        decode(rows)
    }

    fn rate_checksums(&self) -> Result<Vec<PartitionChecksum>> {
        rates().checksums(&self.pool, &micro_sum("RATE_CLOSE"), "0", &minute_sum("RATE_DATE"))
    }

    fn rates_for_security(&self, security_code: &str) -> Result<Vec<RateRecord>> {
        let rows: Vec<RateRow> =
            rates().matching(&self.pool, "SECID = ?", security_code, "RATE_DATE")?;
        decode(rows)
    }

    fn last_rate_stamp(&self) -> Result<DatasetStamp> {
        last_rates().stamp(&self.pool)
    }

    fn last_rates_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<RateRecord>> {
        let rows: Vec<RateRow> = last_rates().page(&self.pool, since, page)?;
        decode(rows)
    }

    fn last_rates(&self) -> Result<Vec<RateRecord>> {
        let rows: Vec<RateRow> = last_rates().all(&self.pool)?;
        decode(rows)
    }

    fn last_rate_checksums(&self) -> Result<Vec<PartitionChecksum>> {
        last_rates().checksums(&self.pool, &micro_sum("RATE_CLOSE"), "0", &minute_sum("RATE_DATE"))
    }

    fn last_rates_for_security(&self, security_code: &str) -> Result<Vec<RateRecord>> {
        let rows: Vec<RateRow> =
            last_rates().matching(&self.pool, "SECID = ?", security_code, "SECID")?;
        decode(rows)
    }
}
