//! Backend store traits.
//!
//! Every store operates inside the caller's [`BackendSession`], so a task's
//! writes share one transaction. Natural keys ("codes", transaction numbers)
//! are used at this boundary; surrogate ids only appear inside entities.

use chrono::NaiveDate;

use super::model::{
    Company, CompanyAccess, CompanyAccessEntry, Fund, LastRate, Portfolio, PortfolioLog,
    PortfolioTransaction, Security, SecurityRate,
};
use crate::errors::Result;
use crate::migration::{
    DatasetStamp, PartitionChecksum, PortfolioLogLine, PortfolioTransactionLine, RateLine,
};

pub trait FundStore {
    fn fund_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_fund(&mut self, original_id: &str) -> Result<Option<Fund>>;

    fn insert_fund(&mut self, fund: &Fund) -> Result<()>;

    fn update_fund(&mut self, fund: &Fund) -> Result<()>;

    fn fund_codes(&mut self) -> Result<Vec<String>>;

    /// Codes of rows created as placeholders and never filled in.
    fn placeholder_fund_codes(&mut self) -> Result<Vec<String>>;
}

pub trait SecurityStore {
    fn security_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_security(&mut self, original_id: &str) -> Result<Option<Security>>;

    fn insert_security(&mut self, security: &Security) -> Result<()>;

    fn update_security(&mut self, security: &Security) -> Result<()>;

    fn security_codes(&mut self) -> Result<Vec<String>>;

    fn placeholder_security_codes(&mut self) -> Result<Vec<String>>;
}

pub trait CompanyStore {
    fn company_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_company(&mut self, original_id: &str) -> Result<Option<Company>>;

    fn insert_company(&mut self, company: &Company) -> Result<()>;

    fn update_company(&mut self, company: &Company) -> Result<()>;

    fn company_codes(&mut self) -> Result<Vec<String>>;

    fn placeholder_company_codes(&mut self) -> Result<Vec<String>>;

    /// Codes of companies referenced by portfolios, portfolio logs or
    /// company access rows.
    fn company_codes_in_use(&mut self) -> Result<Vec<String>>;

    /// Returns the number of deleted rows.
    fn delete_companies(&mut self, original_ids: &[String]) -> Result<usize>;
}

pub trait PortfolioStore {
    fn portfolio_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_portfolio(&mut self, original_id: &str) -> Result<Option<Portfolio>>;

    fn insert_portfolio(&mut self, portfolio: &Portfolio) -> Result<()>;

    fn update_portfolio(&mut self, portfolio: &Portfolio) -> Result<()>;

    fn portfolio_codes(&mut self) -> Result<Vec<String>>;

    fn placeholder_portfolio_codes(&mut self) -> Result<Vec<String>>;

    /// Codes of portfolios referenced by portfolio logs or transactions.
    fn portfolio_codes_in_use(&mut self) -> Result<Vec<String>>;

    fn delete_portfolios(&mut self, original_ids: &[String]) -> Result<usize>;
}

pub trait PortfolioLogStore {
    fn portfolio_log_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_portfolio_log(&mut self, transaction_number: i64) -> Result<Option<PortfolioLog>>;

    fn insert_portfolio_log(&mut self, log: &PortfolioLog) -> Result<()>;

    fn update_portfolio_log(&mut self, log: &PortfolioLog) -> Result<()>;

    fn portfolio_log_numbers(&mut self) -> Result<Vec<i64>>;

    fn portfolio_log_checksums(&mut self) -> Result<Vec<PartitionChecksum>>;

    fn portfolio_log_lines(&mut self, security_code: &str) -> Result<Vec<PortfolioLogLine>>;

    /// Removes one log row; `false` when it was already gone.
    fn delete_portfolio_log(&mut self, transaction_number: i64) -> Result<bool>;
}

pub trait PortfolioTransactionStore {
    fn portfolio_transaction_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_portfolio_transaction(
        &mut self,
        transaction_number: i64,
    ) -> Result<Option<PortfolioTransaction>>;

    fn insert_portfolio_transaction(&mut self, transaction: &PortfolioTransaction) -> Result<()>;

    fn update_portfolio_transaction(&mut self, transaction: &PortfolioTransaction) -> Result<()>;

    fn portfolio_transaction_numbers(&mut self) -> Result<Vec<i64>>;

    fn delete_portfolio_transactions(&mut self, transaction_numbers: &[i64]) -> Result<usize>;

    fn portfolio_transaction_checksums(&mut self) -> Result<Vec<PartitionChecksum>>;

    fn portfolio_transaction_lines(
        &mut self,
        security_code: &str,
    ) -> Result<Vec<PortfolioTransactionLine>>;
}

pub trait SecurityRateStore {
    fn security_rate_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_security_rate(
        &mut self,
        security_id: &str,
        rate_date: NaiveDate,
    ) -> Result<Option<SecurityRate>>;

    fn insert_security_rate(&mut self, rate: &SecurityRate) -> Result<()>;

    fn update_security_rate(&mut self, rate: &SecurityRate) -> Result<()>;

    /// Per-security aggregates, partitioned by security code.
    fn security_rate_checksums(&mut self) -> Result<Vec<PartitionChecksum>>;

    fn security_rate_lines(&mut self, security_code: &str) -> Result<Vec<RateLine>>;
}

pub trait LastRateStore {
    fn last_rate_stamp(&mut self) -> Result<DatasetStamp>;

    fn find_last_rate(&mut self, security_id: &str) -> Result<Option<LastRate>>;

    fn insert_last_rate(&mut self, rate: &LastRate) -> Result<()>;

    fn update_last_rate(&mut self, rate: &LastRate) -> Result<()>;

    fn last_rate_lines(&mut self) -> Result<Vec<RateLine>>;

    fn last_rate_checksums(&mut self) -> Result<Vec<PartitionChecksum>>;

    fn last_rate_lines_for_security(&mut self, security_code: &str) -> Result<Vec<RateLine>>;

    fn delete_last_rates(&mut self, security_codes: &[String]) -> Result<usize>;
}

pub trait CompanyAccessStore {
    fn company_access_stamp(&mut self) -> Result<DatasetStamp>;

    fn company_access_entries(&mut self) -> Result<Vec<CompanyAccessEntry>>;

    fn insert_company_access(&mut self, access: &CompanyAccess) -> Result<()>;

    fn update_company_access(&mut self, access: &CompanyAccess) -> Result<()>;

    fn delete_company_access(&mut self, ids: &[String]) -> Result<usize>;
}

/// One destination connection inside an explicit transaction.
pub trait BackendSession:
    FundStore
    + SecurityStore
    + CompanyStore
    + PortfolioStore
    + PortfolioLogStore
    + PortfolioTransactionStore
    + SecurityRateStore
    + LastRateStore
    + CompanyAccessStore
{
    /// Commits the work done so far and opens a new transaction.
    fn checkpoint(&mut self) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens backend sessions.
pub trait SessionFactory: Send + Sync {
    fn begin(&self) -> Result<Box<dyn BackendSession>>;
}
