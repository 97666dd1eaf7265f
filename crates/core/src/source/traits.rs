//! Read-only accessors for the legacy source databases.
//!
//! These traits define pure data access against the legacy "funds" database,
//! the "salkku" authorization database and the KIID fund metadata dataset.
//! Every list, count and update-detection query applies the excluded
//! portfolio class rule the same way, so that staleness detection and copy
//! logic never disagree.
//!
//! Paged queries are ordered by update timestamp then natural key, which
//! gives a stable resumption point across restarts.

use chrono::{NaiveDate, NaiveDateTime};

use super::model::{
    AuthorizationRecord, CompanyRecord, KiidFundRecord, Page, PortfolioLogRecord,
    PortfolioRecord, PortfolioTransactionRecord, RateRecord, SecurityRecord,
};
use crate::errors::Result;
use crate::migration::{DatasetStamp, PartitionChecksum};

/// Accessor for the legacy operational ("funds") database.
pub trait FundsSource: Send + Sync {
    // =========================================================================
    // Securities
    // =========================================================================

    fn security_stamp(&self) -> Result<DatasetStamp>;

    /// Securities updated at or after `since` (all when `None`).
    fn securities_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<SecurityRecord>>;

    fn security_codes(&self) -> Result<Vec<String>>;

    fn securities_by_codes(&self, codes: &[String]) -> Result<Vec<SecurityRecord>>;

    // =========================================================================
    // Companies
    // =========================================================================

    fn company_stamp(&self) -> Result<DatasetStamp>;

    fn companies_page(&self, since: Option<NaiveDateTime>, page: Page)
        -> Result<Vec<CompanyRecord>>;

    fn company_codes(&self) -> Result<Vec<String>>;

    fn companies_by_codes(&self, codes: &[String]) -> Result<Vec<CompanyRecord>>;

    // =========================================================================
    // Portfolios
    // =========================================================================

    fn portfolio_stamp(&self) -> Result<DatasetStamp>;

    fn portfolios_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioRecord>>;

    fn portfolio_codes(&self) -> Result<Vec<String>>;

    fn portfolios_by_codes(&self, codes: &[String]) -> Result<Vec<PortfolioRecord>>;

    /// Non-excluded portfolio codes owned by a company.
    fn portfolio_codes_for_company(&self, company_code: &str) -> Result<Vec<String>>;

    // =========================================================================
    // Portfolio logs
    // =========================================================================

    fn portfolio_log_stamp(&self) -> Result<DatasetStamp>;

    fn portfolio_logs_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioLogRecord>>;

    fn portfolio_log_numbers(&self) -> Result<Vec<i64>>;

    fn portfolio_logs_by_numbers(&self, numbers: &[i64]) -> Result<Vec<PortfolioLogRecord>>;

    /// Per-security aggregates: count, amount, total value, payment date minutes.
    fn portfolio_log_checksums(&self) -> Result<Vec<PartitionChecksum>>;

    fn portfolio_logs_for_security(&self, security_code: &str)
        -> Result<Vec<PortfolioLogRecord>>;

    // =========================================================================
    // Portfolio transactions
    // =========================================================================

    fn portfolio_transaction_stamp(&self) -> Result<DatasetStamp>;

    fn portfolio_transactions_page(
        &self,
        since: Option<NaiveDateTime>,
        page: Page,
    ) -> Result<Vec<PortfolioTransactionRecord>>;

    fn portfolio_transaction_numbers(&self) -> Result<Vec<i64>>;

    fn portfolio_transactions_by_numbers(
        &self,
        numbers: &[i64],
    ) -> Result<Vec<PortfolioTransactionRecord>>;

    /// Per-security aggregates: count, amount, purchase value, purchase date minutes.
    fn portfolio_transaction_checksums(&self) -> Result<Vec<PartitionChecksum>>;

    fn portfolio_transactions_for_security(
        &self,
        security_code: &str,
    ) -> Result<Vec<PortfolioTransactionRecord>>;

    // =========================================================================
    // Rates
    // =========================================================================

    fn rate_stamp(&self) -> Result<DatasetStamp>;

    fn rates_page(&self, since: Option<NaiveDateTime>, page: Page) -> Result<Vec<RateRecord>>;

    /// Per-security aggregates: count, close sum, rate date minutes.
    fn rate_checksums(&self) -> Result<Vec<PartitionChecksum>>;

    fn rates_for_security(&self, security_code: &str) -> Result<Vec<RateRecord>>;

    // =========================================================================
    // Last rates
    // =========================================================================

    fn last_rate_stamp(&self) -> Result<DatasetStamp>;

    fn last_rates_page(&self, since: Option<NaiveDateTime>, page: Page)
        -> Result<Vec<RateRecord>>;

    fn last_rates(&self) -> Result<Vec<RateRecord>>;

    /// Per-security aggregates of the latest rates, shaped like
    /// [`FundsSource::rate_checksums`].
    fn last_rate_checksums(&self) -> Result<Vec<PartitionChecksum>>;

    fn last_rates_for_security(&self, security_code: &str) -> Result<Vec<RateRecord>>;
}

/// Accessor for the "salkku" authorization database.
pub trait AuthorizationSource: Send + Sync {
    /// Count and latest update of the grants valid on `today`.
    fn access_stamp(&self, today: NaiveDate) -> Result<DatasetStamp>;

    /// Distinct `(ssn, company)` grants valid on `today`.
    ///
    /// A grant is valid when it is not denied, has started and has not expired.
    fn valid_authorizations(&self, today: NaiveDate) -> Result<Vec<AuthorizationRecord>>;
}

/// Accessor for the KIID fund metadata dataset.
pub trait KiidSource: Send + Sync {
    fn fund_stamp(&self) -> Result<DatasetStamp>;

    fn funds_page(&self, since: Option<NaiveDateTime>, page: Page) -> Result<Vec<KiidFundRecord>>;

    fn fund_codes(&self) -> Result<Vec<String>>;

    fn funds_by_codes(&self, codes: &[String]) -> Result<Vec<KiidFundRecord>>;
}
