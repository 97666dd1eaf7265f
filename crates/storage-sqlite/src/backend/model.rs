//! Database models for the backend tables.
//!
//! Decimal columns are text so the scale written by the source survives the
//! round trip; conversion to the domain types happens here.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Date, Integer, Nullable, Text, Timestamp};

use crate::utils::{decimal_text, parse_decimal, parse_optional_decimal};
use fundsync_core::backend::{
    Company, CompanyAccess, Fund, FundGroup, LastRate, Portfolio, PortfolioLog,
    PortfolioTransaction, Security, SecurityRate,
};
use fundsync_core::errors::{Error, Result};
use fundsync_core::migration::{PortfolioLogLine, PortfolioTransactionLine, RateLine, RateTable};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::funds)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct FundDB {
    pub id: String,
    pub original_id: String,
    pub kiid_url_fi: Option<String>,
    pub kiid_url_sv: Option<String>,
    pub kiid_url_en: Option<String>,
    pub risk_level: Option<i32>,
    pub fund_group: Option<String>,
    pub deprecated: bool,
    pub updated: Option<NaiveDateTime>,
}

impl From<&Fund> for FundDB {
    fn from(domain: &Fund) -> Self {
        Self {
            id: domain.id.clone(),
            original_id: domain.original_id.clone(),
            kiid_url_fi: domain.kiid_url_fi.clone(),
            kiid_url_sv: domain.kiid_url_sv.clone(),
            kiid_url_en: domain.kiid_url_en.clone(),
            risk_level: domain.risk_level,
            fund_group: domain.group.as_ref().map(|g| g.as_str().to_string()),
            deprecated: domain.deprecated,
            updated: domain.updated,
        }
    }
}

impl TryFrom<FundDB> for Fund {
    type Error = Error;

    fn try_from(db: FundDB) -> Result<Self> {
        let group = db
            .fund_group
            .as_deref()
            .map(str::parse::<FundGroup>)
            .transpose()?;
        Ok(Self {
            id: db.id,
            original_id: db.original_id,
            kiid_url_fi: db.kiid_url_fi,
            kiid_url_sv: db.kiid_url_sv,
            kiid_url_en: db.kiid_url_en,
            risk_level: db.risk_level,
            group,
            deprecated: db.deprecated,
            updated: db.updated,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::securities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SecurityDB {
    pub id: String,
    pub original_id: String,
    pub fund_id: Option<String>,
    pub currency: Option<String>,
    pub name_fi: Option<String>,
    pub name_sv: Option<String>,
    pub name_en: Option<String>,
    pub series_id: Option<String>,
    pub updated: Option<NaiveDateTime>,
}

impl From<&Security> for SecurityDB {
    fn from(domain: &Security) -> Self {
        Self {
            id: domain.id.clone(),
            original_id: domain.original_id.clone(),
            fund_id: domain.fund_id.clone(),
            currency: domain.currency.clone(),
            name_fi: domain.name_fi.clone(),
            name_sv: domain.name_sv.clone(),
            name_en: domain.name_en.clone(),
            series_id: domain.series_id.clone(),
            updated: domain.updated,
        }
    }
}

impl From<SecurityDB> for Security {
    fn from(db: SecurityDB) -> Self {
        Self {
            id: db.id,
            original_id: db.original_id,
            fund_id: db.fund_id,
            currency: db.currency,
            name_fi: db.name_fi,
            name_sv: db.name_sv,
            name_en: db.name_en,
            series_id: db.series_id,
            updated: db.updated,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::companies)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct CompanyDB {
    pub id: String,
    pub original_id: String,
    pub name: Option<String>,
    pub ssn: Option<String>,
    pub updated: Option<NaiveDateTime>,
}

impl From<&Company> for CompanyDB {
    fn from(domain: &Company) -> Self {
        Self {
            id: domain.id.clone(),
            original_id: domain.original_id.clone(),
            name: domain.name.clone(),
            ssn: domain.ssn.clone(),
            updated: domain.updated,
        }
    }
}

impl From<CompanyDB> for Company {
    fn from(db: CompanyDB) -> Self {
        Self {
            id: db.id,
            original_id: db.original_id,
            name: db.name,
            ssn: db.ssn,
            updated: db.updated,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::portfolios)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct PortfolioDB {
    pub id: String,
    pub original_id: String,
    pub company_id: String,
    pub name: Option<String>,
    pub updated: Option<NaiveDateTime>,
}

impl From<&Portfolio> for PortfolioDB {
    fn from(domain: &Portfolio) -> Self {
        Self {
            id: domain.id.clone(),
            original_id: domain.original_id.clone(),
            company_id: domain.company_id.clone(),
            name: domain.name.clone(),
            updated: domain.updated,
        }
    }
}

impl From<PortfolioDB> for Portfolio {
    fn from(db: PortfolioDB) -> Self {
        Self {
            id: db.id,
            original_id: db.original_id,
            company_id: db.company_id,
            name: db.name,
            updated: db.updated,
        }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::portfolio_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct PortfolioLogDB {
    pub id: String,
    pub transaction_number: i64,
    pub security_id: String,
    pub c_security_id: Option<String>,
    pub portfolio_id: String,
    pub c_company_id: Option<String>,
    pub transaction_code: String,
    pub transaction_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub amount: String,
    pub c_amount: Option<String>,
    pub unit_price: Option<String>,
    pub purchase_value: Option<String>,
    pub total_value: Option<String>,
    pub status: i32,
    pub updated: NaiveDateTime,
}

impl From<&PortfolioLog> for PortfolioLogDB {
    fn from(domain: &PortfolioLog) -> Self {
        Self {
            id: domain.id.clone(),
            transaction_number: domain.transaction_number,
            security_id: domain.security_id.clone(),
            c_security_id: domain.c_security_id.clone(),
            portfolio_id: domain.portfolio_id.clone(),
            c_company_id: domain.c_company_id.clone(),
            transaction_code: domain.transaction_code.clone(),
            transaction_date: domain.transaction_date,
            payment_date: domain.payment_date,
            amount: decimal_text(&domain.amount),
            c_amount: domain.c_amount.as_ref().map(decimal_text),
            unit_price: domain.unit_price.as_ref().map(decimal_text),
            purchase_value: domain.purchase_value.as_ref().map(decimal_text),
            total_value: domain.total_value.as_ref().map(decimal_text),
            status: domain.status,
            updated: domain.updated,
        }
    }
}

impl TryFrom<PortfolioLogDB> for PortfolioLog {
    type Error = Error;

    fn try_from(db: PortfolioLogDB) -> Result<Self> {
        Ok(Self {
            id: db.id,
            transaction_number: db.transaction_number,
            security_id: db.security_id,
            c_security_id: db.c_security_id,
            portfolio_id: db.portfolio_id,
            c_company_id: db.c_company_id,
            transaction_code: db.transaction_code,
            transaction_date: db.transaction_date,
            payment_date: db.payment_date,
            amount: parse_decimal(&db.amount)?,
            c_amount: parse_optional_decimal(db.c_amount.as_deref())?,
            unit_price: parse_optional_decimal(db.unit_price.as_deref())?,
            purchase_value: parse_optional_decimal(db.purchase_value.as_deref())?,
            total_value: parse_optional_decimal(db.total_value.as_deref())?,
            status: db.status,
            updated: db.updated,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::portfolio_transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct PortfolioTransactionDB {
    pub id: String,
    pub transaction_number: i64,
    pub portfolio_id: String,
    pub security_id: String,
    pub amount: String,
    pub purchase_value: String,
    pub purchase_date: Option<NaiveDate>,
    pub updated: NaiveDateTime,
}

impl From<&PortfolioTransaction> for PortfolioTransactionDB {
    fn from(domain: &PortfolioTransaction) -> Self {
        Self {
            id: domain.id.clone(),
            transaction_number: domain.transaction_number,
            portfolio_id: domain.portfolio_id.clone(),
            security_id: domain.security_id.clone(),
            amount: decimal_text(&domain.amount),
            purchase_value: decimal_text(&domain.purchase_value),
            purchase_date: domain.purchase_date,
            updated: domain.updated,
        }
    }
}

impl TryFrom<PortfolioTransactionDB> for PortfolioTransaction {
    type Error = Error;

    fn try_from(db: PortfolioTransactionDB) -> Result<Self> {
        Ok(Self {
            id: db.id,
            transaction_number: db.transaction_number,
            portfolio_id: db.portfolio_id,
            security_id: db.security_id,
            amount: parse_decimal(&db.amount)?,
            purchase_value: parse_decimal(&db.purchase_value)?,
            purchase_date: db.purchase_date,
            updated: db.updated,
        })
    }
}

/// Shared shape of `security_rates` and `last_rates`.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::security_rates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SecurityRateDB {
    pub id: String,
    pub security_id: String,
    pub rate_date: NaiveDate,
    pub rate_close: String,
    pub updated: NaiveDateTime,
}

impl From<&SecurityRate> for SecurityRateDB {
    fn from(domain: &SecurityRate) -> Self {
        Self {
            id: domain.id.clone(),
            security_id: domain.security_id.clone(),
            rate_date: domain.rate_date,
            rate_close: decimal_text(&domain.rate_close),
            updated: domain.updated,
        }
    }
}

impl TryFrom<SecurityRateDB> for SecurityRate {
    type Error = Error;

    fn try_from(db: SecurityRateDB) -> Result<Self> {
        Ok(Self {
            id: db.id,
            security_id: db.security_id,
            rate_date: db.rate_date,
            rate_close: parse_decimal(&db.rate_close)?,
            updated: db.updated,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::last_rates)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LastRateDB {
    pub id: String,
    pub security_id: String,
    pub rate_date: NaiveDate,
    pub rate_close: String,
    pub updated: NaiveDateTime,
}

impl From<&LastRate> for LastRateDB {
    fn from(domain: &LastRate) -> Self {
        Self {
            id: domain.id.clone(),
            security_id: domain.security_id.clone(),
            rate_date: domain.rate_date,
            rate_close: decimal_text(&domain.rate_close),
            updated: domain.updated,
        }
    }
}

impl TryFrom<LastRateDB> for LastRate {
    type Error = Error;

    fn try_from(db: LastRateDB) -> Result<Self> {
        Ok(Self {
            id: db.id,
            security_id: db.security_id,
            rate_date: db.rate_date,
            rate_close: parse_decimal(&db.rate_close)?,
            updated: db.updated,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::company_access)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CompanyAccessDB {
    pub id: String,
    pub ssn: String,
    pub company_id: String,
    pub updated: NaiveDateTime,
}

impl From<&CompanyAccess> for CompanyAccessDB {
    fn from(domain: &CompanyAccess) -> Self {
        Self {
            id: domain.id.clone(),
            ssn: domain.ssn.clone(),
            company_id: domain.company_id.clone(),
            updated: domain.updated,
        }
    }
}

// Report rows

#[derive(QueryableByName, Debug)]
pub struct PortfolioLogLineRow {
    #[diesel(sql_type = BigInt)]
    pub transaction_number: i64,
    #[diesel(sql_type = Text)]
    pub security_code: String,
    #[diesel(sql_type = Text)]
    pub portfolio_code: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub c_security_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub c_company_code: Option<String>,
    #[diesel(sql_type = Text)]
    pub transaction_code: String,
    #[diesel(sql_type = Date)]
    pub transaction_date: NaiveDate,
    #[diesel(sql_type = Nullable<Date>)]
    pub payment_date: Option<NaiveDate>,
    #[diesel(sql_type = Text)]
    pub amount: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub c_amount: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub unit_price: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub purchase_value: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub total_value: Option<String>,
    #[diesel(sql_type = Integer)]
    pub status: i32,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl TryFrom<PortfolioLogLineRow> for PortfolioLogLine {
    type Error = Error;

    fn try_from(row: PortfolioLogLineRow) -> Result<Self> {
        Ok(Self {
            transaction_number: row.transaction_number,
            security_code: row.security_code,
            portfolio_code: row.portfolio_code,
            c_security_code: row.c_security_code,
            c_company_code: row.c_company_code,
            transaction_code: row.transaction_code,
            transaction_date: row.transaction_date,
            payment_date: row.payment_date,
            amount: parse_decimal(&row.amount)?,
            c_amount: parse_optional_decimal(row.c_amount.as_deref())?,
            unit_price: parse_optional_decimal(row.unit_price.as_deref())?,
            purchase_value: parse_optional_decimal(row.purchase_value.as_deref())?,
            total_value: parse_optional_decimal(row.total_value.as_deref())?,
            status: row.status,
            updated: row.updated,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub struct PortfolioTransactionLineRow {
    #[diesel(sql_type = BigInt)]
    pub transaction_number: i64,
    #[diesel(sql_type = Text)]
    pub security_code: String,
    #[diesel(sql_type = Text)]
    pub portfolio_code: String,
    #[diesel(sql_type = Text)]
    pub amount: String,
    #[diesel(sql_type = Text)]
    pub purchase_value: String,
    #[diesel(sql_type = Nullable<Date>)]
    pub purchase_date: Option<NaiveDate>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl TryFrom<PortfolioTransactionLineRow> for PortfolioTransactionLine {
    type Error = Error;

    fn try_from(row: PortfolioTransactionLineRow) -> Result<Self> {
        Ok(Self {
            transaction_number: row.transaction_number,
            security_code: row.security_code,
            portfolio_code: row.portfolio_code,
            amount: parse_decimal(&row.amount)?,
            purchase_value: parse_decimal(&row.purchase_value)?,
            purchase_date: row.purchase_date,
            updated: row.updated,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub struct RateLineRow {
    #[diesel(sql_type = Text)]
    pub security_code: String,
    #[diesel(sql_type = Date)]
    pub rate_date: NaiveDate,
    #[diesel(sql_type = Text)]
    pub rate_close: String,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl RateLineRow {
    pub fn into_line(self, table: RateTable) -> Result<RateLine> {
        Ok(RateLine {
            table,
            security_code: self.security_code,
            rate_date: self.rate_date,
            rate_close: parse_decimal(&self.rate_close)?,
            updated: self.updated,
        })
    }
}
