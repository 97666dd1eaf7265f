//! Raw legacy rows, decoded into `fundsync_core::source` records.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Date, Integer, Nullable, Text, Timestamp};

use crate::utils::{parse_decimal, parse_optional_decimal};
use fundsync_core::errors::{Error, Result};
use fundsync_core::source::{
    AuthorizationRecord, CompanyRecord, KiidFundRecord, PortfolioLogRecord, PortfolioRecord,
    PortfolioTransactionRecord, RateRecord, SecurityRecord,
};

pub const SECURITY_COLUMNS: &str = "SECID AS code, FUND_CODE AS fund_code, \
    CURRENCY AS currency, NAME_FI AS name_fi, NAME_SV AS name_sv, NAME_EN AS name_en, \
    SERIES_ID AS series_id, UPDATED AS updated";

pub const COMPANY_COLUMNS: &str =
    "COMID AS code, NAME AS name, SO_SEC_NR AS ssn, UPDATED AS updated";

pub const PORTFOLIO_COLUMNS: &str = "PORID AS code, COMID AS company_code, NAME AS name, \
    PORCLASS AS class, UPDATED AS updated";

pub const PORTFOLIO_LOG_COLUMNS: &str = "TRANS_NR AS transaction_number, \
    PORID AS portfolio_code, COMID AS company_code, SECID AS security_code, \
    C_SECID AS c_security_code, C_COMID AS c_company_code, TRANS_CODE AS transaction_code, \
    date(TRANS_DATE) AS transaction_date, date(PMT_DATE) AS payment_date, \
    CAST(AMOUNT AS TEXT) AS amount, CAST(C_AMOUNT AS TEXT) AS c_amount, \
    CAST(PRICE AS TEXT) AS unit_price, CAST(PUR_C_VALUE AS TEXT) AS purchase_value, \
    CAST(TOT_C_VALUE AS TEXT) AS total_value, STATUS AS status, UPDATED AS updated";

pub const PORTFOLIO_TRANSACTION_COLUMNS: &str = "TRANS_NR AS transaction_number, \
    PORID AS portfolio_code, SECID AS security_code, CAST(AMOUNT AS TEXT) AS amount, \
    CAST(PUR_C_VALUE AS TEXT) AS purchase_value, date(PUR_DATE) AS purchase_date, \
    UPDATED AS updated";

pub const RATE_COLUMNS: &str = "SECID AS security_code, date(RATE_DATE) AS rate_date, \
    CAST(RATE_CLOSE AS TEXT) AS rate_close, UPDATED AS updated";

pub const KIID_FUND_COLUMNS: &str = "FUND_CODE AS fund_code, KIID_URL_FI AS kiid_url_fi, \
    KIID_URL_SV AS kiid_url_sv, KIID_URL_EN AS kiid_url_en, RISK_LEVEL AS risk_level, \
    FUND_GROUP AS fund_group, DEPRECATED AS deprecated, UPDATED AS updated";

#[derive(QueryableByName, Debug)]
pub struct SecurityRow {
    #[diesel(sql_type = Text)]
    pub code: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub fund_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub currency: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub name_fi: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub name_sv: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub name_en: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub series_id: Option<String>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl From<SecurityRow> for SecurityRecord {
    fn from(row: SecurityRow) -> Self {
        Self {
            code: row.code,
            fund_code: row.fund_code,
            currency: row.currency,
            name_fi: row.name_fi,
            name_sv: row.name_sv,
            name_en: row.name_en,
            series_id: row.series_id,
            updated: row.updated,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct CompanyRow {
    #[diesel(sql_type = Text)]
    pub code: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub ssn: Option<String>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl From<CompanyRow> for CompanyRecord {
    fn from(row: CompanyRow) -> Self {
        Self {
            code: row.code,
            name: row.name,
            ssn: row.ssn,
            updated: row.updated,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct PortfolioRow {
    #[diesel(sql_type = Text)]
    pub code: String,
    #[diesel(sql_type = Text)]
    pub company_code: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub name: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub class: Option<i32>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl From<PortfolioRow> for PortfolioRecord {
    fn from(row: PortfolioRow) -> Self {
        Self {
            code: row.code,
            company_code: row.company_code,
            name: row.name,
            class: row.class,
            updated: row.updated,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct PortfolioLogRow {
    #[diesel(sql_type = BigInt)]
    pub transaction_number: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub portfolio_code: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub company_code: Option<String>,
    #[diesel(sql_type = Text)]
    pub security_code: String,
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
    #[diesel(sql_type = Nullable<Integer>)]
    pub status: Option<i32>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl TryFrom<PortfolioLogRow> for PortfolioLogRecord {
    type Error = Error;

    fn try_from(row: PortfolioLogRow) -> Result<Self> {
        Ok(Self {
            transaction_number: row.transaction_number,
            portfolio_code: row.portfolio_code,
            company_code: row.company_code,
            security_code: row.security_code,
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
            status: row.status.unwrap_or_default(),
            updated: row.updated,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub struct PortfolioTransactionRow {
    #[diesel(sql_type = BigInt)]
    pub transaction_number: i64,
    #[diesel(sql_type = Text)]
    pub portfolio_code: String,
    #[diesel(sql_type = Text)]
    pub security_code: String,
    #[diesel(sql_type = Text)]
    pub amount: String,
    #[diesel(sql_type = Text)]
    pub purchase_value: String,
    #[diesel(sql_type = Nullable<Date>)]
    pub purchase_date: Option<NaiveDate>,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl TryFrom<PortfolioTransactionRow> for PortfolioTransactionRecord {
    type Error = Error;

    fn try_from(row: PortfolioTransactionRow) -> Result<Self> {
        Ok(Self {
            transaction_number: row.transaction_number,
            portfolio_code: row.portfolio_code,
            security_code: row.security_code,
            amount: parse_decimal(&row.amount)?,
            purchase_value: parse_decimal(&row.purchase_value)?,
            purchase_date: row.purchase_date,
            updated: row.updated,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub struct RateRow {
    #[diesel(sql_type = Text)]
    pub security_code: String,
    #[diesel(sql_type = Date)]
    pub rate_date: NaiveDate,
    #[diesel(sql_type = Text)]
    pub rate_close: String,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl TryFrom<RateRow> for RateRecord {
    type Error = Error;

    fn try_from(row: RateRow) -> Result<Self> {
        Ok(Self {
            security_code: row.security_code,
            rate_date: row.rate_date,
            rate_close: parse_decimal(&row.rate_close)?,
            updated: row.updated,
        })
    }
}

#[derive(QueryableByName, Debug)]
pub struct AuthorizationRow {
    #[diesel(sql_type = Text)]
    pub ssn: String,
    #[diesel(sql_type = Text)]
    pub company_code: String,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl From<AuthorizationRow> for AuthorizationRecord {
    fn from(row: AuthorizationRow) -> Self {
        Self {
            ssn: row.ssn,
            company_code: row.company_code,
            updated: row.updated,
        }
    }
}

#[derive(QueryableByName, Debug)]
pub struct KiidFundRow {
    #[diesel(sql_type = Text)]
    pub fund_code: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub kiid_url_fi: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub kiid_url_sv: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub kiid_url_en: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub risk_level: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub fund_group: Option<String>,
    #[diesel(sql_type = Bool)]
    pub deprecated: bool,
    #[diesel(sql_type = Timestamp)]
    pub updated: NaiveDateTime,
}

impl From<KiidFundRow> for KiidFundRecord {
    fn from(row: KiidFundRow) -> Self {
        Self {
            fund_code: row.fund_code,
            kiid_url_fi: row.kiid_url_fi,
            kiid_url_sv: row.kiid_url_sv,
            kiid_url_en: row.kiid_url_en,
            risk_level: row.risk_level,
            group: row.fund_group,
            deprecated: row.deprecated,
            updated: row.updated,
        }
    }
}
