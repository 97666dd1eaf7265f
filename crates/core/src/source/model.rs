//! Legacy source records.
//!
//! One struct per legacy table, decoded once at the query boundary by the
//! storage layer. Field names follow the backend vocabulary; the storage
//! layer owns the mapping from the legacy column names.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A window of rows requested from a paged source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

/// `TABLE_SECURITY` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRecord {
    pub code: String,
    pub fund_code: Option<String>,
    pub currency: Option<String>,
    pub name_fi: Option<String>,
    pub name_sv: Option<String>,
    pub name_en: Option<String>,
    pub series_id: Option<String>,
    pub updated: NaiveDateTime,
}

/// `TABLE_COMPANY` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRecord {
    pub code: String,
    pub name: Option<String>,
    pub ssn: Option<String>,
    pub updated: NaiveDateTime,
}

/// `TABLE_PORTFOL` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioRecord {
    pub code: String,
    pub company_code: String,
    pub name: Option<String>,
    pub class: Option<i32>,
    pub updated: NaiveDateTime,
}

/// `TABLE_PORTLOG` row.
///
/// `portfolio_code` may be missing on old rows; the owning company is always
/// recorded and is used to find the portfolio in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioLogRecord {
    pub transaction_number: i64,
    pub portfolio_code: Option<String>,
    pub company_code: Option<String>,
    pub security_code: String,
    pub c_security_code: Option<String>,
    pub c_company_code: Option<String>,
    pub transaction_code: String,
    pub transaction_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub c_amount: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub purchase_value: Option<Decimal>,
    pub total_value: Option<Decimal>,
    pub status: i32,
    pub updated: NaiveDateTime,
}

/// `TABLE_PORTRANS` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTransactionRecord {
    pub transaction_number: i64,
    pub portfolio_code: String,
    pub security_code: String,
    pub amount: Decimal,
    pub purchase_value: Decimal,
    pub purchase_date: Option<NaiveDate>,
    pub updated: NaiveDateTime,
}

/// `TABLE_RATE` and `TABLE_RATELAST` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub security_code: String,
    pub rate_date: NaiveDate,
    pub rate_close: Decimal,
    pub updated: NaiveDateTime,
}

/// A currently valid `(ssn, company)` grant from the `Authorization` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRecord {
    pub ssn: String,
    pub company_code: String,
    pub updated: NaiveDateTime,
}

/// `KIID_FUND` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KiidFundRecord {
    pub fund_code: String,
    pub kiid_url_fi: Option<String>,
    pub kiid_url_sv: Option<String>,
    pub kiid_url_en: Option<String>,
    pub risk_level: Option<i32>,
    pub group: Option<String>,
    pub deprecated: bool,
    pub updated: NaiveDateTime,
}

/// A source row carrying the timestamp that drives incremental copies.
pub trait SourceRecord {
    fn updated(&self) -> NaiveDateTime;
}

macro_rules! source_record {
    ($($record:ty),+ $(,)?) => {
        $(
            impl SourceRecord for $record {
                fn updated(&self) -> NaiveDateTime {
                    self.updated
                }
            }
        )+
    };
}

source_record!(
    SecurityRecord,
    CompanyRecord,
    PortfolioRecord,
    PortfolioLogRecord,
    PortfolioTransactionRecord,
    RateRecord,
    AuthorizationRecord,
    KiidFundRecord,
);

/// Payment dates before the epoch are placeholders in the legacy ledger.
pub fn normalize_payment_date(date: Option<NaiveDate>) -> Option<NaiveDate> {
    date.filter(|d| *d >= NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_payment_date() {
        let before = NaiveDate::from_ymd_opt(1969, 12, 31);
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1);
        let later = NaiveDate::from_ymd_opt(2021, 3, 4);

        assert_eq!(normalize_payment_date(before), None);
        assert_eq!(normalize_payment_date(epoch), epoch);
        assert_eq!(normalize_payment_date(later), later);
        assert_eq!(normalize_payment_date(None), None);
    }
}
