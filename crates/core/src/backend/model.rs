//! Backend (destination) domain models.
//!
//! Every entity carries a surrogate `id` (UUID v4 string) and the natural key
//! it was copied from. `updated` holds the source timestamp of the last
//! applied change; placeholder rows have none.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, ValidationError};

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fund classification from the KIID dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FundGroup {
    Passive,
    Active,
    Balanced,
    FixedIncome,
    Dimension,
    Spiltan,
}

impl FundGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundGroup::Passive => "PASSIVE",
            FundGroup::Active => "ACTIVE",
            FundGroup::Balanced => "BALANCED",
            FundGroup::FixedIncome => "FIXED_INCOME",
            FundGroup::Dimension => "DIMENSION",
            FundGroup::Spiltan => "SPILTAN",
        }
    }
}

impl fmt::Display for FundGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FundGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PASSIVE" => Ok(FundGroup::Passive),
            "ACTIVE" => Ok(FundGroup::Active),
            "BALANCED" => Ok(FundGroup::Balanced),
            "FIXED_INCOME" => Ok(FundGroup::FixedIncome),
            "DIMENSION" => Ok(FundGroup::Dimension),
            "SPILTAN" => Ok(FundGroup::Spiltan),
            other => Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Unknown fund group: {}",
                other
            )))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fund {
    pub id: String,
    pub original_id: String,
    pub kiid_url_fi: Option<String>,
    pub kiid_url_sv: Option<String>,
    pub kiid_url_en: Option<String>,
    pub risk_level: Option<i32>,
    pub group: Option<FundGroup>,
    pub deprecated: bool,
    pub updated: Option<NaiveDateTime>,
}

impl Fund {
    pub fn placeholder(original_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            original_id: original_id.into(),
            kiid_url_fi: None,
            kiid_url_sv: None,
            kiid_url_en: None,
            risk_level: None,
            group: None,
            deprecated: false,
            updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
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

impl Security {
    pub fn placeholder(original_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            original_id: original_id.into(),
            fund_id: None,
            currency: None,
            name_fi: None,
            name_sv: None,
            name_en: None,
            series_id: None,
            updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub original_id: String,
    pub name: Option<String>,
    pub ssn: Option<String>,
    pub updated: Option<NaiveDateTime>,
}

impl Company {
    pub fn placeholder(original_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            original_id: original_id.into(),
            name: None,
            ssn: None,
            updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub original_id: String,
    pub company_id: String,
    pub name: Option<String>,
    pub updated: Option<NaiveDateTime>,
}

impl Portfolio {
    pub fn placeholder(original_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            original_id: original_id.into(),
            company_id: company_id.into(),
            name: None,
            updated: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioLog {
    pub id: String,
    pub transaction_number: i64,
    pub security_id: String,
    pub c_security_id: Option<String>,
    pub portfolio_id: String,
    pub c_company_id: Option<String>,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTransaction {
    pub id: String,
    pub transaction_number: i64,
    pub portfolio_id: String,
    pub security_id: String,
    pub amount: Decimal,
    pub purchase_value: Decimal,
    pub purchase_date: Option<NaiveDate>,
    pub updated: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRate {
    pub id: String,
    pub security_id: String,
    pub rate_date: NaiveDate,
    pub rate_close: Decimal,
    pub updated: NaiveDateTime,
}

/// Latest close of a security; one row per security.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRate {
    pub id: String,
    pub security_id: String,
    pub rate_date: NaiveDate,
    pub rate_close: Decimal,
    pub updated: NaiveDateTime,
}

/// Third-party authorization grant; unique per `(ssn, company_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAccess {
    pub id: String,
    pub ssn: String,
    pub company_id: String,
    pub updated: NaiveDateTime,
}

/// A company access row with the company's natural key resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAccessEntry {
    pub id: String,
    pub ssn: String,
    pub company_code: String,
    pub updated: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fund_group_parse() {
        assert_eq!("fixed_income".parse::<FundGroup>().unwrap(), FundGroup::FixedIncome);
        assert_eq!(" SPILTAN ".parse::<FundGroup>().unwrap(), FundGroup::Spiltan);
        assert!("INDEX".parse::<FundGroup>().is_err());
    }

    #[test]
    fn test_fund_group_serde_matches_as_str() {
        for group in [
            FundGroup::Passive,
            FundGroup::Active,
            FundGroup::Balanced,
            FundGroup::FixedIncome,
            FundGroup::Dimension,
            FundGroup::Spiltan,
        ] {
            let json = serde_json::to_string(&group).unwrap();
            assert_eq!(json, format!("\"{}\"", group.as_str()));
        }
    }

    #[test]
    fn test_placeholders_have_fresh_ids_and_no_update() {
        let a = Security::placeholder("S1");
        let b = Security::placeholder("S1");
        assert_ne!(a.id, b.id);
        assert_eq!(a.updated, None);

        let p = Portfolio::placeholder("P1", "company-uuid");
        assert_eq!(p.company_id, "company-uuid");
    }
}
