//! Legacy table layouts and the exclusion rules shared by every source query.
//!
//! The DDL is what local replicas and test fixtures are provisioned with.
//! Decimal columns are text so no precision is lost to SQLite's REAL affinity.

use fundsync_core::constants::EXCLUDED_PORTFOLIO_CLASSES;

pub const FUNDS_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS TABLE_SECURITY (
    SECID TEXT NOT NULL PRIMARY KEY,
    FUND_CODE TEXT,
    CURRENCY TEXT,
    NAME_FI TEXT,
    NAME_SV TEXT,
    NAME_EN TEXT,
    SERIES_ID TEXT,
    UPDATED TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS TABLE_COMPANY (
    COMID TEXT NOT NULL PRIMARY KEY,
    NAME TEXT,
    SO_SEC_NR TEXT,
    UPDATED TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS TABLE_PORTFOL (
    PORID TEXT NOT NULL PRIMARY KEY,
    COMID TEXT NOT NULL,
    NAME TEXT,
    PORCLASS INTEGER,
    UPDATED TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS TABLE_PORTLOG (
    TRANS_NR INTEGER NOT NULL PRIMARY KEY,
    PORID TEXT,
    COMID TEXT,
    SECID TEXT NOT NULL,
    C_SECID TEXT,
    C_COMID TEXT,
    TRANS_CODE TEXT NOT NULL,
    TRANS_DATE DATE NOT NULL,
    PMT_DATE DATE,
    AMOUNT TEXT NOT NULL,
    C_AMOUNT TEXT,
    PRICE TEXT,
    PUR_C_VALUE TEXT,
    TOT_C_VALUE TEXT,
    STATUS INTEGER,
    UPDATED TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS TABLE_PORTRANS (
    TRANS_NR INTEGER NOT NULL PRIMARY KEY,
    PORID TEXT NOT NULL,
    SECID TEXT NOT NULL,
    AMOUNT TEXT NOT NULL,
    PUR_C_VALUE TEXT NOT NULL,
    PUR_DATE DATE,
    UPDATED TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS TABLE_RATE (
    SECID TEXT NOT NULL,
    RATE_DATE DATE NOT NULL,
    RATE_CLOSE TEXT NOT NULL,
    UPDATED TIMESTAMP NOT NULL,
    PRIMARY KEY (SECID, RATE_DATE)
);

CREATE TABLE IF NOT EXISTS TABLE_RATELAST (
    SECID TEXT NOT NULL PRIMARY KEY,
    RATE_DATE DATE NOT NULL,
    RATE_CLOSE TEXT NOT NULL,
    UPDATED TIMESTAMP NOT NULL
);
"#;

pub const AUTHORIZATION_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS "Authorization" (
    AUTH_ID INTEGER NOT NULL PRIMARY KEY,
    AUTHORIZED_SSN TEXT NOT NULL,
    COMPANY_CODE TEXT NOT NULL,
    VALID_FROM DATE,
    EXPIRES DATE,
    DENIED INTEGER NOT NULL DEFAULT 0,
    UPDATED TIMESTAMP NOT NULL
);
"#;

pub const KIID_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS KIID_FUND (
    FUND_CODE TEXT NOT NULL PRIMARY KEY,
    KIID_URL_FI TEXT,
    KIID_URL_SV TEXT,
    KIID_URL_EN TEXT,
    RISK_LEVEL INTEGER,
    FUND_GROUP TEXT,
    DEPRECATED INTEGER NOT NULL DEFAULT 0,
    UPDATED TIMESTAMP NOT NULL
);
"#;

fn excluded_classes() -> String {
    EXCLUDED_PORTFOLIO_CLASSES
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Portfolio codes in a restricted class.
pub fn excluded_portfolios() -> String {
    format!(
        "SELECT PORID FROM TABLE_PORTFOL WHERE PORCLASS IN ({})",
        excluded_classes()
    )
}

/// Companies that own portfolios, all of them restricted.
pub fn excluded_companies() -> String {
    format!(
        "SELECT COMID FROM TABLE_PORTFOL GROUP BY COMID \
         HAVING SUM(CASE WHEN PORCLASS IN ({}) THEN 0 ELSE 1 END) = 0",
        excluded_classes()
    )
}

pub fn portfolio_filter() -> String {
    format!(
        "(PORCLASS IS NULL OR PORCLASS NOT IN ({}))",
        excluded_classes()
    )
}

pub fn company_filter() -> String {
    format!("COMID NOT IN ({})", excluded_companies())
}

/// Log rows without a portfolio fall back to their company's exclusion.
pub fn portfolio_log_filter() -> String {
    format!(
        "((PORID IS NOT NULL AND PORID NOT IN ({})) \
         OR (PORID IS NULL AND (COMID IS NULL OR COMID NOT IN ({}))))",
        excluded_portfolios(),
        excluded_companies()
    )
}

pub fn portfolio_transaction_filter() -> String {
    format!("PORID NOT IN ({})", excluded_portfolios())
}

/// Grants valid on the bound date (bound twice).
pub const VALID_AUTHORIZATION: &str = "DENIED = 0 \
    AND (VALID_FROM IS NULL OR date(VALID_FROM) <= ?) \
    AND (EXPIRES IS NULL OR date(EXPIRES) > ?)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excluded_portfolios_sql() {
        assert_eq!(
            excluded_portfolios(),
            "SELECT PORID FROM TABLE_PORTFOL WHERE PORCLASS IN (3, 4, 5)"
        );
    }

    #[test]
    fn test_excluded_companies_requires_all_portfolios_restricted() {
        let sql = excluded_companies();
        assert!(sql.contains("GROUP BY COMID"));
        assert!(sql.contains("THEN 0 ELSE 1 END) = 0"));
    }

    #[test]
    fn test_log_filter_covers_both_fallbacks() {
        let sql = portfolio_log_filter();
        assert!(sql.contains(&excluded_portfolios()));
        assert!(sql.contains(&excluded_companies()));
        assert!(sql.contains("PORID IS NULL"));
    }
}
