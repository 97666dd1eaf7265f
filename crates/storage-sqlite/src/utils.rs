//! Utility functions for SQLite storage operations.
//!
//! This module provides helpers for working with SQLite, including chunking
//! utilities to avoid parameter limits, decimal text columns and the
//! aggregate expressions used by checksums on both sides of a migration.

use std::str::FromStr;

use fundsync_core::constants::DECIMAL_PRECISION;
use fundsync_core::errors::{Error, Result, ValidationError};
use rust_decimal::Decimal;

/// Maximum number of parameters for SQLite IN (...) queries.
///
/// SQLite has a compile-time limit on the number of parameters in a SQL statement,
/// typically around 999 (SQLITE_MAX_VARIABLE_NUMBER). To stay safely under this limit
/// and leave room for other parameters in the query, we use 500 as our chunk size.
///
/// Any query that uses `IN (...)` with a potentially large list of IDs should use
/// `chunk_for_sqlite` to split the list into manageable chunks.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Chunk a slice into smaller slices for batch SQLite queries.
///
/// This function splits a slice into chunks of size `SQLITE_MAX_PARAMS_CHUNK` (500),
/// which can be used to safely execute multiple queries with `IN (...)` clauses
/// without exceeding SQLite's parameter limits.
///
/// # Example
///
/// ```ignore
/// let codes: Vec<String> = destination_codes(); // Could be > 999 items
///
/// let mut all_results = Vec::new();
/// for chunk in chunk_for_sqlite(&codes) {
///     let results = query_with_in_clause(chunk)?;
///     all_results.extend(results);
/// }
/// ```
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

/// `?, ?, ?` for an `IN (...)` list of `n` parameters.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Parses a decimal stored as text, accepting scientific notation written by
/// older replicas.
pub fn parse_decimal(raw: &str) -> Result<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| {
            Error::Validation(ValidationError::InvalidInput(format!(
                "invalid decimal '{}': {}",
                raw, e
            )))
        })
}

pub fn parse_optional_decimal(raw: Option<&str>) -> Result<Option<Decimal>> {
    raw.map(parse_decimal).transpose()
}

/// Decimal to its text column form, keeping the scale it arrived with.
pub fn decimal_text(value: &Decimal) -> String {
    value.to_string()
}

/// Converts an aggregate computed by [`micro_sum`] back to a decimal.
pub fn from_micros(micros: i64) -> Decimal {
    Decimal::new(micros, DECIMAL_PRECISION)
}

/// Exact sum of a decimal column, in micro-units.
pub fn micro_sum(column: &str) -> String {
    format!(
        "COALESCE(SUM(CAST(ROUND({c} * 1000000) AS INTEGER)), 0)",
        c = column
    )
}

/// Sum of a date column in minutes since the epoch; NULL and pre-epoch dates
/// count as zero.
pub fn minute_sum(column: &str) -> String {
    format!(
        "COALESCE(SUM(CASE WHEN {c} IS NULL OR date({c}) < '1970-01-01' THEN 0 \
         ELSE CAST(strftime('%s', date({c})) AS INTEGER) / 60 END), 0)",
        c = column
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_for_sqlite_empty() {
        let items: Vec<i32> = vec![];
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_chunk_for_sqlite_under_limit() {
        let items: Vec<i32> = (0..100).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn test_chunk_for_sqlite_exact_limit() {
        let items: Vec<i32> = (0..SQLITE_MAX_PARAMS_CHUNK as i32).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
    }

    #[test]
    fn test_chunk_for_sqlite_over_limit() {
        let items: Vec<i32> = (0..1200).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK); // 500
        assert_eq!(chunks[1].len(), SQLITE_MAX_PARAMS_CHUNK); // 500
        assert_eq!(chunks[2].len(), 200); // remaining 200
    }

    #[test]
    fn test_chunk_for_sqlite_multiple_exact_chunks() {
        let items: Vec<i32> = (0..(SQLITE_MAX_PARAMS_CHUNK * 2) as i32).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
        assert_eq!(chunks[1].len(), SQLITE_MAX_PARAMS_CHUNK);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_parse_decimal_keeps_scale() {
        let d = parse_decimal("10.50").unwrap();
        assert_eq!(d.scale(), 2);
        assert_eq!(decimal_text(&d), "10.50");
        assert_eq!(parse_decimal(" -5 ").unwrap(), Decimal::new(-5, 0));
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("1.5e2").unwrap(), Decimal::new(150, 0));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        let err = parse_decimal("ten").unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidInput(_))));
    }

    #[test]
    fn test_from_micros() {
        assert_eq!(from_micros(25_000_000), Decimal::new(25, 0));
        assert_eq!(from_micros(-1), Decimal::new(-1, 6));
    }

    #[test]
    fn test_aggregate_expressions() {
        assert_eq!(
            micro_sum("AMOUNT"),
            "COALESCE(SUM(CAST(ROUND(AMOUNT * 1000000) AS INTEGER)), 0)"
        );
        let minutes = minute_sum("PMT_DATE");
        assert!(minutes.contains("date(PMT_DATE) < '1970-01-01'"));
        assert!(minutes.contains("strftime('%s', date(PMT_DATE))"));
    }
}
