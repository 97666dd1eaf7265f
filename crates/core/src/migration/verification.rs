//! Aggregate checksums and repair suggestions.
//!
//! Verification compares per-partition aggregates of both sides and descends
//! into a row-level diff only for the partitions that disagree. The diff is
//! rendered as literal SQL for a human to review; nothing here is executed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregates of one partition (usually one security).
///
/// Decimal sums are exact at the ledger scale; `date_minutes` is the sum of
/// minutes since the epoch of the partition's date column with NULL as 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionChecksum {
    pub partition: String,
    pub row_count: i64,
    pub amount_sum: Decimal,
    pub value_sum: Decimal,
    pub date_minutes: i64,
}

impl PartitionChecksum {
    pub fn empty(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            row_count: 0,
            amount_sum: Decimal::ZERO,
            value_sum: Decimal::ZERO,
            date_minutes: 0,
        }
    }

    fn agrees_with(&self, other: &PartitionChecksum) -> bool {
        self.row_count == other.row_count
            && self.amount_sum == other.amount_sum
            && self.value_sum == other.value_sum
            && self.date_minutes == other.date_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumMismatch {
    pub partition: String,
    pub source: PartitionChecksum,
    pub destination: PartitionChecksum,
}

/// Partitions whose aggregates differ, including partitions present on one
/// side only. Sorted by partition.
pub fn compare_checksums(
    source: &[PartitionChecksum],
    destination: &[PartitionChecksum],
) -> Vec<ChecksumMismatch> {
    let src: BTreeMap<&str, &PartitionChecksum> =
        source.iter().map(|c| (c.partition.as_str(), c)).collect();
    let dst: BTreeMap<&str, &PartitionChecksum> =
        destination.iter().map(|c| (c.partition.as_str(), c)).collect();
    let partitions: BTreeSet<&str> = src.keys().chain(dst.keys()).copied().collect();

    partitions
        .into_iter()
        .filter_map(|p| {
            let s = src
                .get(p)
                .map(|c| (*c).clone())
                .unwrap_or_else(|| PartitionChecksum::empty(p));
            let d = dst
                .get(p)
                .map(|c| (*c).clone())
                .unwrap_or_else(|| PartitionChecksum::empty(p));
            if s.agrees_with(&d) {
                None
            } else {
                Some(ChecksumMismatch {
                    partition: p.to_string(),
                    source: s,
                    destination: d,
                })
            }
        })
        .collect()
}

/// Minutes since the Unix epoch at midnight of `date`.
pub fn date_minutes(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp().div_euclid(60))
        .unwrap_or(0)
}

// =============================================================================
// SQL literals
// =============================================================================

/// A value rendered into a suggested statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlLiteral {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// Surrogate id of another backend row, looked up by its natural id.
    Reference {
        table: &'static str,
        original_id: String,
    },
}

impl SqlLiteral {
    pub fn text(value: Option<&str>) -> Self {
        value.map_or(SqlLiteral::Null, |v| SqlLiteral::Text(v.to_string()))
    }

    pub fn decimal(value: Option<Decimal>) -> Self {
        value.map_or(SqlLiteral::Null, SqlLiteral::Decimal)
    }

    pub fn date(value: Option<NaiveDate>) -> Self {
        value.map_or(SqlLiteral::Null, SqlLiteral::Date)
    }

    pub fn reference(table: &'static str, original_id: Option<&str>) -> Self {
        original_id.map_or(SqlLiteral::Null, |id| SqlLiteral::Reference {
            table,
            original_id: id.to_string(),
        })
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for SqlLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlLiteral::Null => f.write_str("NULL"),
            SqlLiteral::Text(v) => f.write_str(&quote(v)),
            SqlLiteral::Integer(v) => write!(f, "{}", v),
            SqlLiteral::Decimal(v) => write!(f, "{}", v),
            SqlLiteral::Date(v) => f.write_str(&quote(&v.format("%Y-%m-%d").to_string())),
            SqlLiteral::Timestamp(v) => f.write_str(&quote(&v.format("%F %T%.f").to_string())),
            SqlLiteral::Reference { table, original_id } => write!(
                f,
                "(SELECT id FROM {} WHERE original_id = {})",
                table,
                quote(original_id)
            ),
        }
    }
}

// =============================================================================
// Ledger lines
// =============================================================================

/// A row of a verified table, expressed with natural keys only.
pub trait LedgerLine {
    fn table(&self) -> &'static str;

    /// Columns identifying the row inside its table.
    fn key(&self) -> Vec<(&'static str, SqlLiteral)>;

    /// Every other compared column.
    fn columns(&self) -> Vec<(&'static str, SqlLiteral)>;
}

/// Natural-key view of a `portfolio_logs` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioLogLine {
    pub transaction_number: i64,
    pub security_code: String,
    pub portfolio_code: String,
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

impl LedgerLine for PortfolioLogLine {
    fn table(&self) -> &'static str {
        "portfolio_logs"
    }

    fn key(&self) -> Vec<(&'static str, SqlLiteral)> {
        vec![("transaction_number", SqlLiteral::Integer(self.transaction_number))]
    }

    fn columns(&self) -> Vec<(&'static str, SqlLiteral)> {
        vec![
            (
                "security_id",
                SqlLiteral::reference("securities", Some(self.security_code.as_str())),
            ),
            (
                "portfolio_id",
                SqlLiteral::reference("portfolios", Some(self.portfolio_code.as_str())),
            ),
            (
                "c_security_id",
                SqlLiteral::reference("securities", self.c_security_code.as_deref()),
            ),
            (
                "c_company_id",
                SqlLiteral::reference("companies", self.c_company_code.as_deref()),
            ),
            ("transaction_code", SqlLiteral::Text(self.transaction_code.clone())),
            ("transaction_date", SqlLiteral::Date(self.transaction_date)),
            ("payment_date", SqlLiteral::date(self.payment_date)),
            ("amount", SqlLiteral::Decimal(self.amount)),
            ("c_amount", SqlLiteral::decimal(self.c_amount)),
            ("unit_price", SqlLiteral::decimal(self.unit_price)),
            ("purchase_value", SqlLiteral::decimal(self.purchase_value)),
            ("total_value", SqlLiteral::decimal(self.total_value)),
            ("status", SqlLiteral::Integer(i64::from(self.status))),
            ("updated", SqlLiteral::Timestamp(self.updated)),
        ]
    }
}

/// Natural-key view of a `portfolio_transactions` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTransactionLine {
    pub transaction_number: i64,
    pub security_code: String,
    pub portfolio_code: String,
    pub amount: Decimal,
    pub purchase_value: Decimal,
    pub purchase_date: Option<NaiveDate>,
    pub updated: NaiveDateTime,
}

impl LedgerLine for PortfolioTransactionLine {
    fn table(&self) -> &'static str {
        "portfolio_transactions"
    }

    fn key(&self) -> Vec<(&'static str, SqlLiteral)> {
        vec![("transaction_number", SqlLiteral::Integer(self.transaction_number))]
    }

    fn columns(&self) -> Vec<(&'static str, SqlLiteral)> {
        vec![
            (
                "security_id",
                SqlLiteral::reference("securities", Some(self.security_code.as_str())),
            ),
            (
                "portfolio_id",
                SqlLiteral::reference("portfolios", Some(self.portfolio_code.as_str())),
            ),
            ("amount", SqlLiteral::Decimal(self.amount)),
            ("purchase_value", SqlLiteral::Decimal(self.purchase_value)),
            ("purchase_date", SqlLiteral::date(self.purchase_date)),
            ("updated", SqlLiteral::Timestamp(self.updated)),
        ]
    }
}

/// Which rate table a [`RateLine`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateTable {
    SecurityRates,
    LastRates,
}

/// Natural-key view of a `security_rates` or `last_rates` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLine {
    pub table: RateTable,
    pub security_code: String,
    pub rate_date: NaiveDate,
    pub rate_close: Decimal,
    pub updated: NaiveDateTime,
}

impl LedgerLine for RateLine {
    fn table(&self) -> &'static str {
        match self.table {
            RateTable::SecurityRates => "security_rates",
            RateTable::LastRates => "last_rates",
        }
    }

    fn key(&self) -> Vec<(&'static str, SqlLiteral)> {
        let security = (
            "security_id",
            SqlLiteral::reference("securities", Some(self.security_code.as_str())),
        );
        match self.table {
            RateTable::SecurityRates => {
                vec![security, ("rate_date", SqlLiteral::Date(self.rate_date))]
            }
            RateTable::LastRates => vec![security],
        }
    }

    fn columns(&self) -> Vec<(&'static str, SqlLiteral)> {
        let mut columns = match self.table {
            RateTable::SecurityRates => Vec::new(),
            RateTable::LastRates => vec![("rate_date", SqlLiteral::Date(self.rate_date))],
        };
        columns.push(("rate_close", SqlLiteral::Decimal(self.rate_close)));
        columns.push(("updated", SqlLiteral::Timestamp(self.updated)));
        columns
    }
}

// =============================================================================
// Repair suggestions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairKind {
    Insert,
    Update,
    Delete,
}

/// A suggested statement; diagnostic text, never executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSuggestion {
    pub kind: RepairKind,
    pub table: String,
    pub key: String,
    pub statement: String,
}

fn render_key(key: &[(&'static str, SqlLiteral)]) -> String {
    key.iter()
        .map(|(_, v)| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_where(key: &[(&'static str, SqlLiteral)]) -> String {
    key.iter()
        .map(|(c, v)| match v {
            SqlLiteral::Null => format!("{} IS NULL", c),
            _ => format!("{} = {}", c, v),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn suggest_insert<L: LedgerLine>(line: &L) -> RepairSuggestion {
    let key = line.key();
    let all: Vec<(&'static str, SqlLiteral)> =
        key.iter().cloned().chain(line.columns()).collect();
    let names = all.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", ");
    let values = all
        .iter()
        .map(|(_, v)| v.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    RepairSuggestion {
        kind: RepairKind::Insert,
        table: line.table().to_string(),
        key: render_key(&key),
        statement: format!(
            "INSERT INTO {} (id, {}) VALUES ('{}', {});",
            line.table(),
            names,
            Uuid::new_v4(),
            values
        ),
    }
}

pub fn suggest_delete<L: LedgerLine>(line: &L) -> RepairSuggestion {
    let key = line.key();
    RepairSuggestion {
        kind: RepairKind::Delete,
        table: line.table().to_string(),
        key: render_key(&key),
        statement: format!("DELETE FROM {} WHERE {};", line.table(), render_where(&key)),
    }
}

/// `None` when the lines agree on every compared column.
pub fn suggest_update<L: LedgerLine>(source: &L, destination: &L) -> Option<RepairSuggestion> {
    let current = destination.columns();
    let assignments: Vec<String> = source
        .columns()
        .into_iter()
        .filter(|(col, value)| {
            current
                .iter()
                .find(|(c, _)| c == col)
                .map_or(true, |(_, v)| v != value)
        })
        .map(|(col, value)| format!("{} = {}", col, value))
        .collect();
    if assignments.is_empty() {
        return None;
    }
    let key = source.key();
    Some(RepairSuggestion {
        kind: RepairKind::Update,
        table: source.table().to_string(),
        key: render_key(&key),
        statement: format!(
            "UPDATE {} SET {} WHERE {};",
            source.table(),
            assignments.join(", "),
            render_where(&key)
        ),
    })
}

/// Row-level diff of one mismatched partition.
pub fn diff_partition<L: LedgerLine>(source: &[L], destination: &[L]) -> Vec<RepairSuggestion> {
    let src: BTreeMap<String, &L> = source.iter().map(|l| (render_key(&l.key()), l)).collect();
    let dst: BTreeMap<String, &L> = destination
        .iter()
        .map(|l| (render_key(&l.key()), l))
        .collect();

    let mut suggestions = Vec::new();
    for (key, line) in &src {
        match dst.get(key) {
            None => suggestions.push(suggest_insert(*line)),
            Some(current) => suggestions.extend(suggest_update(*line, *current)),
        }
    }
    for (key, line) in &dst {
        if !src.contains_key(key) {
            suggestions.push(suggest_delete(*line));
        }
    }
    suggestions
}

/// Result of one task's verify step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub passed: bool,
    pub checked_partitions: usize,
    pub mismatches: Vec<ChecksumMismatch>,
    pub suggestions: Vec<RepairSuggestion>,
    pub notes: Vec<String>,
}

impl VerifyReport {
    pub fn passed() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn failed(note: impl Into<String>) -> Self {
        Self {
            passed: false,
            notes: vec![note.into()],
            ..Self::default()
        }
    }
}
