//! Aggregate rows shared by the backend and source queries.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text, Timestamp};

use crate::utils::from_micros;
use fundsync_core::migration::{DatasetStamp, PartitionChecksum};

#[derive(QueryableByName, Debug)]
pub struct StampRow {
    #[diesel(sql_type = BigInt)]
    pub row_count: i64,
    #[diesel(sql_type = Nullable<Timestamp>)]
    pub last_update: Option<NaiveDateTime>,
}

impl From<StampRow> for DatasetStamp {
    fn from(row: StampRow) -> Self {
        DatasetStamp::new(row.row_count, row.last_update)
    }
}

#[derive(QueryableByName, Debug)]
pub struct CodeRow {
    #[diesel(sql_type = Text)]
    pub code: String,
}

#[derive(QueryableByName, Debug)]
pub struct NumberRow {
    #[diesel(sql_type = BigInt)]
    pub number: i64,
}

/// One partition of a checksum query; sums are in micro-units.
#[derive(QueryableByName, Debug)]
pub struct ChecksumRow {
    #[diesel(sql_type = Text)]
    pub partition: String,
    #[diesel(sql_type = BigInt)]
    pub row_count: i64,
    #[diesel(sql_type = BigInt)]
    pub amount_micros: i64,
    #[diesel(sql_type = BigInt)]
    pub value_micros: i64,
    #[diesel(sql_type = BigInt)]
    pub minutes: i64,
}

impl From<ChecksumRow> for PartitionChecksum {
    fn from(row: ChecksumRow) -> Self {
        PartitionChecksum {
            partition: row.partition,
            row_count: row.row_count,
            amount_sum: from_micros(row.amount_micros),
            value_sum: from_micros(row.value_micros),
            date_minutes: row.minutes,
        }
    }
}
