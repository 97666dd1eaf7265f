//! Cheap staleness detection shared by every task.
//!
//! A dataset is summarised by its row count and latest update timestamp.
//! The legacy side keeps whole seconds only, so timestamps are rounded
//! (half up on the sub-second part) before they are compared.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Row count plus latest update of one side of a migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStamp {
    pub count: i64,
    pub last_update: Option<NaiveDateTime>,
}

impl DatasetStamp {
    pub fn new(count: i64, last_update: Option<NaiveDateTime>) -> Self {
        Self { count, last_update }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Rounds to whole seconds, half up on the fractional part.
pub fn round_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    let truncated = truncate_to_second(ts);
    if ts.nanosecond() >= 500_000_000 {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

/// Drops the fractional part of a timestamp.
pub fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Source and destination agree on both count and rounded last update.
///
/// A destination ahead of the source is stale too.
pub fn is_up_to_date(source: &DatasetStamp, destination: &DatasetStamp) -> bool {
    source.count == destination.count
        && source.last_update.map(round_to_second) == destination.last_update.map(round_to_second)
}

/// Lower bound of the incremental window: rows updated at or after the
/// destination's latest applied change, floored to the second.
///
/// `None` means "start from the beginning".
pub fn window_start(destination: &DatasetStamp, force_recheck: bool) -> Option<NaiveDateTime> {
    if force_recheck {
        return None;
    }
    destination.last_update.map(truncate_to_second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    #[test]
    fn test_round_to_second_half_up() {
        assert_eq!(round_to_second(ts(10, 0, 0, 499_999)), ts(10, 0, 0, 0));
        assert_eq!(round_to_second(ts(10, 0, 0, 500_000)), ts(10, 0, 1, 0));
        assert_eq!(round_to_second(ts(10, 0, 59, 900_000)), ts(10, 1, 0, 0));
    }

    #[test]
    fn test_is_up_to_date_requires_count_and_timestamp() {
        let source = DatasetStamp::new(3, Some(ts(10, 0, 0, 0)));

        assert!(is_up_to_date(&source, &DatasetStamp::new(3, Some(ts(10, 0, 0, 200_000)))));
        assert!(!is_up_to_date(&source, &DatasetStamp::new(2, Some(ts(10, 0, 0, 0)))));
        assert!(!is_up_to_date(&source, &DatasetStamp::new(3, Some(ts(9, 59, 59, 0)))));
        // a destination newer than the source is not trusted
        assert!(!is_up_to_date(&source, &DatasetStamp::new(3, Some(ts(10, 0, 1, 0)))));
    }

    #[test]
    fn test_empty_datasets_are_up_to_date() {
        assert!(is_up_to_date(&DatasetStamp::empty(), &DatasetStamp::empty()));
    }

    #[test]
    fn test_window_start() {
        let dest = DatasetStamp::new(1, Some(ts(10, 0, 0, 750_000)));
        assert_eq!(window_start(&dest, false), Some(ts(10, 0, 0, 0)));
        assert_eq!(window_start(&dest, true), None);
        assert_eq!(window_start(&DatasetStamp::empty(), false), None);
    }
}
