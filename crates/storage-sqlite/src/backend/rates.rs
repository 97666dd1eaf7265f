//! Rate stores: the price history and the latest rate per security.

use chrono::NaiveDate;
use diesel::prelude::*;

use super::model::{LastRateDB, RateLineRow, SecurityRateDB};
use super::session::SqliteBackendSession;
use crate::errors::IntoCore;
use crate::schema::{last_rates, securities, security_rates};
use crate::utils::{chunk_for_sqlite, micro_sum, minute_sum};
use fundsync_core::backend::{LastRate, LastRateStore, SecurityRate, SecurityRateStore};
use fundsync_core::errors::Result;
use fundsync_core::migration::{DatasetStamp, PartitionChecksum, RateLine, RateTable};

impl SecurityRateStore for SqliteBackendSession {
    fn security_rate_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("security_rates")
    }

    fn find_security_rate(
        &mut self,
        security_id: &str,
        rate_date: NaiveDate,
    ) -> Result<Option<SecurityRate>> {
        security_rates::table
            .filter(security_rates::security_id.eq(security_id))
            .filter(security_rates::rate_date.eq(rate_date))
            .select(SecurityRateDB::as_select())
            .first::<SecurityRateDB>(self.conn())
            .optional()
            .into_core()?
            .map(SecurityRate::try_from)
            .transpose()
    }

    fn insert_security_rate(&mut self, rate: &SecurityRate) -> Result<()> {
        diesel::insert_into(security_rates::table)
            .values(SecurityRateDB::from(rate))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_security_rate(&mut self, rate: &SecurityRate) -> Result<()> {
        let db = SecurityRateDB::from(rate);
        diesel::update(security_rates::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn security_rate_checksums(&mut self) -> Result<Vec<PartitionChecksum>> {
        let sql = format!(
            "SELECT s.original_id AS partition, COUNT(*) AS row_count,
                    {} AS amount_micros, 0 AS value_micros, {} AS minutes
             FROM security_rates r JOIN securities s ON s.id = r.security_id
             GROUP BY s.original_id ORDER BY s.original_id",
            micro_sum("r.rate_close"),
            minute_sum("r.rate_date")
        );
        self.checksums_by_query(&sql)
    }

    fn security_rate_lines(&mut self, security_code: &str) -> Result<Vec<RateLine>> {
        self.load_for_security::<RateLineRow>(
            "SELECT s.original_id AS security_code, r.rate_date, r.rate_close, r.updated
             FROM security_rates r JOIN securities s ON s.id = r.security_id
             WHERE s.original_id = ?
             ORDER BY r.rate_date",
            security_code,
        )?
        .into_iter()
        .map(|row| row.into_line(RateTable::SecurityRates))
        .collect()
    }
}

impl LastRateStore for SqliteBackendSession {
    fn last_rate_stamp(&mut self) -> Result<DatasetStamp> {
        self.stamp_of("last_rates")
    }

    fn find_last_rate(&mut self, security_id: &str) -> Result<Option<LastRate>> {
        last_rates::table
            .filter(last_rates::security_id.eq(security_id))
            .select(LastRateDB::as_select())
            .first::<LastRateDB>(self.conn())
            .optional()
            .into_core()?
            .map(LastRate::try_from)
            .transpose()
    }

    fn insert_last_rate(&mut self, rate: &LastRate) -> Result<()> {
        diesel::insert_into(last_rates::table)
            .values(LastRateDB::from(rate))
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn update_last_rate(&mut self, rate: &LastRate) -> Result<()> {
        let db = LastRateDB::from(rate);
        diesel::update(last_rates::table.find(&db.id))
            .set(&db)
            .execute(self.conn())
            .into_core()?;
        Ok(())
    }

    fn last_rate_lines(&mut self) -> Result<Vec<RateLine>> {
        let rows = diesel::sql_query(
            "SELECT s.original_id AS security_code, r.rate_date, r.rate_close, r.updated
             FROM last_rates r JOIN securities s ON s.id = r.security_id
             ORDER BY s.original_id",
        )
        .load::<RateLineRow>(self.conn())
        .into_core()?;
        rows.into_iter()
            .map(|row| row.into_line(RateTable::LastRates))
            .collect()
    }

    fn last_rate_checksums(&mut self) -> Result<Vec<PartitionChecksum>> {
        let sql = format!(
            "SELECT s.original_id AS partition, COUNT(*) AS row_count,
                    {} AS amount_micros, 0 AS value_micros, {} AS minutes
             FROM last_rates r JOIN securities s ON s.id = r.security_id
             GROUP BY s.original_id ORDER BY s.original_id",
            micro_sum("r.rate_close"),
            minute_sum("r.rate_date")
        );
        self.checksums_by_query(&sql)
    }

    fn last_rate_lines_for_security(&mut self, security_code: &str) -> Result<Vec<RateLine>> {
        self.load_for_security::<RateLineRow>(
            "SELECT s.original_id AS security_code, r.rate_date, r.rate_close, r.updated
             FROM last_rates r JOIN securities s ON s.id = r.security_id
             WHERE s.original_id = ?",
            security_code,
        )?
        .into_iter()
        .map(|row| row.into_line(RateTable::LastRates))
        .collect()
    }

    fn delete_last_rates(&mut self, security_codes: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in chunk_for_sqlite(security_codes) {
            let ids = securities::table
                .filter(securities::original_id.eq_any(chunk))
                .select(securities::id);
            deleted +=
                diesel::delete(last_rates::table.filter(last_rates::security_id.eq_any(ids)))
                    .execute(self.conn())
                    .into_core()?;
        }
        Ok(deleted)
    }
}
