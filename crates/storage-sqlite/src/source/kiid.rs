use std::sync::Arc;

use chrono::NaiveDateTime;

use super::model::{KiidFundRow, KIID_FUND_COLUMNS};
use super::Dataset;
use crate::db::DbPool;
use fundsync_core::errors::Result;
use fundsync_core::migration::DatasetStamp;
use fundsync_core::source::{KiidFundRecord, KiidSource, Page};

fn kiid_funds() -> Dataset {
    Dataset::new("KIID_FUND", KIID_FUND_COLUMNS, "FUND_CODE")
}

/// Accessor for the KIID fund metadata dataset.
pub struct SqliteKiidSource {
    pool: Arc<DbPool>,
}

impl SqliteKiidSource {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl KiidSource for SqliteKiidSource {
    fn fund_stamp(&self) -> Result<DatasetStamp> {
        kiid_funds().stamp(&self.pool)
    }

    fn funds_page(&self, since: Option<NaiveDateTime>, page: Page) -> Result<Vec<KiidFundRecord>> {
        let rows: Vec<KiidFundRow> = kiid_funds().page(&self.pool, since, page)?;
        Ok(rows.into_iter().map(KiidFundRecord::from).collect())
    }

    fn fund_codes(&self) -> Result<Vec<String>> {
        kiid_funds().codes(&self.pool)
    }

    fn funds_by_codes(&self, codes: &[String]) -> Result<Vec<KiidFundRecord>> {
        let rows: Vec<KiidFundRow> = kiid_funds().by_codes(&self.pool, codes)?;
        Ok(rows.into_iter().map(KiidFundRecord::from).collect())
    }
}
