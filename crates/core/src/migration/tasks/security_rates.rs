use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{info, warn};

use crate::backend::{new_id, BackendSession, SecurityRate};
use crate::constants::STREAMING_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::options::MigrationOptions;
use crate::migration::resolver::require_security;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::migration::verification::{
    compare_checksums, diff_partition, RateLine, RateTable, VerifyReport,
};
use crate::source::{FundsSource, RateRecord};

/// Copies the `TABLE_RATE` price history into `security_rates`.
///
/// Rows are keyed by `(security, rate_date)`; gaps are found per security
/// from partition row counts.
pub struct SecurityRatesTask {
    source: Arc<dyn FundsSource>,
}

impl SecurityRatesTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn to_line(record: &RateRecord) -> RateLine {
    RateLine {
        table: RateTable::SecurityRates,
        security_code: record.security_code.clone(),
        rate_date: record.rate_date,
        rate_close: record.rate_close,
        updated: record.updated,
    }
}

fn apply_rate(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &RateRecord,
) -> Result<RowResult> {
    let referenced_by = format!("rate of {}", record.rate_date);
    let security_id =
        match require_security(&mut *session, ctx, &record.security_code, &referenced_by)? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };

    let existing = session.find_security_rate(&security_id, record.rate_date)?;
    let candidate = SecurityRate {
        id: existing.as_ref().map(|r| r.id.clone()).unwrap_or_else(new_id),
        security_id,
        rate_date: record.rate_date,
        rate_close: record.rate_close,
        updated: record.updated,
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_security_rate(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_security_rate(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    Ok(Ok(outcome))
}

impl SecurityRatesTask {
    /// Securities whose source partition has more rows than the destination.
    fn short_partitions(&self, session: &mut dyn BackendSession) -> Result<Vec<String>> {
        let destination: HashMap<String, i64> = session
            .security_rate_checksums()?
            .into_iter()
            .map(|c| (c.partition, c.row_count))
            .collect();
        Ok(self
            .source
            .rate_checksums()?
            .into_iter()
            .filter(|c| c.row_count > destination.get(&c.partition).copied().unwrap_or(0))
            .map(|c| c.partition)
            .collect())
    }
}

impl MigrationTask for SecurityRatesTask {
    fn name(&self) -> &'static str {
        "security_rates"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.rate_stamp()?, session.security_rate_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.security_rate_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(STREAMING_PAGE_SIZE);
        info!("security_rates: copying rows updated since {:?}", since);

        let source = self.source.as_ref();
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.rates_page(since, page),
            apply_rate,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        if source.rate_stamp()?.count == session.security_rate_stamp()?.count {
            return Ok(counts);
        }
        let partitions = self.short_partitions(&mut *session)?;
        info!("security_rates: gap pass over {} securities", partitions.len());
        for security_code in &partitions {
            if ctx.should_stop() {
                break;
            }
            let rows = source.rates_for_security(security_code)?;
            if !ctx.apply_rows(&mut *session, &rows, &mut counts, apply_rate)? {
                break;
            }
        }
        Ok(counts)
    }

    fn verify(
        &self,
        session: &mut dyn BackendSession,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<VerifyReport> {
        let source_sums = self.source.rate_checksums()?;
        let destination_sums = session.security_rate_checksums()?;
        let partitions: BTreeSet<&str> = source_sums
            .iter()
            .chain(destination_sums.iter())
            .map(|c| c.partition.as_str())
            .collect();

        let mut report = VerifyReport {
            checked_partitions: partitions.len(),
            mismatches: compare_checksums(&source_sums, &destination_sums),
            ..VerifyReport::default()
        };
        report.passed = report.mismatches.is_empty();

        for mismatch in &report.mismatches {
            warn!("security_rates: checksum mismatch for security '{}'", mismatch.partition);
            let source_lines: Vec<RateLine> = self
                .source
                .rates_for_security(&mismatch.partition)?
                .iter()
                .map(to_line)
                .collect();
            let destination_lines = session.security_rate_lines(&mismatch.partition)?;
            let suggestions = diff_partition(&source_lines, &destination_lines);
            for s in &suggestions {
                info!("security_rates: suggested repair: {}", s.statement);
            }
            report.suggestions.extend(suggestions);
        }
        Ok(report)
    }
}
