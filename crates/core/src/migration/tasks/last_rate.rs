use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use log::{info, warn};

use super::preview;
use crate::backend::{new_id, BackendSession, LastRate};
use crate::constants::STREAMING_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::options::MigrationOptions;
use crate::migration::reconcile::{missing_from_source, plan_disposable_deletion};
use crate::migration::resolver::require_security;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::migration::verification::{
    compare_checksums, diff_partition, RateLine, RateTable, VerifyReport,
};
use crate::source::{FundsSource, RateRecord};

/// Copies `TABLE_RATELAST` into `last_rates`, one row per security.
pub struct LastRateTask {
    source: Arc<dyn FundsSource>,
}

impl LastRateTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn to_line(record: &RateRecord) -> RateLine {
    RateLine {
        table: RateTable::LastRates,
        security_code: record.security_code.clone(),
        rate_date: record.rate_date,
        rate_close: record.rate_close,
        updated: record.updated,
    }
}

fn apply_last_rate(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &RateRecord,
) -> Result<RowResult> {
    let security_id =
        match require_security(&mut *session, ctx, &record.security_code, "last rate")? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };

    let existing = session.find_last_rate(&security_id)?;
    let candidate = LastRate {
        id: existing.as_ref().map(|r| r.id.clone()).unwrap_or_else(new_id),
        security_id,
        rate_date: record.rate_date,
        rate_close: record.rate_close,
        updated: record.updated,
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_last_rate(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_last_rate(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    Ok(Ok(outcome))
}

impl MigrationTask for LastRateTask {
    fn name(&self) -> &'static str {
        "last_rate"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.last_rate_stamp()?, session.last_rate_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.last_rate_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(STREAMING_PAGE_SIZE);
        info!("last_rate: copying rows updated since {:?}", since);

        let source = self.source.as_ref();
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.last_rates_page(since, page),
            apply_last_rate,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        if source.last_rate_stamp()?.count == session.last_rate_stamp()?.count {
            return Ok(counts);
        }
        let all = source.last_rates()?;
        let destination_codes: Vec<String> = session
            .last_rate_lines()?
            .into_iter()
            .map(|l| l.security_code)
            .collect();

        let plan = plan_disposable_deletion(
            destination_codes.iter().cloned(),
            all.iter().map(|r| r.security_code.clone()),
        );
        if !plan.removed.is_empty() {
            let deleted = session.delete_last_rates(&plan.removed)?;
            info!("last_rate: deleted {} rows: {}", deleted, preview(&plan.removed));
            counts.deleted += deleted as u64;
        }

        let missing: HashSet<String> = missing_from_source(
            all.iter().map(|r| r.security_code.clone()),
            destination_codes,
        )
        .into_iter()
        .collect();
        let rows: Vec<RateRecord> = all
            .into_iter()
            .filter(|r| missing.contains(&r.security_code))
            .collect();
        ctx.apply_rows(&mut *session, &rows, &mut counts, apply_last_rate)?;
        Ok(counts)
    }

    fn verify(
        &self,
        session: &mut dyn BackendSession,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<VerifyReport> {
        let source_sums = self.source.last_rate_checksums()?;
        let destination_sums = session.last_rate_checksums()?;
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
            warn!("last_rate: checksum mismatch for security '{}'", mismatch.partition);
            let source_lines: Vec<RateLine> = self
                .source
                .last_rates_for_security(&mismatch.partition)?
                .iter()
                .map(to_line)
                .collect();
            let destination_lines = session.last_rate_lines_for_security(&mismatch.partition)?;
            let suggestions = diff_partition(&source_lines, &destination_lines);
            for s in &suggestions {
                info!("last_rate: suggested repair: {}", s.statement);
            }
            report.suggestions.extend(suggestions);
        }
        Ok(report)
    }
}
