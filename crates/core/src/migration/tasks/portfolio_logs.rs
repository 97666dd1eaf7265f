use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{info, warn};

use super::{copy_by_keys, gap_keys, preview};
use crate::backend::{new_id, BackendSession, PortfolioLog};
use crate::constants::STREAMING_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::{MissingEntityError, RowError};
use crate::migration::options::MigrationOptions;
use crate::migration::reconcile::missing_from_source;
use crate::migration::resolver::{
    require_portfolio, require_security, resolve_company, resolve_security,
};
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::migration::verification::{
    compare_checksums, diff_partition, PortfolioLogLine, VerifyReport,
};
use crate::source::{normalize_payment_date, FundsSource, PortfolioLogRecord};

/// Copies the `TABLE_PORTLOG` ledger into `portfolio_logs`.
///
/// The ledger is append/update only. A destination row whose transaction
/// number has left the source is deleted on its own, with an alert; the
/// table is never cleared in bulk.
pub struct PortfolioLogsTask {
    source: Arc<dyn FundsSource>,
}

impl PortfolioLogsTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

/// Finds the legacy portfolio of a log row, falling back to the company's
/// only portfolio when the row has none.
struct PortfolioLookup<'s> {
    source: &'s dyn FundsSource,
    by_company: HashMap<String, Vec<String>>,
}

impl<'s> PortfolioLookup<'s> {
    fn new(source: &'s dyn FundsSource) -> Self {
        Self {
            source,
            by_company: HashMap::new(),
        }
    }

    fn portfolio_code(
        &mut self,
        record: &PortfolioLogRecord,
    ) -> Result<std::result::Result<String, RowError>> {
        if let Some(code) = &record.portfolio_code {
            return Ok(Ok(code.clone()));
        }
        let Some(company) = record.company_code.as_deref() else {
            return Ok(Err(RowError::Missing(MissingEntityError::missing_portfolio(
                record.transaction_number.to_string(),
                "log row has neither portfolio nor company",
            ))));
        };
        if !self.by_company.contains_key(company) {
            let candidates = self.source.portfolio_codes_for_company(company)?;
            self.by_company.insert(company.to_string(), candidates);
        }
        let candidates = self.by_company.get(company).map(Vec::as_slice).unwrap_or_default();
        match candidates {
            [only] => Ok(Ok(only.clone())),
            [] => Ok(Err(RowError::Missing(MissingEntityError::missing_portfolio(
                company,
                format!(
                    "company has no portfolio for log {}",
                    record.transaction_number
                ),
            )))),
            many => Ok(Err(RowError::AmbiguousPortfolio {
                company: company.to_string(),
                candidates: many.len(),
            })),
        }
    }
}

fn to_line(record: &PortfolioLogRecord, portfolio_code: String) -> PortfolioLogLine {
    PortfolioLogLine {
        transaction_number: record.transaction_number,
        security_code: record.security_code.clone(),
        portfolio_code,
        c_security_code: record.c_security_code.clone(),
        c_company_code: record.c_company_code.clone(),
        transaction_code: record.transaction_code.clone(),
        transaction_date: record.transaction_date,
        payment_date: normalize_payment_date(record.payment_date),
        amount: record.amount,
        c_amount: record.c_amount,
        unit_price: record.unit_price,
        purchase_value: record.purchase_value,
        total_value: record.total_value,
        status: record.status,
        updated: record.updated,
    }
}

/// Optional reference; an unresolved code is stored as NULL with an alert.
fn optional_reference(
    ctx: &mut TaskContext<'_>,
    resolved: Option<String>,
    what: &str,
    code: &str,
    transaction_number: i64,
) -> Option<String> {
    if resolved.is_none() {
        ctx.alert(format!(
            "{} '{}' of log {} not found, left empty",
            what, code, transaction_number
        ));
    }
    resolved
}

fn apply_log(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    lookup: &mut PortfolioLookup<'_>,
    record: &PortfolioLogRecord,
) -> Result<RowResult> {
    let nr = record.transaction_number;
    let referenced_by = format!("portfolio log {}", nr);

    let portfolio_code = match lookup.portfolio_code(record)? {
        Ok(code) => code,
        Err(e) => return Ok(Err(e)),
    };
    let portfolio_id = match require_portfolio(
        &mut *session,
        ctx,
        &portfolio_code,
        record.company_code.as_deref(),
        &referenced_by,
    )? {
        Ok(id) => id,
        Err(e) => return Ok(Err(e)),
    };
    let security_id =
        match require_security(&mut *session, ctx, &record.security_code, &referenced_by)? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };
    let c_security_id = match record.c_security_code.as_deref() {
        Some(code) => {
            let resolved = resolve_security(&mut *session, ctx, code)?;
            optional_reference(ctx, resolved, "Counter security", code, nr)
        }
        None => None,
    };
    let c_company_id = match record.c_company_code.as_deref() {
        Some(code) => {
            let resolved = resolve_company(&mut *session, ctx, code)?;
            optional_reference(ctx, resolved, "Counter company", code, nr)
        }
        None => None,
    };

    let existing = session.find_portfolio_log(nr)?;
    let candidate = PortfolioLog {
        id: existing.as_ref().map(|l| l.id.clone()).unwrap_or_else(new_id),
        transaction_number: nr,
        security_id,
        c_security_id,
        portfolio_id,
        c_company_id,
        transaction_code: record.transaction_code.clone(),
        transaction_date: record.transaction_date,
        payment_date: normalize_payment_date(record.payment_date),
        amount: record.amount,
        c_amount: record.c_amount,
        unit_price: record.unit_price,
        purchase_value: record.purchase_value,
        total_value: record.total_value,
        status: record.status,
        updated: record.updated,
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_portfolio_log(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_portfolio_log(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    Ok(Ok(outcome))
}

impl MigrationTask for PortfolioLogsTask {
    fn name(&self) -> &'static str {
        "portfolio_logs"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.portfolio_log_stamp()?, session.portfolio_log_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.portfolio_log_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(STREAMING_PAGE_SIZE);
        info!("portfolio_logs: copying rows updated since {:?}", since);

        let source = self.source.as_ref();
        let mut lookup = PortfolioLookup::new(source);
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.portfolio_logs_page(since, page),
            |s, c, r| apply_log(s, c, &mut lookup, r),
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        if source.portfolio_log_stamp()?.count == session.portfolio_log_stamp()?.count {
            return Ok(counts);
        }
        let source_numbers = source.portfolio_log_numbers()?;
        let destination_numbers = session.portfolio_log_numbers()?;

        let orphans = missing_from_source(
            destination_numbers.iter().copied(),
            source_numbers.iter().copied(),
        );
        if !orphans.is_empty() {
            ctx.alert(format!(
                "deleting {} portfolio log rows that are no longer in the source: {}",
                orphans.len(),
                preview(&orphans)
            ));
            for nr in &orphans {
                if ctx.should_stop() {
                    return Ok(counts);
                }
                if session.delete_portfolio_log(*nr)? {
                    counts.deleted += 1;
                }
                ctx.tick(&mut *session)?;
            }
        }

        let missing = gap_keys(source_numbers, destination_numbers, Vec::new());
        copy_by_keys(
            ctx,
            &mut *session,
            &missing,
            &mut counts,
            |numbers| source.portfolio_logs_by_numbers(numbers),
            |s, c, r| apply_log(s, c, &mut lookup, r),
        )?;
        Ok(counts)
    }

    fn verify(
        &self,
        session: &mut dyn BackendSession,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<VerifyReport> {
        let source_sums = self.source.portfolio_log_checksums()?;
        let destination_sums = session.portfolio_log_checksums()?;
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

        let mut lookup = PortfolioLookup::new(self.source.as_ref());
        for mismatch in &report.mismatches {
            warn!(
                "portfolio_logs: checksum mismatch for security '{}': source {:?} destination {:?}",
                mismatch.partition, mismatch.source, mismatch.destination
            );
            let mut source_lines = Vec::new();
            for record in self.source.portfolio_logs_for_security(&mismatch.partition)? {
                match lookup.portfolio_code(&record)? {
                    Ok(code) => source_lines.push(to_line(&record, code)),
                    Err(e) => report
                        .notes
                        .push(format!("log {}: {}", record.transaction_number, e)),
                }
            }
            let destination_lines = session.portfolio_log_lines(&mismatch.partition)?;
            let suggestions = diff_partition(&source_lines, &destination_lines);
            for s in &suggestions {
                info!("portfolio_logs: suggested repair: {}", s.statement);
            }
            report.suggestions.extend(suggestions);
        }
        Ok(report)
    }
}
