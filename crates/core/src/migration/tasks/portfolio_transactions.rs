use std::collections::BTreeSet;
use std::sync::Arc;

use log::{info, warn};

use super::{copy_by_keys, gap_keys, preview};
use crate::backend::{new_id, BackendSession, PortfolioTransaction};
use crate::constants::STREAMING_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::{MissingEntityError, RowError};
use crate::migration::options::MigrationOptions;
use crate::migration::reconcile::plan_disposable_deletion;
use crate::migration::resolver::{require_security, resolve_portfolio};
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::migration::verification::{
    compare_checksums, diff_partition, PortfolioTransactionLine, VerifyReport,
};
use crate::source::{FundsSource, PortfolioTransactionRecord};

/// Copies `TABLE_PORTRANS` into `portfolio_transactions`.
///
/// The destination table is a disposable cache: transactions the source no
/// longer lists are deleted.
pub struct PortfolioTransactionsTask {
    source: Arc<dyn FundsSource>,
}

impl PortfolioTransactionsTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn to_line(record: &PortfolioTransactionRecord) -> PortfolioTransactionLine {
    PortfolioTransactionLine {
        transaction_number: record.transaction_number,
        security_code: record.security_code.clone(),
        portfolio_code: record.portfolio_code.clone(),
        amount: record.amount,
        purchase_value: record.purchase_value,
        purchase_date: record.purchase_date,
        updated: record.updated,
    }
}

fn portfolio_id(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    source: &dyn FundsSource,
    record: &PortfolioTransactionRecord,
) -> Result<std::result::Result<String, RowError>> {
    let code = record.portfolio_code.as_str();
    if let Some(id) = resolve_portfolio(&mut *session, ctx, code, None)? {
        return Ok(Ok(id));
    }
    // a placeholder needs the owning company, which only the source knows
    if ctx.options.create_missing_relations {
        let owner = source
            .portfolios_by_codes(&[code.to_string()])?
            .into_iter()
            .next()
            .map(|p| p.company_code);
        if let Some(id) = resolve_portfolio(&mut *session, ctx, code, owner.as_deref())? {
            return Ok(Ok(id));
        }
    }
    Ok(Err(RowError::Missing(MissingEntityError::missing_portfolio(
        code,
        format!("referenced by portfolio transaction {}", record.transaction_number),
    ))))
}

fn apply_transaction(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    source: &dyn FundsSource,
    record: &PortfolioTransactionRecord,
) -> Result<RowResult> {
    let nr = record.transaction_number;
    let portfolio_id = match portfolio_id(&mut *session, ctx, source, record)? {
        Ok(id) => id,
        Err(e) => return Ok(Err(e)),
    };
    let referenced_by = format!("portfolio transaction {}", nr);
    let security_id =
        match require_security(&mut *session, ctx, &record.security_code, &referenced_by)? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };

    let existing = session.find_portfolio_transaction(nr)?;
    let candidate = PortfolioTransaction {
        id: existing.as_ref().map(|t| t.id.clone()).unwrap_or_else(new_id),
        transaction_number: nr,
        portfolio_id,
        security_id,
        amount: record.amount,
        purchase_value: record.purchase_value,
        purchase_date: record.purchase_date,
        updated: record.updated,
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_portfolio_transaction(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_portfolio_transaction(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    Ok(Ok(outcome))
}

impl MigrationTask for PortfolioTransactionsTask {
    fn name(&self) -> &'static str {
        "portfolio_transactions"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((
            self.source.portfolio_transaction_stamp()?,
            session.portfolio_transaction_stamp()?,
        ))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(
            &session.portfolio_transaction_stamp()?,
            ctx.options.force_recheck,
        );
        let page_size = ctx.options.page_size_or(STREAMING_PAGE_SIZE);
        info!("portfolio_transactions: copying rows updated since {:?}", since);

        let source = self.source.as_ref();
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.portfolio_transactions_page(since, page),
            |s, c, r| apply_transaction(s, c, source, r),
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        let source_numbers = source.portfolio_transaction_numbers()?;
        let plan = plan_disposable_deletion(
            session.portfolio_transaction_numbers()?,
            source_numbers.iter().copied(),
        );
        if !plan.removed.is_empty() {
            let deleted = session.delete_portfolio_transactions(&plan.removed)?;
            info!(
                "portfolio_transactions: deleted {} rows: {}",
                deleted,
                preview(&plan.removed)
            );
            counts.deleted += deleted as u64;
        }

        let source_count = source.portfolio_transaction_stamp()?.count;
        if source_count != session.portfolio_transaction_stamp()?.count {
            let missing =
                gap_keys(source_numbers, session.portfolio_transaction_numbers()?, Vec::new());
            copy_by_keys(
                ctx,
                &mut *session,
                &missing,
                &mut counts,
                |numbers| source.portfolio_transactions_by_numbers(numbers),
                |s, c, r| apply_transaction(s, c, source, r),
            )?;
        }
        Ok(counts)
    }

    fn verify(
        &self,
        session: &mut dyn BackendSession,
        _ctx: &mut TaskContext<'_>,
    ) -> Result<VerifyReport> {
        let source_sums = self.source.portfolio_transaction_checksums()?;
        let destination_sums = session.portfolio_transaction_checksums()?;
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
            warn!(
                "portfolio_transactions: checksum mismatch for security '{}'",
                mismatch.partition
            );
            let source_lines: Vec<PortfolioTransactionLine> = self
                .source
                .portfolio_transactions_for_security(&mismatch.partition)?
                .iter()
                .map(to_line)
                .collect();
            let destination_lines = session.portfolio_transaction_lines(&mismatch.partition)?;
            let suggestions = diff_partition(&source_lines, &destination_lines);
            for s in &suggestions {
                info!("portfolio_transactions: suggested repair: {}", s.statement);
            }
            report.suggestions.extend(suggestions);
        }
        Ok(report)
    }
}
