use std::collections::HashSet;
use std::sync::Arc;

use log::info;

use super::{copy_by_keys, gap_keys, preview};
use crate::backend::{new_id, BackendSession, Portfolio};
use crate::constants::REFERENCE_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::EntityKind;
use crate::migration::options::MigrationOptions;
use crate::migration::reconcile::plan_guarded_deletion;
use crate::migration::resolver::require_company;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::source::{FundsSource, PortfolioRecord};

/// Copies `TABLE_PORTFOL` into `portfolios`, skipping restricted classes.
pub struct PortfoliosTask {
    source: Arc<dyn FundsSource>,
}

impl PortfoliosTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn apply_portfolio(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &PortfolioRecord,
) -> Result<RowResult> {
    let referenced_by = format!("portfolio '{}'", record.code);
    let company_id =
        match require_company(&mut *session, ctx, &record.company_code, &referenced_by)? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };

    let existing = session.find_portfolio(&record.code)?;
    let candidate = Portfolio {
        id: existing.as_ref().map(|p| p.id.clone()).unwrap_or_else(new_id),
        original_id: record.code.clone(),
        company_id,
        name: record.name.clone(),
        updated: Some(record.updated),
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_portfolio(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_portfolio(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    ctx.cache
        .insert(EntityKind::Portfolio, record.code.clone(), candidate.id);
    Ok(Ok(outcome))
}

impl PortfoliosTask {
    fn reconcile_deletions(
        &self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
        counts: &mut MigrateCounts,
    ) -> Result<()> {
        let in_use: HashSet<String> = session.portfolio_codes_in_use()?.into_iter().collect();
        let plan = plan_guarded_deletion(
            session.portfolio_codes()?,
            self.source.portfolio_codes()?,
            &in_use,
        );
        if !plan.protected.is_empty() {
            info!(
                "portfolios: keeping {} referenced portfolios absent from source: {}",
                plan.protected.len(),
                preview(&plan.protected)
            );
        }
        if plan.removed.is_empty() {
            return Ok(());
        }
        let deleted = session.delete_portfolios(&plan.removed)?;
        info!("portfolios: deleted {} rows: {}", deleted, preview(&plan.removed));
        for code in &plan.removed {
            ctx.cache.invalidate(EntityKind::Portfolio, code);
        }
        counts.deleted += deleted as u64;
        Ok(())
    }
}

impl MigrationTask for PortfoliosTask {
    fn name(&self) -> &'static str {
        "portfolios"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.portfolio_stamp()?, session.portfolio_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.portfolio_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(REFERENCE_PAGE_SIZE);
        info!("portfolios: copying rows updated since {:?}", since);

        let source = &self.source;
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.portfolios_page(since, page),
            apply_portfolio,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        self.reconcile_deletions(&mut *session, ctx, &mut counts)?;

        let placeholders = session.placeholder_portfolio_codes()?;
        let count_differs = source.portfolio_stamp()?.count != session.portfolio_stamp()?.count;
        if count_differs || !placeholders.is_empty() {
            let missing =
                gap_keys(source.portfolio_codes()?, session.portfolio_codes()?, placeholders);
            copy_by_keys(
                ctx,
                &mut *session,
                &missing,
                &mut counts,
                |codes| source.portfolios_by_codes(codes),
                apply_portfolio,
            )?;
        }
        Ok(counts)
    }
}
