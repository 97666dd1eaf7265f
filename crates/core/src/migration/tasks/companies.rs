use std::collections::HashSet;
use std::sync::Arc;

use log::info;

use super::{copy_by_keys, gap_keys, preview};
use crate::backend::{new_id, BackendSession, Company};
use crate::constants::COMPANY_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::EntityKind;
use crate::migration::options::MigrationOptions;
use crate::migration::reconcile::plan_guarded_deletion;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::source::{CompanyRecord, FundsSource};

/// Copies `TABLE_COMPANY` into `companies`.
///
/// Companies whose every portfolio is in a restricted class are left out.
/// Companies missing from the source are deleted unless something still
/// references them.
pub struct CompaniesTask {
    source: Arc<dyn FundsSource>,
}

impl CompaniesTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn apply_company(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &CompanyRecord,
) -> Result<RowResult> {
    let existing = session.find_company(&record.code)?;
    let candidate = Company {
        id: existing.as_ref().map(|c| c.id.clone()).unwrap_or_else(new_id),
        original_id: record.code.clone(),
        name: record.name.clone(),
        ssn: record.ssn.clone(),
        updated: Some(record.updated),
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_company(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_company(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    ctx.cache
        .insert(EntityKind::Company, record.code.clone(), candidate.id);
    Ok(Ok(outcome))
}

impl CompaniesTask {
    fn reconcile_deletions(
        &self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
        counts: &mut MigrateCounts,
    ) -> Result<()> {
        let in_use: HashSet<String> = session.company_codes_in_use()?.into_iter().collect();
        let plan =
            plan_guarded_deletion(session.company_codes()?, self.source.company_codes()?, &in_use);
        if !plan.protected.is_empty() {
            info!(
                "companies: keeping {} referenced companies absent from source: {}",
                plan.protected.len(),
                preview(&plan.protected)
            );
        }
        if plan.removed.is_empty() {
            return Ok(());
        }
        let deleted = session.delete_companies(&plan.removed)?;
        info!("companies: deleted {} rows: {}", deleted, preview(&plan.removed));
        for code in &plan.removed {
            ctx.cache.invalidate(EntityKind::Company, code);
        }
        counts.deleted += deleted as u64;
        Ok(())
    }
}

impl MigrationTask for CompaniesTask {
    fn name(&self) -> &'static str {
        "companies"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.company_stamp()?, session.company_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.company_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(COMPANY_PAGE_SIZE);
        info!("companies: copying rows updated since {:?}", since);

        let source = &self.source;
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.companies_page(since, page),
            apply_company,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        self.reconcile_deletions(&mut *session, ctx, &mut counts)?;

        let placeholders = session.placeholder_company_codes()?;
        let count_differs = source.company_stamp()?.count != session.company_stamp()?.count;
        if count_differs || !placeholders.is_empty() {
            let missing = gap_keys(source.company_codes()?, session.company_codes()?, placeholders);
            copy_by_keys(
                ctx,
                &mut *session,
                &missing,
                &mut counts,
                |codes| source.companies_by_codes(codes),
                apply_company,
            )?;
        }
        Ok(counts)
    }
}
