use std::sync::Arc;

use log::info;

use super::{copy_by_keys, gap_keys};
use crate::backend::{BackendSession, Security};
use crate::constants::REFERENCE_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::EntityKind;
use crate::migration::options::MigrationOptions;
use crate::migration::resolver::resolve_fund;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::source::{FundsSource, SecurityRecord};

/// Copies `TABLE_SECURITY` into `securities`, resolving the fund reference.
pub struct SecuritiesTask {
    source: Arc<dyn FundsSource>,
}

impl SecuritiesTask {
    pub fn new(source: Arc<dyn FundsSource>) -> Self {
        Self { source }
    }
}

fn apply_security(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &SecurityRecord,
) -> Result<RowResult> {
    let fund_id = match record.fund_code.as_deref() {
        Some(code) => {
            let id = resolve_fund(&mut *session, ctx, code)?;
            if id.is_none() {
                ctx.alert(format!(
                    "Fund '{}' of security '{}' not found, fund left empty",
                    code, record.code
                ));
            }
            id
        }
        None => None,
    };

    let existing = session.find_security(&record.code)?;
    let candidate = Security {
        id: existing
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_else(crate::backend::new_id),
        original_id: record.code.clone(),
        fund_id,
        currency: record.currency.clone(),
        name_fi: record.name_fi.clone(),
        name_sv: record.name_sv.clone(),
        name_en: record.name_en.clone(),
        series_id: record.series_id.clone(),
        updated: Some(record.updated),
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_security(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_security(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    ctx.cache
        .insert(EntityKind::Security, record.code.clone(), candidate.id);
    Ok(Ok(outcome))
}

impl MigrationTask for SecuritiesTask {
    fn name(&self) -> &'static str {
        "securities"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.security_stamp()?, session.security_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.security_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(REFERENCE_PAGE_SIZE);
        info!("securities: copying rows updated since {:?}", since);

        let source = &self.source;
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.securities_page(since, page),
            apply_security,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        let placeholders = session.placeholder_security_codes()?;
        let count_differs = source.security_stamp()?.count != session.security_stamp()?.count;
        if count_differs || !placeholders.is_empty() {
            let missing =
                gap_keys(source.security_codes()?, session.security_codes()?, placeholders);
            copy_by_keys(
                ctx,
                &mut *session,
                &missing,
                &mut counts,
                |codes| source.securities_by_codes(codes),
                apply_security,
            )?;
        }
        Ok(counts)
    }
}
