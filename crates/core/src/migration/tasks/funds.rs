use std::sync::Arc;

use log::info;

use super::{copy_by_keys, gap_keys};
use crate::backend::{new_id, BackendSession, Fund, FundGroup};
use crate::constants::REFERENCE_PAGE_SIZE;
use crate::errors::Result;
use crate::migration::errors::EntityKind;
use crate::migration::options::MigrationOptions;
use crate::migration::staleness::{window_start, DatasetStamp};
use crate::migration::task::{
    upsert_outcome, MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext,
};
use crate::source::{KiidFundRecord, KiidSource};

/// Copies KIID fund metadata into `funds`.
pub struct FundsTask {
    source: Arc<dyn KiidSource>,
}

impl FundsTask {
    pub fn new(source: Arc<dyn KiidSource>) -> Self {
        Self { source }
    }
}

fn fund_group(ctx: &mut TaskContext<'_>, record: &KiidFundRecord) -> Option<FundGroup> {
    let raw = record.group.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<FundGroup>() {
        Ok(group) => Some(group),
        Err(_) => {
            ctx.alert(format!(
                "Unknown fund group '{}' for fund '{}', stored empty",
                raw, record.fund_code
            ));
            None
        }
    }
}

fn apply_fund(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    record: &KiidFundRecord,
) -> Result<RowResult> {
    let group = fund_group(ctx, record);
    let existing = session.find_fund(&record.fund_code)?;
    let candidate = Fund {
        id: existing.as_ref().map(|f| f.id.clone()).unwrap_or_else(new_id),
        original_id: record.fund_code.clone(),
        kiid_url_fi: record.kiid_url_fi.clone(),
        kiid_url_sv: record.kiid_url_sv.clone(),
        kiid_url_en: record.kiid_url_en.clone(),
        risk_level: record.risk_level,
        group,
        deprecated: record.deprecated,
        updated: Some(record.updated),
    };

    let outcome = match upsert_outcome(existing.as_ref(), &candidate) {
        Some(RowOutcome::Created) => {
            session.insert_fund(&candidate)?;
            RowOutcome::Created
        }
        Some(outcome) => {
            session.update_fund(&candidate)?;
            outcome
        }
        None => RowOutcome::Unchanged,
    };
    ctx.cache
        .insert(EntityKind::Fund, record.fund_code.clone(), candidate.id);
    Ok(Ok(outcome))
}

impl MigrationTask for FundsTask {
    fn name(&self) -> &'static str {
        "funds"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((self.source.fund_stamp()?, session.fund_stamp()?))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let since = window_start(&session.fund_stamp()?, ctx.options.force_recheck);
        let page_size = ctx.options.page_size_or(REFERENCE_PAGE_SIZE);
        info!("funds: copying rows updated since {:?}", since);

        let source = self.source.as_ref();
        let complete = ctx.run_pages(
            &mut *session,
            since,
            page_size,
            &mut counts,
            |page| source.funds_page(since, page),
            apply_fund,
        )?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        let placeholders = session.placeholder_fund_codes()?;
        if source.fund_stamp()?.count != session.fund_stamp()?.count || !placeholders.is_empty() {
            let missing = gap_keys(source.fund_codes()?, session.fund_codes()?, placeholders);
            copy_by_keys(
                ctx,
                &mut *session,
                &missing,
                &mut counts,
                |codes| source.funds_by_codes(codes),
                apply_fund,
            )?;
        }
        Ok(counts)
    }
}
