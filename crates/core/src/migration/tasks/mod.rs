//! Concrete per-entity tasks and the helpers they share.

mod companies;
mod company_access;
mod funds;
mod last_rate;
mod portfolio_logs;
mod portfolio_transactions;
mod portfolios;
mod securities;
mod security_rates;

pub use companies::CompaniesTask;
pub use company_access::CompanyAccessTask;
pub use funds::FundsTask;
pub use last_rate::LastRateTask;
pub use portfolio_logs::PortfolioLogsTask;
pub use portfolio_transactions::PortfolioTransactionsTask;
pub use portfolios::PortfoliosTask;
pub use securities::SecuritiesTask;
pub use security_rates::SecurityRatesTask;

use std::collections::HashSet;
use std::hash::Hash;

use log::info;

use super::reconcile::missing_from_source;
use super::task::{MigrateCounts, RowResult, TaskContext};
use crate::backend::BackendSession;
use crate::constants::KEY_CHUNK_SIZE;
use crate::errors::Result;

/// Source keys the destination lacks, plus destination placeholders the
/// source can fill in.
pub(crate) fn gap_keys<K>(source: Vec<K>, destination: Vec<K>, placeholders: Vec<K>) -> Vec<K>
where
    K: Eq + Hash + Ord + Clone,
{
    let source_set: HashSet<K> = source.iter().cloned().collect();
    let mut keys = missing_from_source(source, destination);
    keys.extend(placeholders.into_iter().filter(|k| source_set.contains(k)));
    keys.sort();
    keys.dedup();
    keys
}

/// Fetches rows by key in chunks and applies them.
///
/// Returns `false` when the invocation had to stop early.
pub(crate) fn copy_by_keys<'a, K, R>(
    ctx: &mut TaskContext<'a>,
    session: &mut dyn BackendSession,
    keys: &[K],
    counts: &mut MigrateCounts,
    mut fetch: impl FnMut(&[K]) -> Result<Vec<R>>,
    mut apply: impl FnMut(&mut dyn BackendSession, &mut TaskContext<'a>, &R) -> Result<RowResult>,
) -> Result<bool> {
    if keys.is_empty() {
        return Ok(true);
    }
    info!("{}: gap pass over {} keys", ctx.task, keys.len());
    for chunk in keys.chunks(KEY_CHUNK_SIZE) {
        if ctx.should_stop() {
            return Ok(false);
        }
        let rows = fetch(chunk)?;
        if !ctx.apply_rows(&mut *session, &rows, counts, &mut apply)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Short preview of a key list for alerts.
pub(crate) fn preview<K: std::fmt::Display>(keys: &[K]) -> String {
    const SHOWN: usize = 10;
    let mut out = keys
        .iter()
        .take(SHOWN)
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > SHOWN {
        out.push_str(&format!(", ... ({} more)", keys.len() - SHOWN));
    }
    out
}
