use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::info;

use crate::backend::{new_id, BackendSession, CompanyAccess, CompanyAccessEntry};
use crate::errors::Result;
use crate::migration::options::MigrationOptions;
use crate::migration::resolver::require_company;
use crate::migration::staleness::DatasetStamp;
use crate::migration::task::{MigrateCounts, MigrationTask, RowOutcome, RowResult, TaskContext};
use crate::source::{AuthorizationRecord, AuthorizationSource};

/// Resynchronises `company_access` from the currently valid grants of the
/// authorization source. Grants that are no longer valid are removed.
pub struct CompanyAccessTask {
    source: Arc<dyn AuthorizationSource>,
}

impl CompanyAccessTask {
    pub fn new(source: Arc<dyn AuthorizationSource>) -> Self {
        Self { source }
    }
}

type GrantKey = (String, String);

fn apply_grant(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    existing: &HashMap<GrantKey, CompanyAccessEntry>,
    grant: &AuthorizationRecord,
) -> Result<RowResult> {
    let referenced_by = format!("access grant of {}", grant.ssn);
    let company_id =
        match require_company(&mut *session, ctx, &grant.company_code, &referenced_by)? {
            Ok(id) => id,
            Err(e) => return Ok(Err(e)),
        };

    let key = (grant.ssn.clone(), grant.company_code.clone());
    match existing.get(&key) {
        None => {
            session.insert_company_access(&CompanyAccess {
                id: new_id(),
                ssn: grant.ssn.clone(),
                company_id,
                updated: grant.updated,
            })?;
            Ok(Ok(RowOutcome::Created))
        }
        Some(entry) if entry.updated != grant.updated => {
            session.update_company_access(&CompanyAccess {
                id: entry.id.clone(),
                ssn: grant.ssn.clone(),
                company_id,
                updated: grant.updated,
            })?;
            Ok(Ok(RowOutcome::Updated))
        }
        Some(_) => Ok(Ok(RowOutcome::Unchanged)),
    }
}

impl MigrationTask for CompanyAccessTask {
    fn name(&self) -> &'static str {
        "company_access"
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        Ok((
            self.source.access_stamp(options.today)?,
            session.company_access_stamp()?,
        ))
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let mut counts = MigrateCounts::default();
        let grants = self.source.valid_authorizations(ctx.options.today)?;
        let existing: HashMap<GrantKey, CompanyAccessEntry> = session
            .company_access_entries()?
            .into_iter()
            .map(|e| ((e.ssn.clone(), e.company_code.clone()), e))
            .collect();
        info!(
            "company_access: {} valid grants, {} stored",
            grants.len(),
            existing.len()
        );

        let complete = ctx.apply_rows(&mut *session, &grants, &mut counts, |s, c, g| {
            apply_grant(s, c, &existing, g)
        })?;
        if !complete || ctx.should_stop() {
            return Ok(counts);
        }

        let valid: HashSet<GrantKey> = grants
            .iter()
            .map(|g| (g.ssn.clone(), g.company_code.clone()))
            .collect();
        let revoked: Vec<String> = existing
            .iter()
            .filter(|(key, _)| !valid.contains(*key))
            .map(|(_, entry)| entry.id.clone())
            .collect();
        if !revoked.is_empty() {
            let deleted = session.delete_company_access(&revoked)?;
            info!("company_access: removed {} revoked grants", deleted);
            counts.deleted += deleted as u64;
        }
        Ok(counts)
    }
}
