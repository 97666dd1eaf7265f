//! Foreign-key resolution with create-on-demand fallback.
//!
//! Lookup order: run cache, destination by natural id, then a placeholder
//! row when `create_missing_relations` is enabled. Placeholders raise an
//! alert so the data-quality problem surfaces in the run summary.

use super::errors::{EntityKind, MissingEntityError, RowError};
use super::task::TaskContext;
use crate::backend::{BackendSession, Company, Fund, Portfolio, Security};
use crate::errors::Result;

fn get_or_create(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    kind: EntityKind,
    original_id: &str,
    find: impl FnOnce(&mut dyn BackendSession) -> Result<Option<String>>,
    create: impl FnOnce(&mut dyn BackendSession, &mut TaskContext<'_>) -> Result<Option<String>>,
) -> Result<Option<String>> {
    if let Some(id) = ctx.cache.get(kind, original_id) {
        return Ok(Some(id));
    }
    let id = match find(&mut *session)? {
        Some(id) => Some(id),
        None if ctx.options.create_missing_relations => {
            let created = create(&mut *session, ctx)?;
            if created.is_some() {
                ctx.alert(format!("Created placeholder {} '{}'", kind, original_id));
            }
            created
        }
        None => None,
    };
    if let Some(id) = &id {
        ctx.cache.insert(kind, original_id, id.clone());
    }
    Ok(id)
}

pub fn resolve_fund(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
) -> Result<Option<String>> {
    get_or_create(
        session,
        ctx,
        EntityKind::Fund,
        original_id,
        |s| Ok(s.find_fund(original_id)?.map(|f| f.id)),
        |s, _| {
            let fund = Fund::placeholder(original_id);
            s.insert_fund(&fund)?;
            Ok(Some(fund.id))
        },
    )
}

pub fn resolve_security(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
) -> Result<Option<String>> {
    get_or_create(
        session,
        ctx,
        EntityKind::Security,
        original_id,
        |s| Ok(s.find_security(original_id)?.map(|r| r.id)),
        |s, _| {
            let security = Security::placeholder(original_id);
            s.insert_security(&security)?;
            Ok(Some(security.id))
        },
    )
}

pub fn resolve_company(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
) -> Result<Option<String>> {
    get_or_create(
        session,
        ctx,
        EntityKind::Company,
        original_id,
        |s| Ok(s.find_company(original_id)?.map(|c| c.id)),
        |s, _| {
            let company = Company::placeholder(original_id);
            s.insert_company(&company)?;
            Ok(Some(company.id))
        },
    )
}

/// A placeholder portfolio needs an owner; `company_hint` is the legacy
/// row's company code and is resolved (or created) first.
pub fn resolve_portfolio(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
    company_hint: Option<&str>,
) -> Result<Option<String>> {
    get_or_create(
        session,
        ctx,
        EntityKind::Portfolio,
        original_id,
        |s| Ok(s.find_portfolio(original_id)?.map(|p| p.id)),
        |s, ctx| {
            let Some(company_code) = company_hint else {
                return Ok(None);
            };
            let Some(company_id) = resolve_company(&mut *s, ctx, company_code)? else {
                return Ok(None);
            };
            let portfolio = Portfolio::placeholder(original_id, company_id);
            s.insert_portfolio(&portfolio)?;
            Ok(Some(portfolio.id))
        },
    )
}

/// Mandatory security reference; a miss is a row error.
pub fn require_security(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
    referenced_by: &str,
) -> Result<std::result::Result<String, RowError>> {
    Ok(resolve_security(session, ctx, original_id)?.ok_or_else(|| {
        RowError::Missing(MissingEntityError::missing_security(
            original_id,
            format!("referenced by {}", referenced_by),
        ))
    }))
}

pub fn require_company(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
    referenced_by: &str,
) -> Result<std::result::Result<String, RowError>> {
    Ok(resolve_company(session, ctx, original_id)?.ok_or_else(|| {
        RowError::Missing(MissingEntityError::missing_company(
            original_id,
            format!("referenced by {}", referenced_by),
        ))
    }))
}

pub fn require_portfolio(
    session: &mut dyn BackendSession,
    ctx: &mut TaskContext<'_>,
    original_id: &str,
    company_hint: Option<&str>,
    referenced_by: &str,
) -> Result<std::result::Result<String, RowError>> {
    Ok(
        resolve_portfolio(session, ctx, original_id, company_hint)?.ok_or_else(|| {
            RowError::Missing(MissingEntityError::missing_portfolio(
                original_id,
                format!("referenced by {}", referenced_by),
            ))
        }),
    )
}
