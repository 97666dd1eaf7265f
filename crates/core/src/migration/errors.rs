//! Migration-specific error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entity kinds that can be referenced by a foreign key during migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Fund,
    Security,
    Company,
    Portfolio,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Fund => "fund",
            EntityKind::Security => "security",
            EntityKind::Company => "company",
            EntityKind::Portfolio => "portfolio",
        }
    }

    /// Name of the task that owns this entity.
    pub fn owning_task(&self) -> &'static str {
        match self {
            EntityKind::Fund => "funds",
            EntityKind::Security => "securities",
            EntityKind::Company => "companies",
            EntityKind::Portfolio => "portfolios",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A required foreign-key target does not exist in the destination.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Missing {kind} '{original_id}' (migrated by '{target_task}'): {message}")]
pub struct MissingEntityError {
    pub kind: EntityKind,
    pub original_id: String,
    pub target_task: String,
    pub message: String,
}

impl MissingEntityError {
    pub fn new(
        kind: EntityKind,
        original_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            original_id: original_id.into(),
            target_task: kind.owning_task().to_string(),
            message: message.into(),
        }
    }

    pub fn missing_security(original_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EntityKind::Security, original_id, message)
    }

    pub fn missing_company(original_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EntityKind::Company, original_id, message)
    }

    pub fn missing_portfolio(original_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EntityKind::Portfolio, original_id, message)
    }
}

/// Errors escalated out of a task's migrate step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error(transparent)]
    MissingEntity(#[from] MissingEntityError),

    #[error("Company '{company}' has {candidates} candidate portfolios")]
    AmbiguousPortfolio { company: String, candidates: usize },

    #[error("Illegal task state transition for '{task}': {from} -> {to}")]
    IllegalTransition {
        task: String,
        from: String,
        to: String,
    },
}

/// Recoverable failure of a single source row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error(transparent)]
    Missing(#[from] MissingEntityError),

    #[error("Ambiguous portfolio for company '{company}' ({candidates} candidates)")]
    AmbiguousPortfolio { company: String, candidates: usize },
}

impl From<RowError> for MigrationError {
    fn from(err: RowError) -> Self {
        match err {
            RowError::Missing(missing) => MigrationError::MissingEntity(missing),
            RowError::AmbiguousPortfolio {
                company,
                candidates,
            } => MigrationError::AmbiguousPortfolio {
                company,
                candidates,
            },
        }
    }
}

/// What a task does with a [`RowError::Missing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowErrorPolicy {
    /// Abort the task's migrate step; work up to the last checkpoint persists.
    #[default]
    AbortTask,
    /// Record an alert and continue with the next row.
    SkipRow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entity_constructors_set_target_task() {
        let err = MissingEntityError::missing_security("SEC1", "referenced by log 7");
        assert_eq!(err.kind, EntityKind::Security);
        assert_eq!(err.original_id, "SEC1");
        assert_eq!(err.target_task, "securities");

        let err = MissingEntityError::missing_portfolio("P1", "x");
        assert_eq!(err.target_task, "portfolios");
    }

    #[test]
    fn test_row_error_escalates_to_migration_error() {
        let row = RowError::from(MissingEntityError::missing_company("C1", "owner"));
        let escalated: MigrationError = row.into();
        match escalated {
            MigrationError::MissingEntity(missing) => assert_eq!(missing.original_id, "C1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_display_mentions_original_id() {
        let err = MissingEntityError::missing_security("SEC9", "not found");
        assert_eq!(
            err.to_string(),
            "Missing security 'SEC9' (migrated by 'securities'): not found"
        );
    }
}
