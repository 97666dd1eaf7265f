//! Run and task options.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::RowErrorPolicy;
use crate::constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_TIMEOUT_MINUTES};

/// Options visible to every task invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOptions {
    /// Roll back every session and never checkpoint.
    pub dry_run: bool,
    /// Ignore timestamps and re-examine every source row.
    pub force_recheck: bool,
    /// Synthesize placeholder rows for unresolved foreign keys.
    pub create_missing_relations: bool,
    pub row_error_policy: RowErrorPolicy,
    /// Maximum source rows examined per task invocation.
    pub row_limit: Option<usize>,
    /// Overrides every task's page size.
    pub page_size: Option<i64>,
    /// Reference date for authorization validity.
    pub today: NaiveDate,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force_recheck: false,
            create_missing_relations: false,
            row_error_policy: RowErrorPolicy::default(),
            row_limit: None,
            page_size: None,
            today: Utc::now().date_naive(),
        }
    }
}

impl MigrationOptions {
    /// The configured page size, or the task's own default.
    pub fn page_size_or(&self, default: i64) -> i64 {
        self.page_size.filter(|s| *s > 0).unwrap_or(default)
    }
}

/// Options of one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub migration: MigrationOptions,
    /// Global budget; checked between units of work.
    pub timeout: Duration,
    pub max_iterations: u32,
    /// Delay between iterations.
    pub sleep: Duration,
    /// Restrict the run to one task name.
    pub target: Option<String>,
    pub verify: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            migration: MigrationOptions::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_MINUTES as u64 * 60),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sleep: Duration::ZERO,
            target: None,
            verify: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_override() {
        let mut options = MigrationOptions::default();
        assert_eq!(options.page_size_or(1_000), 1_000);
        options.page_size = Some(2);
        assert_eq!(options.page_size_or(1_000), 2);
        options.page_size = Some(0);
        assert_eq!(options.page_size_or(1_000), 1_000);
    }
}
