//! Incremental migration and reconciliation engine.
//!
//! Tasks copy one entity each from a legacy source to the backend. Every
//! task detects staleness cheaply, copies changed rows under a time budget,
//! resolves foreign keys (optionally creating placeholders), reconciles
//! deletions without breaking references, and verifies itself with
//! aggregate checksums that produce repair suggestions.

mod cache;
mod errors;
mod options;
mod orchestrator;
mod reconcile;
mod resolver;
mod staleness;
mod summary;
mod task;
mod tasks;
mod verification;

pub use cache::ResolutionCache;
pub use errors::{EntityKind, MigrationError, MissingEntityError, RowError, RowErrorPolicy};
pub use options::{MigrationOptions, RunOptions};
pub use orchestrator::MigrateHandler;
pub use reconcile::{
    missing_from_source, plan_disposable_deletion, plan_guarded_deletion, DeletionPlan,
};
pub use resolver::{
    require_company, require_portfolio, require_security, resolve_company, resolve_fund,
    resolve_portfolio, resolve_security,
};
pub use staleness::{is_up_to_date, round_to_second, truncate_to_second, window_start, DatasetStamp};
pub use summary::{Alert, RunSummary, TaskSummary};
pub use task::{
    upsert_outcome, MigrateCounts, MigrationTask, Pager, RowOutcome, RowResult, TaskContext,
    TaskRun, TaskState,
};
pub use tasks::{
    CompaniesTask, CompanyAccessTask, FundsTask, LastRateTask, PortfolioLogsTask,
    PortfolioTransactionsTask, PortfoliosTask, SecuritiesTask, SecurityRatesTask,
};
pub use verification::{
    compare_checksums, date_minutes, diff_partition, suggest_delete, suggest_insert,
    suggest_update, ChecksumMismatch, LedgerLine, PartitionChecksum, PortfolioLogLine,
    PortfolioTransactionLine, RateLine, RateTable, RepairKind, RepairSuggestion, SqlLiteral,
    VerifyReport,
};
