//! The task contract and the shared machinery every task runs on.
//!
//! A task moves through `prepare -> up_to_date -> migrate -> verify`. The
//! copy loop, the timeout check, row error settlement and intermediate
//! commits live here so that tasks only describe what a row means.

use std::fmt;
use std::time::Instant;

use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::cache::ResolutionCache;
use super::errors::{MigrationError, RowError, RowErrorPolicy};
use super::options::MigrationOptions;
use super::staleness::{is_up_to_date, truncate_to_second, DatasetStamp};
use super::summary::Alert;
use super::verification::VerifyReport;
use crate::backend::BackendSession;
use crate::constants::COMMIT_INTERVAL;
use crate::errors::{Error, Result};
use crate::source::{Page, SourceRecord};

// =============================================================================
// Task state
// =============================================================================

/// Lifecycle of one task invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    NotPrepared,
    Prepared,
    UpToDate,
    Stale,
    Migrating,
    Migrated,
    Verifying,
    Verified,
    Failed,
}

impl TaskState {
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Verified, _) | (Failed, _) => false,
            (_, Failed) => true,
            (NotPrepared, Prepared) => true,
            (Prepared, UpToDate) | (Prepared, Stale) => true,
            (Stale, Migrating) => true,
            (Migrating, Migrated) => true,
            (UpToDate, Verifying) | (Migrated, Verifying) => true,
            (Verifying, Verified) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Verified | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::NotPrepared => "NOT_PREPARED",
            TaskState::Prepared => "PREPARED",
            TaskState::UpToDate => "UP_TO_DATE",
            TaskState::Stale => "STALE",
            TaskState::Migrating => "MIGRATING",
            TaskState::Migrated => "MIGRATED",
            TaskState::Verifying => "VERIFYING",
            TaskState::Verified => "VERIFIED",
            TaskState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// State tracker for a single task invocation.
#[derive(Debug, Clone)]
pub struct TaskRun {
    task: String,
    state: TaskState,
}

impl TaskRun {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            state: TaskState::NotPrepared,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn advance(&mut self, next: TaskState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(MigrationError::IllegalTransition {
                task: self.task.clone(),
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        debug!("{}: {} -> {}", self.task, self.state, next);
        self.state = next;
        Ok(())
    }
}

// =============================================================================
// Counts and row outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Created,
    Updated,
    Unchanged,
}

pub type RowResult = std::result::Result<RowOutcome, RowError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
    pub skipped: u64,
}

impl MigrateCounts {
    /// Rows created, updated or deleted.
    pub fn changed(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn merge(&mut self, other: &MigrateCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }
}

/// Compares a freshly built row to the stored one.
pub fn upsert_outcome<T: PartialEq>(existing: Option<&T>, candidate: &T) -> Option<RowOutcome> {
    match existing {
        None => Some(RowOutcome::Created),
        Some(current) if current == candidate => None,
        Some(_) => Some(RowOutcome::Updated),
    }
}

// =============================================================================
// Context
// =============================================================================

/// Per-invocation state shared by a task's steps.
pub struct TaskContext<'a> {
    pub task: &'static str,
    pub options: &'a MigrationOptions,
    pub cache: &'a mut ResolutionCache,
    alerts: &'a mut Vec<Alert>,
    deadline: Instant,
    examined: usize,
    since_checkpoint: usize,
    timed_out: bool,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        task: &'static str,
        options: &'a MigrationOptions,
        cache: &'a mut ResolutionCache,
        alerts: &'a mut Vec<Alert>,
        deadline: Instant,
    ) -> Self {
        Self {
            task,
            options,
            cache,
            alerts,
            deadline,
            examined: 0,
            since_checkpoint: 0,
            timed_out: false,
        }
    }

    /// True once the global deadline has passed; sticky.
    pub fn should_timeout(&mut self) -> bool {
        if !self.timed_out && Instant::now() >= self.deadline {
            debug!("{}: deadline reached after {} rows", self.task, self.examined);
            self.timed_out = true;
        }
        self.timed_out
    }

    pub fn limit_reached(&self) -> bool {
        self.options
            .row_limit
            .is_some_and(|limit| self.examined >= limit)
    }

    /// Checked before every unit of work.
    pub fn should_stop(&mut self) -> bool {
        self.should_timeout() || self.limit_reached()
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Rows examined so far by this invocation.
    pub fn examined(&self) -> usize {
        self.examined
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.task, message);
        self.alerts.push(Alert {
            task: self.task.to_string(),
            message,
        });
    }

    /// Counts one unit of work and checkpoints the session every
    /// `COMMIT_INTERVAL` units (never in a dry run).
    pub fn tick(&mut self, session: &mut dyn BackendSession) -> Result<()> {
        self.examined += 1;
        self.since_checkpoint += 1;
        if self.since_checkpoint >= COMMIT_INTERVAL {
            self.since_checkpoint = 0;
            if !self.options.dry_run {
                debug!("{}: checkpoint after {} rows", self.task, self.examined);
                session.checkpoint()?;
            }
        }
        Ok(())
    }

    /// Applies the row error policy to a row's result.
    pub fn settle(&mut self, result: RowResult, counts: &mut MigrateCounts) -> Result<()> {
        match result {
            Ok(outcome) => {
                counts.record(outcome);
                Ok(())
            }
            Err(RowError::AmbiguousPortfolio {
                company,
                candidates,
            }) => {
                self.alert(format!(
                    "Skipped row: company '{}' has {} candidate portfolios",
                    company, candidates
                ));
                counts.skipped += 1;
                Ok(())
            }
            Err(RowError::Missing(missing)) => match self.options.row_error_policy {
                RowErrorPolicy::SkipRow => {
                    self.alert(format!("Skipped row: {}", missing));
                    counts.skipped += 1;
                    Ok(())
                }
                RowErrorPolicy::AbortTask => Err(Error::Migration(missing.into())),
            },
        }
    }

    /// Applies rows in order, stopping early at the deadline or row limit.
    ///
    /// Returns `false` when it stopped before the last row.
    pub fn apply_rows<R>(
        &mut self,
        session: &mut dyn BackendSession,
        rows: &[R],
        counts: &mut MigrateCounts,
        mut apply: impl FnMut(
            &mut dyn BackendSession,
            &mut TaskContext<'a>,
            &R,
        ) -> Result<RowResult>,
    ) -> Result<bool> {
        self.apply_each(session, rows, counts, &mut apply, |_, _| false)
    }

    /// Rows for which `free` holds are settled without counting toward the
    /// row limit or the checkpoint interval.
    fn apply_each<R>(
        &mut self,
        session: &mut dyn BackendSession,
        rows: &[R],
        counts: &mut MigrateCounts,
        apply: &mut impl FnMut(
            &mut dyn BackendSession,
            &mut TaskContext<'a>,
            &R,
        ) -> Result<RowResult>,
        free: impl Fn(&R, &RowResult) -> bool,
    ) -> Result<bool> {
        for row in rows {
            if self.should_stop() {
                return Ok(false);
            }
            let result = apply(&mut *session, self, row)?;
            let charged = !free(row, &result);
            self.settle(result, counts)?;
            if charged {
                self.tick(&mut *session)?;
            }
        }
        Ok(true)
    }

    /// Streams pages of rows updated since `since` from `fetch` through
    /// `apply` until the source is exhausted or the invocation has to stop.
    ///
    /// A resumed window starts at the destination's latest second, so rows
    /// of that second already in place come back unchanged. They are not
    /// charged to the row limit; otherwise a second holding more rows than
    /// the limit would never be passed.
    ///
    /// Returns `true` when every page was consumed.
    pub fn run_pages<R: SourceRecord>(
        &mut self,
        session: &mut dyn BackendSession,
        since: Option<NaiveDateTime>,
        page_size: i64,
        counts: &mut MigrateCounts,
        mut fetch: impl FnMut(Page) -> Result<Vec<R>>,
        mut apply: impl FnMut(
            &mut dyn BackendSession,
            &mut TaskContext<'a>,
            &R,
        ) -> Result<RowResult>,
    ) -> Result<bool> {
        let already_applied = |row: &R, result: &RowResult| {
            matches!(result, Ok(RowOutcome::Unchanged))
                && since.is_some_and(|start| truncate_to_second(row.updated()) == start)
        };
        let mut pager = Pager::new(page_size);
        loop {
            if self.should_stop() {
                return Ok(false);
            }
            let rows = fetch(pager.page())?;
            debug!(
                "{}: page at offset {} returned {} rows",
                self.task,
                pager.offset,
                rows.len()
            );
            if rows.is_empty() {
                return Ok(true);
            }
            if !self.apply_each(&mut *session, &rows, counts, &mut apply, &already_applied)? {
                return Ok(false);
            }
            if !pager.advance(rows.len()) {
                return Ok(true);
            }
        }
    }
}

/// Offset/limit cursor over a paged source query.
#[derive(Debug, Clone, Copy)]
pub struct Pager {
    offset: i64,
    limit: i64,
}

impl Pager {
    pub fn new(limit: i64) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
        }
    }

    pub fn page(&self) -> Page {
        Page {
            offset: self.offset,
            limit: self.limit,
        }
    }

    /// Moves past `fetched` rows; `false` when the last page was short.
    pub fn advance(&mut self, fetched: usize) -> bool {
        self.offset += fetched as i64;
        fetched as i64 >= self.limit
    }
}

// =============================================================================
// Task trait
// =============================================================================

/// Contract every entity migration implements.
pub trait MigrationTask {
    /// Stable identifier used for ordering, targeting and logging.
    fn name(&self) -> &'static str;

    /// Optional warm-up. Must not write persisted state.
    fn prepare(
        &mut self,
        _session: &mut dyn BackendSession,
        _options: &MigrationOptions,
    ) -> Result<()> {
        Ok(())
    }

    /// Source and destination stamps; two cheap aggregate queries.
    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)>;

    fn up_to_date(
        &self,
        session: &mut dyn BackendSession,
        options: &MigrationOptions,
    ) -> Result<bool> {
        let (source, destination) = self.stamps(session, options)?;
        debug!(
            "{}: source {:?} destination {:?}",
            self.name(),
            source,
            destination
        );
        Ok(is_up_to_date(&source, &destination))
    }

    /// Incremental copy bounded by the context's deadline and row limit.
    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts>;

    /// Read-only correctness check. The default compares stamps only.
    fn verify(
        &self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<VerifyReport> {
        let (source, destination) = self.stamps(session, ctx.options)?;
        if is_up_to_date(&source, &destination) {
            Ok(VerifyReport::passed())
        } else {
            Ok(VerifyReport::failed(format!(
                "source has {} rows (last update {:?}), destination has {} rows (last update {:?})",
                source.count, source.last_update, destination.count, destination.last_update
            )))
        }
    }
}
