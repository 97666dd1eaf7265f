//! Drives the tasks of a pipeline in dependency order.
//!
//! Each task invocation runs in its own backend session and is isolated:
//! a failing task is rolled back and recorded, the remaining tasks still
//! run. In a dry run all tasks of an iteration share one session that is
//! rolled back at the end, so later tasks see earlier tasks' writes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info, warn};

use super::cache::ResolutionCache;
use super::options::{MigrationOptions, RunOptions};
use super::summary::{Alert, RunSummary, TaskSummary};
use super::task::{MigrateCounts, MigrationTask, TaskContext, TaskRun, TaskState};
use super::tasks::{
    CompaniesTask, CompanyAccessTask, FundsTask, LastRateTask, PortfolioLogsTask,
    PortfolioTransactionsTask, PortfoliosTask, SecuritiesTask, SecurityRatesTask,
};
use crate::backend::{BackendSession, SessionFactory};
use crate::errors::{Error, Result};
use crate::source::{AuthorizationSource, FundsSource, KiidSource};

/// Result of one task invocation inside an iteration.
struct Invocation {
    was_stale: bool,
    counts: MigrateCounts,
    timed_out: bool,
}

pub struct MigrateHandler {
    sessions: Arc<dyn SessionFactory>,
    tasks: Vec<Box<dyn MigrationTask>>,
}

impl MigrateHandler {
    pub fn new(sessions: Arc<dyn SessionFactory>, tasks: Vec<Box<dyn MigrationTask>>) -> Self {
        Self { sessions, tasks }
    }

    /// The operational pipeline: legacy funds database plus authorizations.
    pub fn funds(
        funds: Arc<dyn FundsSource>,
        authorizations: Arc<dyn AuthorizationSource>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let tasks: Vec<Box<dyn MigrationTask>> = vec![
            Box::new(SecuritiesTask::new(funds.clone())),
            Box::new(CompaniesTask::new(funds.clone())),
            Box::new(PortfoliosTask::new(funds.clone())),
            Box::new(PortfolioTransactionsTask::new(funds.clone())),
            Box::new(PortfolioLogsTask::new(funds.clone())),
            Box::new(SecurityRatesTask::new(funds.clone())),
            Box::new(LastRateTask::new(funds)),
            Box::new(CompanyAccessTask::new(authorizations)),
        ];
        Self::new(sessions, tasks)
    }

    /// The fund metadata pipeline.
    pub fn kiid(kiid: Arc<dyn KiidSource>, sessions: Arc<dyn SessionFactory>) -> Self {
        Self::new(sessions, vec![Box::new(FundsTask::new(kiid))])
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    fn selected(&self, target: Option<&str>) -> Result<Vec<usize>> {
        match target {
            None => Ok((0..self.tasks.len()).collect()),
            Some(name) => self
                .tasks
                .iter()
                .position(|t| t.name() == name)
                .map(|i| vec![i])
                .ok_or_else(|| {
                    Error::InvalidConfigValue(format!(
                        "unknown target '{}', expected one of: {}",
                        name,
                        self.task_names().join(", ")
                    ))
                }),
        }
    }

    /// Runs the pipeline until every selected task is up to date, no task
    /// makes progress, the iteration cap is hit or the deadline passes.
    pub fn run(&mut self, options: &RunOptions) -> Result<RunSummary> {
        let selected = self.selected(options.target.as_deref())?;
        let started = Instant::now();
        let deadline = started + options.timeout;
        let migration = &options.migration;
        let mut summary = RunSummary::new(Utc::now().naive_utc(), migration.dry_run);
        summary.tasks = selected
            .iter()
            .map(|&i| TaskSummary::new(self.tasks[i].name()))
            .collect();
        let mut cache = ResolutionCache::new();
        let mut runs: Vec<Option<TaskRun>> = vec![None; selected.len()];

        let max_iterations = if migration.dry_run {
            1
        } else {
            options.max_iterations.max(1)
        };
        info!(
            "Starting run of {} task(s), at most {} iteration(s){}",
            selected.len(),
            max_iterations,
            if migration.dry_run { ", dry run" } else { "" }
        );

        for iteration in 1..=max_iterations {
            summary.iterations = iteration;
            let mut any_stale = false;
            let mut progress = false;
            let mut shared: Option<Box<dyn BackendSession>> = None;

            for (slot, &index) in selected.iter().enumerate() {
                if Instant::now() >= deadline {
                    summary.timed_out = true;
                    break;
                }
                if summary.tasks[slot].failed() {
                    continue;
                }

                let task = self.tasks[index].as_mut();
                let mut run = TaskRun::new(task.name());
                summary.tasks[slot].invocations += 1;

                let mut session = match shared.take() {
                    Some(s) => s,
                    None => match self.sessions.begin() {
                        Ok(s) => s,
                        Err(e) => {
                            error!("{}: could not open backend session: {}", task.name(), e);
                            Self::record_failure(&mut summary.tasks[slot], &mut run, &e);
                            runs[slot] = Some(run);
                            continue;
                        }
                    },
                };

                let result = Self::invoke(
                    task,
                    session.as_mut(),
                    &mut run,
                    migration,
                    &mut cache,
                    &mut summary.alerts,
                    deadline,
                );

                match result {
                    Ok(invocation) => {
                        let finished = if migration.dry_run {
                            shared = Some(session);
                            Ok(())
                        } else if invocation.was_stale {
                            session.commit()
                        } else {
                            session.rollback()
                        };
                        if let Err(e) = finished {
                            error!("{}: could not end backend session: {}", task.name(), e);
                            cache.clear();
                            Self::record_failure(&mut summary.tasks[slot], &mut run, &e);
                            runs[slot] = Some(run);
                            continue;
                        }
                        let task_summary = &mut summary.tasks[slot];
                        task_summary.counts.merge(&invocation.counts);
                        task_summary.state = run.state();
                        any_stale |= invocation.was_stale;
                        progress |= invocation.counts.changed() > 0;
                        if invocation.timed_out {
                            summary.timed_out = true;
                        }
                    }
                    Err(e) => {
                        error!("{}: {}", task.name(), e);
                        if let Err(rollback) = session.rollback() {
                            warn!("{}: rollback failed: {}", task.name(), rollback);
                        }
                        // placeholders created in the rolled back session are gone
                        cache.clear();
                        Self::record_failure(&mut summary.tasks[slot], &mut run, &e);
                    }
                }
                runs[slot] = Some(run);
                if summary.timed_out {
                    break;
                }
            }

            if let Some(session) = shared.take() {
                session.rollback()?;
                cache.clear();
            }

            if summary.timed_out {
                warn!("Deadline reached during iteration {}", iteration);
                break;
            }
            if !any_stale {
                info!("All tasks up to date after {} iteration(s)", iteration);
                break;
            }
            if !progress {
                info!("No progress in iteration {}, stopping", iteration);
                break;
            }
            if iteration < max_iterations && !options.sleep.is_zero() {
                std::thread::sleep(options.sleep);
            }
        }

        if options.verify {
            for (slot, &index) in selected.iter().enumerate() {
                let Some(run) = runs[slot].as_mut() else {
                    continue;
                };
                if summary.tasks[slot].failed() {
                    continue;
                }
                let task = self.tasks[index].as_ref();
                Self::verify_task(
                    task,
                    self.sessions.as_ref(),
                    run,
                    &mut summary.tasks[slot],
                    migration,
                    &mut cache,
                    &mut summary.alerts,
                    deadline,
                );
            }
        }

        debug!("Resolution cache holds {} ids", cache.len());
        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "Run finished in {:?}: {} change(s), {} failed task(s)",
            Duration::from_millis(summary.elapsed_ms),
            summary.total_changed(),
            summary.failed_tasks().len()
        );
        Ok(summary)
    }

    fn invoke(
        task: &mut dyn MigrationTask,
        session: &mut dyn BackendSession,
        run: &mut TaskRun,
        options: &MigrationOptions,
        cache: &mut ResolutionCache,
        alerts: &mut Vec<Alert>,
        deadline: Instant,
    ) -> Result<Invocation> {
        task.prepare(&mut *session, options)?;
        run.advance(TaskState::Prepared)?;

        if !options.force_recheck && task.up_to_date(&mut *session, options)? {
            run.advance(TaskState::UpToDate)?;
            debug!("{}: up to date", task.name());
            return Ok(Invocation {
                was_stale: false,
                counts: MigrateCounts::default(),
                timed_out: false,
            });
        }
        run.advance(TaskState::Stale)?;
        run.advance(TaskState::Migrating)?;

        let mut ctx = TaskContext::new(task.name(), options, cache, alerts, deadline);
        let counts = task.migrate(&mut *session, &mut ctx)?;
        run.advance(TaskState::Migrated)?;
        info!(
            "{}: created={} updated={} deleted={} unchanged={} skipped={}",
            task.name(),
            counts.created,
            counts.updated,
            counts.deleted,
            counts.unchanged,
            counts.skipped
        );
        Ok(Invocation {
            was_stale: true,
            counts,
            timed_out: ctx.timed_out(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_task(
        task: &dyn MigrationTask,
        sessions: &dyn SessionFactory,
        run: &mut TaskRun,
        task_summary: &mut TaskSummary,
        options: &MigrationOptions,
        cache: &mut ResolutionCache,
        alerts: &mut Vec<Alert>,
        deadline: Instant,
    ) {
        let outcome = (|| -> Result<_> {
            run.advance(TaskState::Verifying)?;
            let mut session = sessions.begin()?;
            let mut ctx = TaskContext::new(task.name(), options, cache, alerts, deadline);
            let report = task.verify(session.as_mut(), &mut ctx);
            session.rollback()?;
            report
        })();

        match outcome {
            Ok(report) => {
                let next = if report.passed {
                    info!("{}: verification passed", task.name());
                    TaskState::Verified
                } else {
                    warn!("{}: verification failed", task.name());
                    TaskState::Failed
                };
                if let Err(e) = run.advance(next) {
                    warn!("{}: {}", task.name(), e);
                }
                task_summary.verification = Some(report);
            }
            Err(e) => {
                error!("{}: verification error: {}", task.name(), e);
                Self::record_failure(task_summary, run, &e);
                return;
            }
        }
        task_summary.state = run.state();
    }

    fn record_failure(task_summary: &mut TaskSummary, run: &mut TaskRun, err: &Error) {
        if let Err(e) = run.advance(TaskState::Failed) {
            warn!("{}", e);
        }
        task_summary.state = TaskState::Failed;
        task_summary.error = Some(err.to_string());
    }
}
