//! Whole-pipeline runs through `MigrateHandler`.

mod common;

use std::time::Duration;

use common::{options, Fixture};

use fundsync_core::backend::BackendSession;
use fundsync_core::errors::Result;
use fundsync_core::migration::{
    CompaniesTask, DatasetStamp, MigrateCounts, MigrateHandler, MigrationOptions, MigrationTask,
    PortfoliosTask, RunOptions, TaskContext, TaskState,
};

fn run_options(migration: MigrationOptions) -> RunOptions {
    RunOptions {
        migration,
        timeout: Duration::from_secs(600),
        ..RunOptions::default()
    }
}

/// Copies companies, then keeps working past the run's deadline.
struct SlowCompanies {
    inner: CompaniesTask,
    pause: Duration,
}

impl MigrationTask for SlowCompanies {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn stamps(
        &self,
        session: &mut dyn BackendSession,
        options: &MigrationOptions,
    ) -> Result<(DatasetStamp, DatasetStamp)> {
        self.inner.stamps(session, options)
    }

    fn migrate(
        &mut self,
        session: &mut dyn BackendSession,
        ctx: &mut TaskContext<'_>,
    ) -> Result<MigrateCounts> {
        let counts = self.inner.migrate(session, ctx)?;
        std::thread::sleep(self.pause);
        assert!(ctx.should_timeout());
        Ok(counts)
    }
}

#[test]
fn test_pipeline_converges_and_reruns_clean() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.seed_authorizations();

    let summary = fx.handler().run(&run_options(options())).unwrap();
    assert!(!summary.has_failures(), "{}", summary.render_text());
    assert!(summary.iterations >= 2);
    assert_eq!(summary.task("companies").unwrap().counts.created, 2);
    assert_eq!(summary.task("portfolios").unwrap().counts.created, 2);
    assert_eq!(summary.task("portfolio_logs").unwrap().counts.created, 3);
    assert_eq!(summary.task("portfolio_transactions").unwrap().counts.created, 2);
    assert_eq!(summary.task("company_access").unwrap().counts.created, 1);

    let again = fx.handler().run(&run_options(options())).unwrap();
    assert_eq!(again.total_changed(), 0);
    assert_eq!(again.iterations, 1);
    assert!(again
        .tasks
        .iter()
        .all(|t| t.state == TaskState::UpToDate));
}

#[test]
fn test_failing_task_does_not_stop_the_others() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.funds_sql(
        "INSERT INTO TABLE_PORTLOG VALUES (9, 'PA', 'A', 'S9', NULL, NULL, 'BUY', '2024-02-09', NULL, '1.000000', NULL, NULL, NULL, NULL, 1, '2024-02-09 10:00:00');",
    );

    let summary = fx.handler().run(&run_options(options())).unwrap();
    assert!(summary.has_failures());
    assert_eq!(summary.failed_tasks(), vec!["portfolio_logs"]);

    let logs = summary.task("portfolio_logs").unwrap();
    assert!(logs.error.as_deref().unwrap().contains("S9"));
    assert_eq!(summary.task("security_rates").unwrap().counts.created, 3);
    assert_eq!(summary.task("last_rate").unwrap().counts.created, 2);
    // the failed invocation was rolled back
    assert!(fx.inspect(|s| s.portfolio_log_numbers().unwrap()).is_empty());
}

#[test]
fn test_dry_run_leaves_backend_untouched() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let migration = MigrationOptions {
        dry_run: true,
        ..options()
    };

    let summary = fx.handler().run(&run_options(migration)).unwrap();
    assert!(summary.dry_run);
    assert_eq!(summary.iterations, 1);
    // later tasks saw earlier tasks' rows inside the shared session
    assert_eq!(summary.task("portfolio_logs").unwrap().counts.created, 3);

    assert_eq!(fx.inspect(|s| s.company_stamp().unwrap()).count, 0);
    assert_eq!(fx.inspect(|s| s.security_stamp().unwrap()).count, 0);
    assert!(fx.inspect(|s| s.portfolio_log_numbers().unwrap()).is_empty());
}

#[test]
fn test_target_runs_a_single_task() {
    let fx = Fixture::new();
    fx.seed_ledger();
    let options = RunOptions {
        target: Some("securities".to_string()),
        ..run_options(options())
    };

    let summary = fx.handler().run(&options).unwrap();
    assert_eq!(summary.tasks.len(), 1);
    assert_eq!(summary.tasks[0].counts.created, 2);
    assert_eq!(fx.inspect(|s| s.company_stamp().unwrap()).count, 0);
}

#[test]
fn test_unknown_target_is_rejected() {
    let fx = Fixture::new();
    let options = RunOptions {
        target: Some("nope".to_string()),
        ..run_options(options())
    };
    assert!(fx.handler().run(&options).is_err());
}

#[test]
fn test_verify_failure_marks_task_failed() {
    let fx = Fixture::new();
    fx.seed_ledger();
    fx.handler().run(&run_options(options())).unwrap();
    fx.backend_sql(
        "UPDATE portfolio_transactions SET amount = '31.000000' WHERE transaction_number = 11;",
    );

    let options = RunOptions {
        verify: true,
        ..run_options(options())
    };
    let summary = fx.handler().run(&options).unwrap();
    assert_eq!(summary.failed_tasks(), vec!["portfolio_transactions"]);

    let report = summary
        .task("portfolio_transactions")
        .unwrap()
        .verification
        .as_ref()
        .unwrap();
    assert!(!report.passed);
    assert!(report
        .suggestions
        .iter()
        .any(|s| s.statement.contains("transaction_number = 11")));
    assert!(summary
        .task("portfolio_logs")
        .unwrap()
        .verification
        .as_ref()
        .unwrap()
        .passed);
}

#[test]
fn test_summary_renders_json() {
    let fx = Fixture::new();
    fx.seed_companies();
    let summary = fx.handler().run(&run_options(options())).unwrap();
    let json = summary.to_json().unwrap();
    assert!(json.contains("\"companies\""));
}

#[test]
fn test_kiid_pipeline() {
    let fx = Fixture::new();
    fx.kiid_sql(
        "INSERT INTO KIID_FUND VALUES ('F1', NULL, NULL, NULL, 3, 'ACTIVE', 0, '2024-04-01 08:00:00');",
    );
    let summary = fx.kiid_handler().run(&run_options(options())).unwrap();
    assert_eq!(summary.task("funds").unwrap().counts.created, 1);
    assert!(!summary.has_failures());
}

#[test]
fn test_deadline_commits_partial_progress() {
    let fx = Fixture::new();
    fx.seed_companies();
    let tasks: Vec<Box<dyn MigrationTask>> = vec![
        Box::new(SlowCompanies {
            inner: CompaniesTask::new(fx.funds.clone()),
            pause: Duration::from_millis(800),
        }),
        Box::new(PortfoliosTask::new(fx.funds.clone())),
    ];
    let short = RunOptions {
        timeout: Duration::from_millis(500),
        ..run_options(options())
    };

    let summary = MigrateHandler::new(fx.sessions.clone(), tasks)
        .run(&short)
        .unwrap();
    assert!(summary.timed_out);
    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.task("companies").unwrap().counts.created, 2);
    assert_eq!(summary.task("portfolios").unwrap().invocations, 0);
    // the timed out invocation was committed
    assert_eq!(fx.inspect(|s| s.company_stamp().unwrap()).count, 2);
    assert_eq!(fx.inspect(|s| s.portfolio_stamp().unwrap()).count, 0);

    let again = fx.handler().run(&run_options(options())).unwrap();
    assert!(!again.timed_out);
    assert!(!again.has_failures(), "{}", again.render_text());
    assert_eq!(again.task("companies").unwrap().counts.created, 0);
    assert_eq!(again.task("portfolios").unwrap().counts.created, 2);
}
