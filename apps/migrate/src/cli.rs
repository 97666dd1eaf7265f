use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use fundsync_core::constants::{DEFAULT_MAX_ITERATIONS, DEFAULT_TIMEOUT_MINUTES};
use fundsync_core::migration::{MigrationOptions, RowErrorPolicy, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "fundsync-migrate")]
#[command(about = "Incremental legacy-to-backend migration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Securities, companies, portfolios, ledgers, rates and access grants.
    Migrate(RunArgs),
    /// Fund metadata from the KIID database.
    Kiid(RunArgs),
}

impl Command {
    pub fn args(&self) -> &RunArgs {
        match self {
            Command::Migrate(args) | Command::Kiid(args) => args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Dry run: every session is rolled back
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Delay between iterations in milliseconds
    #[arg(long, default_value_t = 0)]
    pub sleep: u64,

    /// Global deadline in minutes
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MINUTES as u64)]
    pub timeout: u64,

    /// Maximum number of iterations
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub batch: u32,

    /// Run a single task
    #[arg(long)]
    pub target: Option<String>,

    /// Re-examine every row regardless of timestamps
    #[arg(long, default_value_t = false)]
    pub update: bool,

    /// Create placeholder rows for unresolved references
    #[arg(long = "create_missing_relations", default_value_t = false)]
    pub create_missing_relations: bool,

    /// Verify every task after migrating
    #[arg(long, default_value_t = false)]
    pub verify: bool,

    /// Skip rows with unresolved references instead of failing the task
    #[arg(long, default_value_t = false)]
    pub skip_row_errors: bool,

    /// Maximum rows examined per task invocation
    #[arg(long)]
    pub limit: Option<usize>,

    /// Overrides every task's page size
    #[arg(long)]
    pub page_size: Option<i64>,

    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    pub summary: SummaryFormat,
}

impl RunArgs {
    pub fn run_options(&self) -> RunOptions {
        let migration = MigrationOptions {
            dry_run: self.debug,
            force_recheck: self.update,
            create_missing_relations: self.create_missing_relations,
            row_error_policy: if self.skip_row_errors {
                RowErrorPolicy::SkipRow
            } else {
                RowErrorPolicy::AbortTask
            },
            row_limit: self.limit,
            page_size: self.page_size,
            ..MigrationOptions::default()
        };
        RunOptions {
            migration,
            timeout: Duration::from_secs(self.timeout.saturating_mul(60)),
            max_iterations: self.batch,
            sleep: Duration::from_millis(self.sleep),
            target: self.target.clone(),
            verify: self.verify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("fundsync-migrate").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["migrate"]);
        let options = cli.command.args().run_options();
        assert_eq!(options.timeout, Duration::from_secs(30 * 60));
        assert_eq!(options.max_iterations, 10);
        assert!(options.sleep.is_zero());
        assert!(!options.verify);
        assert!(!options.migration.dry_run);
        assert_eq!(options.migration.row_error_policy, RowErrorPolicy::AbortTask);
        assert_eq!(cli.command.args().summary, SummaryFormat::Text);
    }

    #[test]
    fn test_all_options() {
        let cli = parse(&[
            "kiid",
            "--debug",
            "--sleep",
            "250",
            "--timeout",
            "5",
            "--batch",
            "3",
            "--target",
            "funds",
            "--update",
            "--create_missing_relations",
            "--verify",
            "--skip-row-errors",
            "--limit",
            "100",
            "--page-size",
            "50",
            "--summary",
            "json",
        ]);
        assert!(matches!(cli.command, Command::Kiid(_)));
        let args = cli.command.args();
        assert_eq!(args.summary, SummaryFormat::Json);

        let options = args.run_options();
        assert_eq!(options.sleep, Duration::from_millis(250));
        assert_eq!(options.timeout, Duration::from_secs(300));
        assert_eq!(options.max_iterations, 3);
        assert_eq!(options.target.as_deref(), Some("funds"));
        assert!(options.verify);
        assert!(options.migration.dry_run);
        assert!(options.migration.force_recheck);
        assert!(options.migration.create_missing_relations);
        assert_eq!(options.migration.row_error_policy, RowErrorPolicy::SkipRow);
        assert_eq!(options.migration.row_limit, Some(100));
        assert_eq!(options.migration.page_size, Some(50));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["fundsync-migrate"]).is_err());
    }

    #[test]
    fn test_bad_summary_format_is_rejected() {
        assert!(Cli::try_parse_from(["fundsync-migrate", "migrate", "--summary", "xml"]).is_err());
    }
}
