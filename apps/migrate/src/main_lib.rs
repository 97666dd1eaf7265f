use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fundsync_core::migration::{MigrateHandler, RunSummary};
use fundsync_storage_sqlite::{
    create_pool, create_source_pool, init, run_migrations, SqliteAuthorizationSource,
    SqliteFundsSource, SqliteKiidSource, SqliteSessionFactory,
};

use crate::cli::{Command, SummaryFormat};
use crate::config::{Config, FUNDS_DATABASE_URL, KIID_DATABASE_URL, SALKKU_DATABASE_URL};

/// Text or JSON output selected by `FUNDSYNC_LOG_FORMAT`; `RUST_LOG` wins
/// over the default level. `log` records from the library crates are
/// forwarded through the subscriber.
pub fn init_tracing(debug: bool) {
    let log_format = std::env::var("FUNDSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

fn backend_sessions(config: &Config) -> anyhow::Result<Arc<SqliteSessionFactory>> {
    let db_path = init(config.backend_path()?)?;
    tracing::info!("Backend database in use: {}", db_path);
    let pool = create_pool(&db_path)?;
    run_migrations(&pool).context("backend schema migration failed")?;
    Ok(Arc::new(SqliteSessionFactory::new(pool)))
}

/// Wires the sources named by `command` and the backend into a handler.
pub fn build_handler(command: &Command, config: &Config) -> anyhow::Result<MigrateHandler> {
    let sessions = backend_sessions(config)?;
    let handler = match command {
        Command::Migrate(_) => {
            let funds = create_source_pool(config.funds_path()?)
                .with_context(|| format!("cannot open {}", FUNDS_DATABASE_URL))?;
            let salkku = create_source_pool(config.salkku_path()?)
                .with_context(|| format!("cannot open {}", SALKKU_DATABASE_URL))?;
            MigrateHandler::funds(
                Arc::new(SqliteFundsSource::new(funds)),
                Arc::new(SqliteAuthorizationSource::new(salkku)),
                sessions,
            )
        }
        Command::Kiid(_) => {
            let kiid = create_source_pool(config.kiid_path()?)
                .with_context(|| format!("cannot open {}", KIID_DATABASE_URL))?;
            MigrateHandler::kiid(Arc::new(SqliteKiidSource::new(kiid)), sessions)
        }
    };
    Ok(handler)
}

pub fn render_summary(summary: &RunSummary, format: SummaryFormat) -> anyhow::Result<String> {
    Ok(match format {
        SummaryFormat::Text => summary.render_text(),
        SummaryFormat::Json => summary.to_json()?,
    })
}

/// Runs one subcommand and prints its summary to stdout.
pub fn run(command: &Command, config: &Config) -> anyhow::Result<RunSummary> {
    let args = command.args();
    let mut handler = build_handler(command, config)?;
    tracing::info!("Tasks: {}", handler.task_names().join(", "));
    let summary = handler.run(&args.run_options())?;
    println!("{}", render_summary(&summary, args.summary)?);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use tempfile::tempdir;

    #[test]
    fn test_missing_backend_url_is_fatal() {
        let cli = Cli::try_parse_from(["fundsync-migrate", "kiid"]).unwrap();
        let err = build_handler(&cli.command, &Config::default()).err().unwrap();
        assert!(err.to_string().contains("BACKEND_DATABASE_URL"));
    }

    #[test]
    fn test_missing_source_file_is_fatal() {
        let dir = tempdir().unwrap();
        let config = Config {
            backend_url: Some(dir.path().join("backend.db").to_string_lossy().to_string()),
            kiid_url: Some(dir.path().join("absent.db").to_string_lossy().to_string()),
            ..Config::default()
        };
        let cli = Cli::try_parse_from(["fundsync-migrate", "kiid"]).unwrap();
        assert!(build_handler(&cli.command, &config).is_err());
    }
}
