mod cli;
mod config;
mod main_lib;

use anyhow::bail;
use clap::Parser;

use cli::Cli;
use config::Config;
use main_lib::{init_tracing, run};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.command.args().debug);
    let config = Config::from_env();

    let summary = run(&cli.command, &config)?;
    if summary.has_failures() {
        bail!("failed tasks: {}", summary.failed_tasks().join(", "));
    }
    Ok(())
}
