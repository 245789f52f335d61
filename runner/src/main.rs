mod config;
mod dataset;
mod engine;
mod executors;
mod queries;
mod runner;
#[cfg(test)]
mod testing;
mod timer;
mod timings;
mod toggle;
mod validate;

use crate::{
    config::{ConfigErrors, ConfigFile, RunConfig},
    engine::Solutions,
    executors::{execute_all, ExecutorError, LocalExecutor},
    queries::{run_single, NUM_QUERIES},
    runner::RunnerError,
    timings::{summarize, TimingsError, TimingsLog},
};
use clap::{Parser, Subcommand};
use std::{error::Error as StdError, path::PathBuf, process::ExitCode};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// TPC-H benchmark harness for dataframe engines
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// YAML file with settings, environment variables take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run all 22 queries, each in its own process
    RunAll {
        #[arg(long, default_value = "polars")]
        solution: String,
    },
    /// Run a single query in this process
    Query {
        #[arg(long, default_value = "polars")]
        solution: String,
        #[arg(value_parser = clap::value_parser!(u32).range(1..=NUM_QUERIES as i64))]
        query: u32,
    },
    /// Print per-query statistics of the timings log
    Summary,
}

#[derive(Error, Debug)]
enum MainError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigErrors),
    #[error("Query failed")]
    Runner(#[from] RunnerError),
    #[error("Executor failed")]
    Executor(#[from] ExecutorError),
    #[error("Timings log unavailable")]
    Timings(#[from] TimingsError),
}

fn run(cli: Cli) -> Result<ExitCode, MainError> {
    let file = cli.config.as_deref().map(ConfigFile::load).transpose()?;
    let config = RunConfig::from_env(file)?;
    config.log_summary();

    let paths = config.paths();
    paths.prepare()?;

    if config.write_plot {
        warn!(plots_dir = ?paths.plots_dir, "WRITE_PLOT is set, plots are not produced by this harness");
    }

    match cli.command {
        Commands::RunAll { solution } => {
            // fail before spawning anything
            Solutions::load(&solution)?;

            let mut executor = LocalExecutor::current(cli.config.as_deref())?;
            let report = execute_all(&mut executor, &solution);

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Query { solution, query } => {
            match Solutions::load(&solution)? {
                #[cfg(feature = "polars")]
                Solutions::Polars(engine) => {
                    let outcome = run_single(&engine, &config, &paths, query)?;
                    info!(
                        "q{} collected in {:.5} s",
                        outcome.query, outcome.duration
                    );
                }
            }

            Ok(ExitCode::SUCCESS)
        }
        Commands::Summary => {
            let log = TimingsLog::new(&paths.timings_file, config.include_io);

            println!("solution,query_no,runs,successes,mean_duration[s]");
            for summary in summarize(&log.read_records()?) {
                println!(
                    "{},{},{},{},{:.5}",
                    summary.solution,
                    summary.query,
                    summary.runs,
                    summary.successes,
                    summary.mean_duration
                );
            }

            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");

            let mut source = e.source();
            while let Some(cause) = source {
                error!("caused by: {cause}");
                source = cause.source();
            }

            ExitCode::FAILURE
        }
    }
}
