mod local;

pub use local::LocalExecutor;

use crate::{queries::NUM_QUERIES, timer::CodeTimer};
use itertools::Itertools;
use std::io;
use thiserror::Error;
use tracing::{error, info, instrument};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to locate the query entry point")]
    EntryPoint(#[source] io::Error),
}

/// Runs a single query of a solution in isolation
pub trait Executor {
    /// returns whether the query finished successfully
    fn run(&mut self, solution: &str, query: u32) -> bool;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SuiteReport {
    pub succeeded: Vec<u32>,
    pub failed: Vec<u32>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run queries 1 to 22 one after another.
/// A failing query is reported and the suite carries on with the next one.
#[instrument(skip(executor))]
pub fn execute_all<X: Executor>(executor: &mut X, solution: &str) -> SuiteReport {
    let _timer = CodeTimer::new(format!("Overall execution of ALL {solution} queries"));
    let mut report = SuiteReport::default();

    for query in 1..=NUM_QUERIES {
        if executor.run(solution, query) {
            report.succeeded.push(query);
        } else {
            error!("{solution}_queries.q{query} failed, continuing with the next query");
            report.failed.push(query);
        }
    }

    if report.is_success() {
        info!("All {NUM_QUERIES} {solution} queries finished");
    } else {
        error!(
            "{} of {NUM_QUERIES} {solution} queries failed: {}",
            report.failed.len(),
            report.failed.iter().map(|query| format!("q{query}")).join(", ")
        );
    }

    report
}
