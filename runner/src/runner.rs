use crate::{
    config::{Paths, RunConfig},
    dataset::load_answer,
    engine::{Engine, EngineError},
    timer::CodeTimer,
    timings::{TimingsError, TimingsLog},
    validate::{assert_frame_equal, ValidationError},
};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument};

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Query {0} does not exist, TPC-H defines queries 1 to 22")]
    UnknownQuery(u32),
    #[error("Engine failed")]
    Engine(#[from] EngineError),
    #[error("Result validation failed")]
    Validation(#[from] ValidationError),
    #[error("Failed to record timing")]
    Timings(#[from] TimingsError),
}

/// Measurement of a single, successful query run
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOutcome {
    pub query: u32,
    /// seconds spent collecting the result
    pub duration: f64,
}

fn test_results<E: Engine>(
    engine: &E,
    paths: &Paths,
    query: u32,
    result: &E::Materialized,
) -> Result<(), RunnerError> {
    let _timer = CodeTimer::new(format!(
        "Testing result of {} Query {query}",
        engine.solution()
    ));

    let answer = load_answer(engine, paths, query)?;
    let result = engine.to_frame(result)?.normalized();

    Ok(assert_frame_equal(query, &result, &answer)?)
}

/// Execute a query plan and measure the time spent materializing it.
///
/// With timing logs enabled exactly one row is appended per call. The row is written after
/// validation, so its `success` column is false if either collecting or validating failed;
/// that error is returned once the row is written.
#[instrument(skip(engine, config, paths, plan), fields(solution = engine.solution()))]
pub fn run_query<E: Engine>(
    engine: &E,
    config: &RunConfig,
    paths: &Paths,
    query: u32,
    plan: E::Lazy,
) -> Result<QueryOutcome, RunnerError> {
    let _timer = CodeTimer::new(format!(
        "Overall execution of {} Query {query}",
        engine.solution()
    ));

    if config.show_plan {
        println!("{}", engine.describe_optimized_plan(&plan)?);
    }

    let (collected, duration) = {
        let _timer = CodeTimer::new(format!("Get result of {} Query {query}", engine.solution()));
        let start = Instant::now();
        let collected = engine.collect(plan);

        (collected, start.elapsed().as_secs_f64())
    };

    let checked = collected.map_err(RunnerError::from).and_then(|result| {
        if config.test_results {
            test_results(engine, paths, query, &result)?;
        }

        Ok(result)
    });

    if config.log_timings {
        let logged = TimingsLog::new(&paths.timings_file, config.include_io).append_row(
            engine.solution(),
            &format!("q{query}"),
            duration,
            engine.version(),
            checked.is_ok(),
        );

        match (logged, &checked) {
            (Ok(()), _) => {}
            (Err(log_error), Ok(_)) => return Err(log_error.into()),
            // the query error takes precedence, the logging failure is only reported
            (Err(log_error), Err(_)) => {
                error!(error = ?log_error, "Failed to record timing of failed query {query}")
            }
        }
    }

    let mut result = checked?;

    if config.show_results {
        println!("{}", engine.display(&result));
    }

    if config.save_results {
        let output_file = paths.result_file(query);
        info!("Saving Results to {}", output_file.display());

        engine.write_csv(&mut result, &output_file)?;
    }

    Ok(QueryOutcome { query, duration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{MemoryEngine, MemoryLazy},
        timings::{TimingRecord, HEADER},
        validate::{Cell, Frame},
    };
    use std::fs;

    fn revenue(value: f64) -> Frame {
        Frame::new(
            vec!["l_returnflag".to_string(), "revenue".to_string()],
            vec![
                vec![Cell::Str("A".to_string()), Cell::Float(value)],
                vec![Cell::Str("N".to_string()), Cell::Int(7)],
            ],
        )
    }

    fn config(dir: &tempfile::TempDir) -> RunConfig {
        RunConfig {
            log_timings: true,
            output_base_dir: dir.path().to_path_buf(),
            ..RunConfig::default()
        }
    }

    #[test]
    fn logs_one_row_per_query() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let paths = config.paths();
        paths.prepare().unwrap();
        let engine = MemoryEngine::tpch();

        for query in 1..=22 {
            run_query(&engine, &config, &paths, query, MemoryLazy::new(revenue(1.0))).unwrap();
        }

        let records = TimingsLog::new(&paths.timings_file, false)
            .read_records()
            .unwrap();
        assert_eq!(records.len(), 22);
        assert!(records.iter().all(|record| record.success));
        assert_eq!(records[0].solution, "memory");
        assert_eq!(records[0].version, "0.0.1");
        assert_eq!(records[21].query, "q22");

        let content = fs::read_to_string(&paths.timings_file).unwrap();
        assert_eq!(content.lines().filter(|line| *line == HEADER).count(), 1);
    }

    #[test]
    fn nothing_is_logged_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            log_timings: false,
            ..config(&dir)
        };
        let paths = config.paths();
        paths.prepare().unwrap();

        run_query(&MemoryEngine::tpch(), &config, &paths, 1, MemoryLazy::new(revenue(1.0)))
            .unwrap();

        assert!(!paths.timings_file.exists());
    }

    #[test]
    fn validation_mismatch_names_the_query_and_logs_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            test_results: true,
            ..config(&dir)
        };
        let paths = config.paths();
        paths.prepare().unwrap();
        let engine = MemoryEngine::tpch().with_answer(paths.answer_file(1), revenue(2.5));

        let error = run_query(&engine, &config, &paths, 1, MemoryLazy::new(revenue(2.0)))
            .unwrap_err();

        match error {
            RunnerError::Validation(ValidationError::Value { query, column, .. }) => {
                assert_eq!(query, 1);
                assert_eq!(column, "revenue");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let records = TimingsLog::new(&paths.timings_file, false)
            .read_records()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
    }

    #[test]
    fn validation_passes_with_reordered_rows_and_int_floats() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            test_results: true,
            ..config(&dir)
        };
        let paths = config.paths();
        paths.prepare().unwrap();
        let mut answer = revenue(2.0);
        answer.rows.reverse();
        answer.rows[0][1] = Cell::Float(7.0);
        let engine = MemoryEngine::tpch().with_answer(paths.answer_file(1), answer);

        run_query(&engine, &config, &paths, 1, MemoryLazy::new(revenue(2.0))).unwrap();
    }

    #[test]
    fn collect_failure_is_logged_and_returned() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let paths = config.paths();
        paths.prepare().unwrap();

        let result = run_query(&MemoryEngine::tpch(), &config, &paths, 9, MemoryLazy::failing());

        assert!(matches!(result, Err(RunnerError::Engine(_))));
        let records = TimingsLog::new(&paths.timings_file, false)
            .read_records()
            .unwrap();
        assert_eq!(
            records
                .iter()
                .map(|record| (record.query.as_str(), record.success))
                .collect::<Vec<_>>(),
            vec![("q9", false)]
        );
    }

    #[test]
    fn include_io_flag_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            include_io: true,
            ..config(&dir)
        };
        let paths = config.paths();
        paths.prepare().unwrap();

        run_query(&MemoryEngine::tpch(), &config, &paths, 3, MemoryLazy::new(revenue(1.0)))
            .unwrap();

        let records: Vec<TimingRecord> = TimingsLog::new(&paths.timings_file, true)
            .read_records()
            .unwrap();
        assert!(records[0].include_io);
    }

    #[test]
    fn results_are_saved_per_query() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            log_timings: false,
            save_results: true,
            show_results: true,
            show_plan: true,
            ..config(&dir)
        };
        let paths = config.paths();
        paths.prepare().unwrap();

        run_query(&MemoryEngine::tpch(), &config, &paths, 12, MemoryLazy::new(revenue(1.5)))
            .unwrap();

        let saved = fs::read_to_string(paths.result_file(12)).unwrap();
        assert_eq!(saved, "l_returnflag,revenue\n\"A\",1.5\n\"N\",7\n");
    }
}
