use super::{Executor, ExecutorError};
use std::{
    env,
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
    time::Instant,
};
use tracing::{debug, error, info, instrument, warn};

/// Executor that runs every query in its own child process, one at a time.
///
/// Children inherit stdio and the environment. There is no timeout, a hanging query blocks
/// the suite.
#[derive(Clone, Debug)]
pub struct LocalExecutor {
    program: PathBuf,
    args: Vec<OsString>,
}

impl LocalExecutor {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(|arg| arg.as_ref().to_owned()).collect(),
        }
    }

    /// re-invoke the running binary, forwarding the config file if one was given
    pub fn current(config: Option<&Path>) -> Result<Self, ExecutorError> {
        let program = env::current_exe().map_err(ExecutorError::EntryPoint)?;
        let args = match config {
            Some(path) => vec![OsString::from("--config"), path.as_os_str().to_owned()],
            None => Vec::new(),
        };

        Ok(Self::new(program, args))
    }

    fn command(&self, solution: &str, query: u32) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("query")
            .arg("--solution")
            .arg(solution)
            .arg(query.to_string());

        command
    }
}

impl Executor for LocalExecutor {
    #[instrument(skip(self), level = "info")]
    fn run(&mut self, solution: &str, query: u32) -> bool {
        let mut command = self.command(solution, query);
        debug!(command = ?command, "Spawning {solution}_queries.q{query}");

        let start = Instant::now();

        match command.status() {
            Ok(status) => {
                let elapsed = start.elapsed();

                if status.success() {
                    info!(
                        "Process of q{query} finished in {:.3} s",
                        elapsed.as_secs_f64()
                    );
                    true
                } else {
                    warn!(
                        "Process of q{query} exited with {status} after {:.3} s",
                        elapsed.as_secs_f64()
                    );
                    false
                }
            }
            Err(e) => {
                error!("Failed to spawn process for q{query}: {e}");
                false
            }
        }
    }
}
