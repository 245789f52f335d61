use std::time::{Duration, Instant};
use tracing::info;

/// Logs the wall-clock time of the enclosing block when dropped
#[derive(Debug)]
pub struct CodeTimer {
    name: String,
    start: Instant,
}

impl CodeTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for CodeTimer {
    fn drop(&mut self) {
        info!(
            "Code block '{}' took: {:.5} s",
            self.name,
            self.elapsed().as_secs_f64()
        );
    }
}
