use itertools::Itertools;
use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};
use thiserror::Error;
use tracing::{debug, instrument};

pub const HEADER: &str = "solution,version,query_no,duration[s],include_io,success";

#[derive(Error, Debug)]
pub enum TimingsError {
    #[error("Failed to access timings log {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed row {line} in timings log: {row}")]
    Malformed { line: usize, row: String },
}

/// One measurement of a single query execution
#[derive(Clone, Debug, PartialEq)]
pub struct TimingRecord {
    pub solution: String,
    pub version: String,
    pub query: String,
    /// duration in seconds
    pub duration: f64,
    pub include_io: bool,
    pub success: bool,
}

// booleans are written capitalized to stay readable by existing log consumers
fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "True" | "true" => Some(true),
        "False" | "false" => Some(false),
        _ => None,
    }
}

impl TimingRecord {
    pub fn to_row(&self) -> String {
        let duration = self.duration.to_string();

        [
            self.solution.as_str(),
            self.version.as_str(),
            self.query.as_str(),
            duration.as_str(),
            format_bool(self.include_io),
            format_bool(self.success),
        ]
        .iter()
        .join(",")
    }

    pub fn from_row(row: &str) -> Option<Self> {
        let (solution, version, query, duration, include_io, success) =
            row.split(',').collect_tuple()?;

        Some(Self {
            solution: solution.to_string(),
            version: version.to_string(),
            query: query.to_string(),
            duration: duration.parse().ok()?,
            include_io: parse_bool(include_io)?,
            success: parse_bool(success)?,
        })
    }
}

/// Append-only CSV log shared by every query process of a run
#[derive(Clone, Debug)]
pub struct TimingsLog {
    path: PathBuf,
    include_io: bool,
}

impl TimingsLog {
    pub fn new(path: impl Into<PathBuf>, include_io: bool) -> Self {
        Self {
            path: path.into(),
            include_io,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> TimingsError {
        TimingsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Append a single row, writing the header first if the file is empty.
    /// The file is opened and closed on every call, no handle is held across queries.
    #[instrument(level = "debug", skip(self))]
    pub fn append_row(
        &self,
        solution: &str,
        query: &str,
        secs: f64,
        version: &str,
        success: bool,
    ) -> Result<(), TimingsError> {
        self.append(&TimingRecord {
            solution: solution.to_string(),
            version: version.to_string(),
            query: query.to_string(),
            duration: secs,
            include_io: self.include_io,
            success,
        })
    }

    pub fn append(&self, record: &TimingRecord) -> Result<(), TimingsError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| self.io_error(error))?;

        // an existing but empty file still needs its header
        let is_empty = file
            .metadata()
            .map_err(|error| self.io_error(error))?
            .len()
            == 0;

        let mut buffer = String::new();
        if is_empty {
            debug!(path = ?self.path, "Writing timings header");
            buffer.push_str(HEADER);
            buffer.push('\n');
        }
        buffer.push_str(&record.to_row());
        buffer.push('\n');

        file.write_all(buffer.as_bytes())
            .map_err(|error| self.io_error(error))
    }

    /// Read every data row back, the header is skipped wherever it appears
    pub fn read_records(&self) -> Result<Vec<TimingRecord>, TimingsError> {
        let file = File::open(&self.path).map_err(|error| self.io_error(error))?;
        let mut records = Vec::new();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|error| self.io_error(error))?;

            if line.is_empty() || line == HEADER {
                continue;
            }

            match TimingRecord::from_row(&line) {
                Some(record) => records.push(record),
                None => {
                    return Err(TimingsError::Malformed {
                        line: index + 1,
                        row: line,
                    })
                }
            }
        }

        Ok(records)
    }
}

/// Aggregate over every logged run of one query
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySummary {
    pub solution: String,
    pub query: String,
    pub runs: usize,
    pub successes: usize,
    pub mean_duration: f64,
}

fn query_number(query: &str) -> u32 {
    query.trim_start_matches('q').parse().unwrap_or(u32::MAX)
}

/// group records by solution and query, ordered by query number
pub fn summarize(records: &[TimingRecord]) -> Vec<QuerySummary> {
    records
        .iter()
        .into_group_map_by(|record| (record.solution.clone(), record.query.clone()))
        .into_iter()
        .map(|((solution, query), group)| QuerySummary {
            runs: group.len(),
            successes: group.iter().filter(|record| record.success).count(),
            mean_duration: group.iter().map(|record| record.duration).sum::<f64>()
                / group.len() as f64,
            solution,
            query,
        })
        .sorted_by(|left, right| {
            (left.solution.as_str(), query_number(&left.query), left.query.as_str()).cmp(&(
                right.solution.as_str(),
                query_number(&right.query),
                right.query.as_str(),
            ))
        })
        .collect()
}
