#[cfg(feature = "polars")]
pub mod polars;

use crate::{
    config::{ConfigErrors, FileType},
    dataset::TpchTable,
    queries::Query,
    validate::Frame,
};
use std::{io, path::Path, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[cfg(feature = "polars")]
    #[error("Polars failed")]
    Polars(#[from] ::polars::prelude::PolarsError),
    #[error("Failed to write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Table {0} was not loaded before building the query")]
    NotLoaded(&'static str),
    #[cfg(test)]
    #[error("{0}")]
    Other(String),
}

/// The dataframe library a solution benchmarks.
///
/// `Lazy` is a deferred plan, reading it costs nothing until it is collected into
/// `Materialized`.
pub trait Engine {
    type Lazy: Clone;
    type Materialized;

    /// name used in the timings log
    fn solution(&self) -> &str;

    fn version(&self) -> &str;

    /// lazily scan every file matching `path`
    fn scan(&self, path: &Path, file_type: FileType) -> Result<Self::Lazy, EngineError>;

    /// collect eagerly and wrap the in-memory table into a lazy handle again
    fn cache(&self, lazy: Self::Lazy) -> Result<Self::Lazy, EngineError>;

    fn collect(&self, lazy: Self::Lazy) -> Result<Self::Materialized, EngineError>;

    fn describe_optimized_plan(&self, lazy: &Self::Lazy) -> Result<String, EngineError>;

    /// build the lazy plan of a query from its input tables
    fn plan(
        &self,
        query: &Query,
        tables: Vec<(TpchTable, Self::Lazy)>,
    ) -> Result<Self::Lazy, EngineError>;

    /// read a CSV file with header, parsing date columns
    fn read_csv(&self, path: &Path) -> Result<Self::Materialized, EngineError>;

    fn to_frame(&self, materialized: &Self::Materialized) -> Result<Frame, EngineError>;

    fn write_csv(
        &self,
        materialized: &mut Self::Materialized,
        path: &Path,
    ) -> Result<(), EngineError>;

    fn display(&self, materialized: &Self::Materialized) -> String;
}

/// All solutions this binary can benchmark, selected by name
#[derive(Clone, Debug)]
pub enum Solutions {
    #[cfg(feature = "polars")]
    Polars(polars::PolarsEngine),
}

impl Solutions {
    pub fn load(name: &str) -> Result<Self, ConfigErrors> {
        match name.to_lowercase().as_str() {
            #[cfg(feature = "polars")]
            "polars" => Ok(Self::Polars(polars::PolarsEngine)),
            _ => Err(ConfigErrors::UnsupportedSolution(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_solution_is_a_config_error() {
        assert!(matches!(
            Solutions::load("pandas"),
            Err(ConfigErrors::UnsupportedSolution(name)) if name == "pandas"
        ));
    }

    #[cfg(feature = "polars")]
    #[test]
    fn polars_is_available() {
        assert!(matches!(Solutions::load("Polars"), Ok(Solutions::Polars(_))));
    }
}
