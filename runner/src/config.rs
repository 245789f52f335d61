use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, info};

// environment variables, each one optional
pub const INCLUDE_IO: &str = "INCLUDE_IO";
pub const SHOW_RESULTS: &str = "SHOW_RESULTS";
pub const LOG_TIMINGS: &str = "LOG_TIMINGS";
pub const SCALE_FACTOR: &str = "SCALE_FACTOR";
pub const PARTITION: &str = "PARTITION";
pub const WRITE_PLOT: &str = "WRITE_PLOT";
pub const FILE_TYPE: &str = "FILE_TYPE";
pub const DATA_BASE_DIR: &str = "DATA_BASE_DIR";
pub const OUTPUT_BASE_DIR: &str = "OUTPUT_BASE_DIR";
pub const TEST_RESULTS: &str = "TEST_RESULTS";
pub const SHOW_PLAN: &str = "SHOW_PLAN";
pub const SAVE_RESULTS: &str = "SAVE_RESULTS";

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("file type: {0} not expected, use `parquet` or `feather`")]
    UnsupportedFileType(String),
    #[error("Solution not supported: {0}")]
    UnsupportedSolution(String),
    #[error("Failed to read config file {path:?}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Config file could not be parsed")]
    InvalidConfigFile(#[from] serde_yaml::Error),
    #[error("Failed to create output directory {path:?}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Storage format of the generated TPC-H tables
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Parquet,
    /// arrow IPC files
    Feather,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Feather => "feather",
        }
    }
}

impl FromStr for FileType {
    type Err = ConfigErrors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "parquet" => Ok(Self::Parquet),
            "feather" => Ok(Self::Feather),
            other => Err(ConfigErrors::UnsupportedFileType(other.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Optional YAML layer below the environment, keys mirror the environment variables
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub include_io: Option<bool>,
    pub show_results: Option<bool>,
    pub log_timings: Option<bool>,
    pub scale_factor: Option<String>,
    pub partition: Option<String>,
    pub write_plot: Option<bool>,
    pub file_type: Option<String>,
    pub data_base_dir: Option<PathBuf>,
    pub output_base_dir: Option<PathBuf>,
    pub test_results: Option<bool>,
    pub show_plan: Option<bool>,
    pub save_results: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let content = fs::read_to_string(path).map_err(|source| ConfigErrors::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Snapshot of the benchmark settings, read once at startup and never mutated
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub include_io: bool,
    pub show_results: bool,
    pub log_timings: bool,
    pub scale_factor: String,
    pub partition: String,
    pub write_plot: bool,
    pub file_type: FileType,
    pub data_base_dir: PathBuf,
    pub output_base_dir: PathBuf,
    pub test_results: bool,
    pub show_plan: bool,
    pub save_results: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            include_io: false,
            show_results: false,
            log_timings: false,
            scale_factor: String::from("1"),
            partition: String::from("1"),
            write_plot: false,
            file_type: FileType::Parquet,
            data_base_dir: PathBuf::from("."),
            output_base_dir: PathBuf::from("."),
            test_results: false,
            show_plan: false,
            save_results: false,
        }
    }
}

/// interpret an environment flag, unset and the usual negative spellings are false
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

impl RunConfig {
    /// build from the process environment, on top of an optional config file
    pub fn from_env(file: Option<ConfigFile>) -> Result<Self, ConfigErrors> {
        Self::from_lookup(file, |key| std::env::var(key).ok())
    }

    /// build from an arbitrary variable lookup, on top of an optional config file
    pub fn from_lookup<F>(file: Option<ConfigFile>, lookup: F) -> Result<Self, ConfigErrors>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let flag = |key: &str, from_file: Option<bool>, default: bool| match lookup(key) {
            Some(value) => parse_flag(&value),
            None => from_file.unwrap_or(default),
        };
        let string = |key: &str, from_file: Option<String>, default: String| {
            lookup(key).or(from_file).unwrap_or(default)
        };

        let file_type = match lookup(FILE_TYPE).or(file.file_type) {
            Some(value) => value.parse()?,
            None => defaults.file_type,
        };

        Ok(Self {
            include_io: flag(INCLUDE_IO, file.include_io, defaults.include_io),
            show_results: flag(SHOW_RESULTS, file.show_results, defaults.show_results),
            log_timings: flag(LOG_TIMINGS, file.log_timings, defaults.log_timings),
            scale_factor: string(SCALE_FACTOR, file.scale_factor, defaults.scale_factor),
            partition: string(PARTITION, file.partition, defaults.partition),
            write_plot: flag(WRITE_PLOT, file.write_plot, defaults.write_plot),
            file_type,
            data_base_dir: lookup(DATA_BASE_DIR)
                .map(PathBuf::from)
                .or(file.data_base_dir)
                .unwrap_or(defaults.data_base_dir),
            output_base_dir: lookup(OUTPUT_BASE_DIR)
                .map(PathBuf::from)
                .or(file.output_base_dir)
                .unwrap_or(defaults.output_base_dir),
            test_results: flag(TEST_RESULTS, file.test_results, defaults.test_results),
            show_plan: flag(SHOW_PLAN, file.show_plan, defaults.show_plan),
            save_results: flag(SAVE_RESULTS, file.save_results, defaults.save_results),
        })
    }

    pub fn paths(&self) -> Paths {
        let tpch_dir = self
            .data_base_dir
            .join("resources/tpc-h/data")
            .join(format!("scale={}", self.scale_factor));
        let output_dir = self
            .output_base_dir
            .join("outputs")
            .join(format!("scale={}", self.scale_factor))
            .join(format!("partition={}", self.partition));

        Paths {
            dataset_dir: tpch_dir
                .join(format!("partition={}", self.partition))
                .join("parquet"),
            answers_dir: tpch_dir.join("original"),
            timings_file: output_dir.join("timings.csv"),
            plots_dir: output_dir.join("plots"),
            output_dir,
        }
    }

    pub fn log_summary(&self) {
        info!("include io: {}", self.include_io);
        info!("show results: {}", self.show_results);
        info!("log timings: {}", self.log_timings);
        info!("file type: {}", self.file_type);
        debug!(config = ?self, "Effective run configuration");
    }
}

/// Filesystem layout derived from scale factor and partition
#[derive(Clone, Debug, PartialEq)]
pub struct Paths {
    pub dataset_dir: PathBuf,
    pub answers_dir: PathBuf,
    pub output_dir: PathBuf,
    pub timings_file: PathBuf,
    pub plots_dir: PathBuf,
}

impl Paths {
    /// create the output directory, an existing directory is fine
    pub fn prepare(&self) -> Result<(), ConfigErrors> {
        fs::create_dir_all(&self.output_dir).map_err(|source| ConfigErrors::OutputDirectory {
            path: self.output_dir.clone(),
            source,
        })
    }

    pub fn answer_file(&self, query: u32) -> PathBuf {
        self.answers_dir.join(format!("{query}.csv"))
    }

    pub fn result_file(&self, query: u32) -> PathBuf {
        self.output_dir.join(format!("q{query}.csv"))
    }
}
