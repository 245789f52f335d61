//! In-memory engine used by the unit tests

use crate::{
    config::FileType,
    dataset::TpchTable,
    engine::{Engine, EngineError},
    queries::Query,
    validate::{Cell, Frame},
};
use std::{
    cell::{Cell as Counter, RefCell},
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryLazy {
    frame: Frame,
    cached: bool,
    fail: bool,
}

impl MemoryLazy {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            cached: false,
            fail: false,
        }
    }

    /// a plan whose collection fails
    pub fn failing() -> Self {
        Self {
            frame: Frame::default(),
            cached: false,
            fail: true,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: BTreeMap<String, Frame>,
    answers: BTreeMap<PathBuf, Frame>,
    scanned: RefCell<Vec<PathBuf>>,
    caches: Counter<usize>,
    collects: Counter<usize>,
}

impl MemoryEngine {
    /// every TPC-H table with a single row holding its name
    pub fn tpch() -> Self {
        let tables = TpchTable::ALL
            .into_iter()
            .map(|table| {
                (
                    table.name().to_string(),
                    Frame::new(
                        vec!["name".to_string()],
                        vec![vec![Cell::Str(table.name().to_string())]],
                    ),
                )
            })
            .collect();

        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn with_answer(mut self, path: PathBuf, frame: Frame) -> Self {
        self.answers.insert(path, frame);
        self
    }

    pub fn scans(&self) -> usize {
        self.scanned.borrow().len()
    }

    pub fn scanned_paths(&self) -> Vec<PathBuf> {
        self.scanned.borrow().clone()
    }

    pub fn caches(&self) -> usize {
        self.caches.get()
    }

    pub fn collects(&self) -> usize {
        self.collects.get()
    }
}

impl Engine for MemoryEngine {
    type Lazy = MemoryLazy;
    type Materialized = Frame;

    fn solution(&self) -> &str {
        "memory"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    fn scan(&self, path: &Path, _file_type: FileType) -> Result<MemoryLazy, EngineError> {
        self.scanned.borrow_mut().push(path.to_path_buf());

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .unwrap_or_default();

        self.tables
            .get(name)
            .cloned()
            .map(MemoryLazy::new)
            .ok_or_else(|| EngineError::Other(format!("no table behind {path:?}")))
    }

    fn cache(&self, lazy: MemoryLazy) -> Result<MemoryLazy, EngineError> {
        self.caches.set(self.caches.get() + 1);

        Ok(MemoryLazy {
            cached: true,
            ..lazy
        })
    }

    fn collect(&self, lazy: MemoryLazy) -> Result<Frame, EngineError> {
        self.collects.set(self.collects.get() + 1);

        if lazy.fail {
            Err(EngineError::Other("collect failed".to_string()))
        } else {
            Ok(lazy.frame)
        }
    }

    fn describe_optimized_plan(&self, lazy: &MemoryLazy) -> Result<String, EngineError> {
        Ok(format!("SCAN {:?}", lazy.frame.columns))
    }

    /// concatenates the single-column input tables
    fn plan(
        &self,
        _query: &Query,
        tables: Vec<(TpchTable, MemoryLazy)>,
    ) -> Result<MemoryLazy, EngineError> {
        let rows = tables
            .into_iter()
            .flat_map(|(_, lazy)| lazy.frame.rows)
            .collect();

        Ok(MemoryLazy::new(Frame::new(vec!["name".to_string()], rows)))
    }

    fn read_csv(&self, path: &Path) -> Result<Frame, EngineError> {
        self.answers
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::Other(format!("no answer at {path:?}")))
    }

    fn to_frame(&self, materialized: &Frame) -> Result<Frame, EngineError> {
        Ok(materialized.clone())
    }

    fn write_csv(&self, materialized: &mut Frame, path: &Path) -> Result<(), EngineError> {
        let mut content = materialized.columns.join(",");
        content.push('\n');
        for row in &materialized.rows {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            content.push_str(&cells.join(","));
            content.push('\n');
        }

        fs::write(path, content).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn display(&self, materialized: &Frame) -> String {
        format!("{materialized:?}")
    }
}
