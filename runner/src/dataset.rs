use crate::{
    config::{Paths, RunConfig},
    engine::{Engine, EngineError},
    toggle::OnSecondCall,
    validate::Frame,
};
use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};
use tracing::{debug, instrument};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TpchTable {
    Lineitem,
    Orders,
    Customer,
    Region,
    Nation,
    Supplier,
    Part,
    Partsupp,
}

impl TpchTable {
    pub const ALL: [TpchTable; 8] = [
        Self::Lineitem,
        Self::Orders,
        Self::Customer,
        Self::Region,
        Self::Nation,
        Self::Supplier,
        Self::Part,
        Self::Partsupp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lineitem => "lineitem",
            Self::Orders => "orders",
            Self::Customer => "customer",
            Self::Region => "region",
            Self::Nation => "nation",
            Self::Supplier => "supplier",
            Self::Part => "part",
            Self::Partsupp => "partsupp",
        }
    }
}

impl FromStr for TpchTable {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.name() == value)
            .ok_or_else(|| format!("unknown TPC-H table: {value}"))
    }
}

impl fmt::Display for TpchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scan a table, collecting it into memory right away unless IO is part of the measurement
pub fn scan_ds<E: Engine>(
    engine: &E,
    config: &RunConfig,
    dataset_dir: &Path,
    table: TpchTable,
) -> Result<E::Lazy, EngineError> {
    // partitioned tables are split over several files sharing the prefix
    let path = dataset_dir.join(format!("{}.{}*", table.name(), config.file_type));
    let scan = engine.scan(&path, config.file_type)?;

    if config.include_io {
        Ok(scan)
    } else {
        engine.cache(scan)
    }
}

type TableLoader<'a, E> = OnSecondCall<
    Box<dyn FnMut(&TpchTable) -> Result<<E as Engine>::Lazy, EngineError> + 'a>,
    <E as Engine>::Lazy,
>;

/// Table access for a single query run, every table goes through its own `OnSecondCall`
pub struct DatasetLoader<'a, E: Engine> {
    engine: &'a E,
    config: &'a RunConfig,
    paths: &'a Paths,
    loaders: BTreeMap<TpchTable, TableLoader<'a, E>>,
}

impl<'a, E: Engine> DatasetLoader<'a, E> {
    pub fn new(engine: &'a E, config: &'a RunConfig, paths: &'a Paths) -> Self {
        Self {
            engine,
            config,
            paths,
            loaders: BTreeMap::new(),
        }
    }

    fn invoke(&mut self, table: TpchTable) -> Result<Option<E::Lazy>, EngineError> {
        let (engine, config, paths) = (self.engine, self.config, self.paths);

        self.loaders
            .entry(table)
            .or_insert_with(|| {
                let scan: Box<dyn FnMut(&TpchTable) -> Result<E::Lazy, EngineError> + 'a> =
                    Box::new(move |table: &TpchTable| {
                        scan_ds(engine, config, &paths.dataset_dir, *table)
                    });

                OnSecondCall::new(config.include_io, scan)
            })
            .invoke(&table)
    }

    /// first, untimed call for every table
    #[instrument(level = "debug", skip(self))]
    pub fn warm(&mut self, tables: &[TpchTable]) -> Result<(), EngineError> {
        for table in tables {
            self.invoke(*table)?;
        }

        Ok(())
    }

    /// second call, returns the cached table or scans it now when IO is measured
    pub fn load(&mut self, table: TpchTable) -> Result<E::Lazy, EngineError> {
        self.invoke(table)?
            .ok_or(EngineError::NotLoaded(table.name()))
    }
}

/// Reference answer of a query, with column names and string cells trimmed
pub fn load_answer<E: Engine>(engine: &E, paths: &Paths, query: u32) -> Result<Frame, EngineError> {
    let path = paths.answer_file(query);
    debug!(path = ?path, "Loading reference answer");

    let answer = engine.read_csv(&path)?;

    Ok(engine.to_frame(&answer)?.normalized())
}
