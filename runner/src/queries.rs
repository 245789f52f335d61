use crate::{
    config::{Paths, RunConfig},
    dataset::{DatasetLoader, TpchTable::{self, *}},
    engine::{Engine, EngineError},
    runner::{run_query, QueryOutcome, RunnerError},
};
use tracing::instrument;

pub const NUM_QUERIES: u32 = 22;

/// One TPC-H query and the tables it reads, each engine builds its own plan for it
#[derive(Debug)]
pub struct Query {
    pub number: u32,
    pub tables: &'static [TpchTable],
}

macro_rules! query {
    ($number:literal, [$($table:ident),+]) => {
        Query {
            number: $number,
            tables: &[$($table),+],
        }
    };
}

pub static QUERIES: [Query; NUM_QUERIES as usize] = [
    query!(1, [Lineitem]),
    query!(2, [Part, Supplier, Partsupp, Nation, Region]),
    query!(3, [Customer, Orders, Lineitem]),
    query!(4, [Orders, Lineitem]),
    query!(5, [Customer, Orders, Lineitem, Supplier, Nation, Region]),
    query!(6, [Lineitem]),
    query!(7, [Supplier, Lineitem, Orders, Customer, Nation]),
    query!(8, [Part, Supplier, Lineitem, Orders, Customer, Nation, Region]),
    query!(9, [Part, Supplier, Lineitem, Partsupp, Orders, Nation]),
    query!(10, [Customer, Orders, Lineitem, Nation]),
    query!(11, [Partsupp, Supplier, Nation]),
    query!(12, [Orders, Lineitem]),
    query!(13, [Customer, Orders]),
    query!(14, [Lineitem, Part]),
    query!(15, [Lineitem, Supplier]),
    query!(16, [Partsupp, Part, Supplier]),
    query!(17, [Lineitem, Part]),
    query!(18, [Customer, Orders, Lineitem]),
    query!(19, [Lineitem, Part]),
    query!(20, [Supplier, Nation, Partsupp, Part, Lineitem]),
    query!(21, [Supplier, Lineitem, Orders, Nation]),
    query!(22, [Customer, Orders]),
];

impl Query {
    pub fn get(number: u32) -> Result<&'static Query, RunnerError> {
        number
            .checked_sub(1)
            .and_then(|index| QUERIES.get(index as usize))
            .ok_or(RunnerError::UnknownQuery(number))
    }
}

/// Entry point of a single query process: load the inputs twice, build the plan and time it
#[instrument(skip(engine, config, paths), fields(solution = engine.solution()))]
pub fn run_single<E: Engine>(
    engine: &E,
    config: &RunConfig,
    paths: &Paths,
    number: u32,
) -> Result<QueryOutcome, RunnerError> {
    let query = Query::get(number)?;
    let mut loader = DatasetLoader::new(engine, config, paths);

    // first call happens before anything is timed
    loader.warm(query.tables)?;

    let tables = query
        .tables
        .iter()
        .map(|table| Ok((*table, loader.load(*table)?)))
        .collect::<Result<Vec<_>, EngineError>>()?;
    let plan = engine.plan(query, tables)?;

    run_query(engine, config, paths, number, plan)
}
