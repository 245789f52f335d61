mod tpch;

use super::{Engine, EngineError};
use crate::{config::FileType, dataset::TpchTable, queries::Query, validate::Cell, validate::Frame};
use chrono::NaiveDate;
use polars::prelude::*;
use std::{fs::File, path::Path};
use tpch::Tables;
use tracing::debug;

/// pinned dependency in Cargo.toml
pub const POLARS_VERSION: &str = "0.35.4";

// days between 0001-01-01 and the unix epoch
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Clone, Copy, Debug, Default)]
pub struct PolarsEngine;

fn to_cell(value: AnyValue) -> Cell {
    match value {
        AnyValue::Null => Cell::Null,
        AnyValue::Boolean(value) => Cell::Bool(value),
        AnyValue::Utf8(value) => Cell::Str(value.to_string()),
        AnyValue::UInt32(value) => Cell::Int(value.into()),
        AnyValue::UInt64(value) => match i64::try_from(value) {
            Ok(value) => Cell::Int(value),
            Err(_) => Cell::Float(value as f64),
        },
        AnyValue::Int32(value) => Cell::Int(value.into()),
        AnyValue::Int64(value) => Cell::Int(value),
        AnyValue::Float32(value) => Cell::Float(value.into()),
        AnyValue::Float64(value) => Cell::Float(value),
        AnyValue::Date(days) => {
            match NaiveDate::from_num_days_from_ce_opt(days + EPOCH_DAYS_FROM_CE) {
                Some(date) => Cell::Date(date),
                None => Cell::Int(days.into()),
            }
        }
        other => Cell::parse(&other.to_string()),
    }
}

impl Engine for PolarsEngine {
    type Lazy = LazyFrame;
    type Materialized = DataFrame;

    fn solution(&self) -> &str {
        "polars"
    }

    fn version(&self) -> &str {
        POLARS_VERSION
    }

    fn scan(&self, path: &Path, file_type: FileType) -> Result<LazyFrame, EngineError> {
        debug!(path = ?path, file_type = %file_type, "Scanning dataset");

        Ok(match file_type {
            FileType::Parquet => LazyFrame::scan_parquet(path, ScanArgsParquet::default())?,
            FileType::Feather => LazyFrame::scan_ipc(path, ScanArgsIpc::default())?,
        })
    }

    fn cache(&self, lazy: LazyFrame) -> Result<LazyFrame, EngineError> {
        Ok(lazy.collect()?.lazy())
    }

    fn collect(&self, lazy: LazyFrame) -> Result<DataFrame, EngineError> {
        Ok(lazy.collect()?)
    }

    fn describe_optimized_plan(&self, lazy: &LazyFrame) -> Result<String, EngineError> {
        Ok(lazy.describe_optimized_plan()?)
    }

    fn plan(
        &self,
        query: &Query,
        tables: Vec<(TpchTable, LazyFrame)>,
    ) -> Result<LazyFrame, EngineError> {
        tpch::plan(query.number, &Tables::new(tables))
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame, EngineError> {
        Ok(LazyCsvReader::new(path)
            .has_header(true)
            .with_try_parse_dates(true)
            .finish()?
            .collect()?)
    }

    fn to_frame(&self, materialized: &DataFrame) -> Result<Frame, EngineError> {
        let mut rows = vec![Vec::with_capacity(materialized.width()); materialized.height()];

        for series in materialized.get_columns() {
            for (index, row) in rows.iter_mut().enumerate() {
                row.push(to_cell(series.get(index)?));
            }
        }

        Ok(Frame::new(
            materialized
                .get_column_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            rows,
        ))
    }

    fn write_csv(&self, materialized: &mut DataFrame, path: &Path) -> Result<(), EngineError> {
        let mut file = File::create(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        CsvWriter::new(&mut file).finish(materialized)?;

        Ok(())
    }

    fn display(&self, materialized: &DataFrame) -> String {
        materialized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{queries::QUERIES, validate::assert_frame_equal};
    use chrono::Datelike;

    const FLOATS: [&str; 9] = [
        "l_quantity",
        "l_extendedprice",
        "l_discount",
        "l_tax",
        "o_totalprice",
        "c_acctbal",
        "s_acctbal",
        "p_retailprice",
        "ps_supplycost",
    ];

    fn columns(table: TpchTable) -> &'static [&'static str] {
        match table {
            TpchTable::Lineitem => &[
                "l_orderkey",
                "l_partkey",
                "l_suppkey",
                "l_linenumber",
                "l_quantity",
                "l_extendedprice",
                "l_discount",
                "l_tax",
                "l_returnflag",
                "l_linestatus",
                "l_shipdate",
                "l_commitdate",
                "l_receiptdate",
                "l_shipinstruct",
                "l_shipmode",
                "l_comment",
            ],
            TpchTable::Orders => &[
                "o_orderkey",
                "o_custkey",
                "o_orderstatus",
                "o_totalprice",
                "o_orderdate",
                "o_orderpriority",
                "o_clerk",
                "o_shippriority",
                "o_comment",
            ],
            TpchTable::Customer => &[
                "c_custkey",
                "c_name",
                "c_address",
                "c_nationkey",
                "c_phone",
                "c_acctbal",
                "c_mktsegment",
                "c_comment",
            ],
            TpchTable::Region => &["r_regionkey", "r_name", "r_comment"],
            TpchTable::Nation => &["n_nationkey", "n_name", "n_regionkey", "n_comment"],
            TpchTable::Supplier => &[
                "s_suppkey",
                "s_name",
                "s_address",
                "s_nationkey",
                "s_phone",
                "s_acctbal",
                "s_comment",
            ],
            TpchTable::Part => &[
                "p_partkey",
                "p_name",
                "p_mfgr",
                "p_brand",
                "p_type",
                "p_size",
                "p_container",
                "p_retailprice",
                "p_comment",
            ],
            TpchTable::Partsupp => &[
                "ps_partkey",
                "ps_suppkey",
                "ps_availqty",
                "ps_supplycost",
                "ps_comment",
            ],
        }
    }

    fn column_type(name: &str) -> DataType {
        if name.ends_with("key")
            || ["l_linenumber", "o_shippriority", "p_size", "ps_availqty"].contains(&name)
        {
            DataType::Int64
        } else if name.ends_with("date") {
            DataType::Date
        } else if FLOATS.contains(&name) {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    }

    /// schema-typed table without rows
    fn empty(table: TpchTable) -> LazyFrame {
        let series: Vec<Series> = columns(table)
            .iter()
            .map(|name| Series::new_empty(name, &column_type(name)))
            .collect();

        DataFrame::new(series).unwrap().lazy()
    }

    fn dates(name: &str, values: &[(i32, u32, u32)]) -> Series {
        let days: Vec<i32> = values
            .iter()
            .map(|(year, month, day)| {
                NaiveDate::from_ymd_opt(*year, *month, *day)
                    .unwrap()
                    .num_days_from_ce()
                    - EPOCH_DAYS_FROM_CE
            })
            .collect();

        Series::new(name, days).cast(&DataType::Date).unwrap()
    }

    #[test]
    fn every_query_runs_on_its_declared_tables() {
        let engine = PolarsEngine;

        for query in QUERIES.iter() {
            let tables = query
                .tables
                .iter()
                .map(|table| (*table, empty(*table)))
                .collect();

            let plan = engine
                .plan(query, tables)
                .unwrap_or_else(|e| panic!("q{} does not plan: {e:?}", query.number));
            let result = engine
                .collect(plan)
                .unwrap_or_else(|e| panic!("q{} does not collect: {e:?}", query.number));

            assert!(result.width() > 0, "q{} has no columns", query.number);
        }
    }

    #[test]
    fn result_columns_follow_the_answers() {
        let engine = PolarsEngine;
        let columns_of = |number: usize| {
            let query = &QUERIES[number - 1];
            let tables = query
                .tables
                .iter()
                .map(|table| (*table, empty(*table)))
                .collect();
            let result = engine.collect(engine.plan(query, tables).unwrap()).unwrap();

            result
                .get_column_names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            columns_of(1),
            vec![
                "l_returnflag",
                "l_linestatus",
                "sum_qty",
                "sum_base_price",
                "sum_disc_price",
                "sum_charge",
                "avg_qty",
                "avg_price",
                "avg_disc",
                "count_order",
            ]
        );
        assert_eq!(
            columns_of(18),
            vec!["c_name", "c_custkey", "o_orderkey", "o_orderdat", "o_totalprice", "col6"]
        );
        assert_eq!(columns_of(22), vec!["cntrycode", "numcust", "totacctbal"]);
    }

    #[test]
    fn missing_input_table_is_reported() {
        let error = PolarsEngine
            .plan(&QUERIES[0], vec![(TpchTable::Orders, empty(TpchTable::Orders))])
            .err()
            .expect("planning should fail without lineitem");

        assert!(matches!(error, EngineError::NotLoaded("lineitem")));
    }

    #[test]
    fn q6_matches_a_hand_written_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q6.out");
        std::fs::write(&path, "revenue\n160.0\n").unwrap();

        let engine = PolarsEngine;
        let lineitem = DataFrame::new(vec![
            dates(
                "l_shipdate",
                &[
                    (1994, 3, 1),
                    (1994, 6, 1),
                    (1995, 1, 1),
                    (1994, 5, 1),
                    (1994, 5, 1),
                ],
            ),
            Series::new("l_discount", &[0.06, 0.05, 0.06, 0.08, 0.07]),
            Series::new("l_quantity", &[10.0, 23.0, 1.0, 5.0, 24.0]),
            Series::new("l_extendedprice", &[1000.0, 2000.0, 500.0, 300.0, 700.0]),
        ])
        .unwrap();

        let plan = engine
            .plan(&QUERIES[5], vec![(TpchTable::Lineitem, lineitem.lazy())])
            .unwrap();
        let result = engine.to_frame(&engine.collect(plan).unwrap()).unwrap();
        let answer = engine.to_frame(&engine.read_csv(&path).unwrap()).unwrap();

        assert_eq!(assert_frame_equal(6, &result, &answer), Ok(()));
    }

    #[test]
    fn q13_counts_customers_without_orders() {
        let engine = PolarsEngine;
        let customer = df!("c_custkey" => &[1i64, 2, 3]).unwrap();
        let orders = df!(
            "o_orderkey" => &[10i64, 11, 12],
            "o_custkey" => &[1i64, 1, 2],
            "o_comment" => &["fast delivery", "special packaging requests", "ok"],
        )
        .unwrap();

        let plan = engine
            .plan(
                &QUERIES[12],
                vec![
                    (TpchTable::Customer, customer.lazy()),
                    (TpchTable::Orders, orders.lazy()),
                ],
            )
            .unwrap();
        let result = engine.to_frame(&engine.collect(plan).unwrap()).unwrap();

        assert_eq!(
            result,
            Frame::new(
                vec!["c_count".to_string(), "custdist".to_string()],
                vec![
                    vec![Cell::Int(1), Cell::Int(2)],
                    vec![Cell::Int(0), Cell::Int(1)],
                ],
            )
        );
    }

    #[test]
    fn version_matches_the_pinned_dependency() {
        let manifest = include_str!("../../Cargo.toml");
        let pin = manifest
            .lines()
            .find(|line| line.starts_with("polars = "))
            .unwrap();

        assert!(
            pin.contains(&format!("version = \"={POLARS_VERSION}\"")),
            "{pin}"
        );
    }

    #[test]
    fn any_values_map_to_cells() {
        assert_eq!(to_cell(AnyValue::Null), Cell::Null);
        assert_eq!(to_cell(AnyValue::Int64(3)), Cell::Int(3));
        assert_eq!(to_cell(AnyValue::UInt32(3)), Cell::Int(3));
        assert_eq!(to_cell(AnyValue::Float64(0.5)), Cell::Float(0.5));
        assert_eq!(to_cell(AnyValue::Utf8("R")), Cell::Str("R".into()));
        assert_eq!(
            to_cell(AnyValue::Date(0)),
            Cell::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            to_cell(AnyValue::Date(9204)),
            Cell::Date(NaiveDate::from_ymd_opt(1995, 3, 15).unwrap())
        );
    }

    #[test]
    fn dataframe_round_trips_through_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q1.csv");
        let engine = PolarsEngine;
        let mut df = df!(
            "l_returnflag" => &["A", "N"],
            "sum_qty" => &[10i64, 20],
            "avg_disc" => &[0.05f64, 0.04],
        )
        .unwrap();

        engine.write_csv(&mut df, &path).unwrap();
        let read = engine.read_csv(&path).unwrap();

        assert_eq!(
            engine.to_frame(&read).unwrap(),
            engine.to_frame(&df).unwrap()
        );
    }
}
