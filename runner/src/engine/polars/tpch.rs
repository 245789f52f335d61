//! The 22 TPC-H queries as polars lazy plans

use super::EPOCH_DAYS_FROM_CE;
use crate::{dataset::TpchTable, engine::EngineError};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;

type PlanResult = Result<LazyFrame, EngineError>;

/// Input tables of one query, handed out by value
pub struct Tables(BTreeMap<TpchTable, LazyFrame>);

impl Tables {
    pub fn new(tables: Vec<(TpchTable, LazyFrame)>) -> Self {
        Self(tables.into_iter().collect())
    }

    fn get(&self, table: TpchTable) -> PlanResult {
        self.0
            .get(&table)
            .cloned()
            .ok_or(EngineError::NotLoaded(table.name()))
    }
}

pub fn plan(number: u32, tables: &Tables) -> PlanResult {
    match number {
        1 => q1(tables),
        2 => q2(tables),
        3 => q3(tables),
        4 => q4(tables),
        5 => q5(tables),
        6 => q6(tables),
        7 => q7(tables),
        8 => q8(tables),
        9 => q9(tables),
        10 => q10(tables),
        11 => q11(tables),
        12 => q12(tables),
        13 => q13(tables),
        14 => q14(tables),
        15 => q15(tables),
        16 => q16(tables),
        17 => q17(tables),
        18 => q18(tables),
        19 => q19(tables),
        20 => q20(tables),
        21 => q21(tables),
        22 => q22(tables),
        _ => Err(EngineError::Polars(PolarsError::ComputeError(
            format!("no plan for query {number}").into(),
        ))),
    }
}

/// date literal typed as a polars Date
fn date(year: i32, month: u32, day: u32) -> Result<Expr, EngineError> {
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        EngineError::Polars(PolarsError::ComputeError(
            format!("invalid date {year}-{month}-{day}").into(),
        ))
    })?;

    Ok(lit(date.num_days_from_ce() - EPOCH_DAYS_FROM_CE).cast(DataType::Date))
}

fn revenue() -> Expr {
    col("l_extendedprice") * (lit(1.0) - col("l_discount"))
}

fn one_of(values: &[&str]) -> Expr {
    lit(Series::new("", values))
}

fn join_with(
    left: LazyFrame,
    right: LazyFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinType,
) -> LazyFrame {
    let left_on: Vec<Expr> = left_on.iter().map(|name| col(name)).collect();
    let right_on: Vec<Expr> = right_on.iter().map(|name| col(name)).collect();

    left.join(right, left_on, right_on, JoinArgs::new(how))
}

fn sorted(lazy: LazyFrame, by: &[(&str, bool)]) -> LazyFrame {
    let exprs: Vec<Expr> = by.iter().map(|(name, _)| col(name)).collect();
    let descending: Vec<bool> = by.iter().map(|(_, descending)| *descending).collect();

    lazy.sort_by_exprs(exprs, descending, false, false)
}

fn q1(tables: &Tables) -> PlanResult {
    let lineitem = tables.get(TpchTable::Lineitem)?;

    let plan = lineitem
        .filter(col("l_shipdate").lt_eq(date(1998, 9, 2)?))
        .group_by([col("l_returnflag"), col("l_linestatus")])
        .agg([
            col("l_quantity").sum().alias("sum_qty"),
            col("l_extendedprice").sum().alias("sum_base_price"),
            revenue().sum().alias("sum_disc_price"),
            (revenue() * (lit(1.0) + col("l_tax")))
                .sum()
                .alias("sum_charge"),
            col("l_quantity").mean().alias("avg_qty"),
            col("l_extendedprice").mean().alias("avg_price"),
            col("l_discount").mean().alias("avg_disc"),
            col("l_orderkey").count().alias("count_order"),
        ]);

    Ok(sorted(plan, &[("l_returnflag", false), ("l_linestatus", false)]))
}

fn q2(tables: &Tables) -> PlanResult {
    let candidates = tables
        .get(TpchTable::Part)?
        .filter(col("p_size").eq(lit(15)))
        .filter(col("p_type").str().ends_with(lit("BRASS")))
        .inner_join(tables.get(TpchTable::Partsupp)?, col("p_partkey"), col("ps_partkey"))
        .inner_join(tables.get(TpchTable::Supplier)?, col("ps_suppkey"), col("s_suppkey"))
        .inner_join(tables.get(TpchTable::Nation)?, col("s_nationkey"), col("n_nationkey"))
        .inner_join(tables.get(TpchTable::Region)?, col("n_regionkey"), col("r_regionkey"))
        .filter(col("r_name").eq(lit("EUROPE")));

    let cheapest = candidates
        .clone()
        .group_by([col("p_partkey")])
        .agg([col("ps_supplycost").min()]);

    let plan = join_with(
        candidates,
        cheapest,
        &["p_partkey", "ps_supplycost"],
        &["p_partkey", "ps_supplycost"],
        JoinType::Inner,
    )
    .select([
        col("s_acctbal"),
        col("s_name"),
        col("n_name"),
        col("p_partkey"),
        col("p_mfgr"),
        col("s_address"),
        col("s_phone"),
        col("s_comment"),
    ]);

    Ok(sorted(
        plan,
        &[
            ("s_acctbal", true),
            ("n_name", false),
            ("s_name", false),
            ("p_partkey", false),
        ],
    )
    .limit(100))
}

fn q3(tables: &Tables) -> PlanResult {
    let cutoff = date(1995, 3, 15)?;

    let plan = tables
        .get(TpchTable::Customer)?
        .filter(col("c_mktsegment").eq(lit("BUILDING")))
        .inner_join(
            tables
                .get(TpchTable::Orders)?
                .filter(col("o_orderdate").lt(cutoff.clone())),
            col("c_custkey"),
            col("o_custkey"),
        )
        .inner_join(
            tables
                .get(TpchTable::Lineitem)?
                .filter(col("l_shipdate").gt(cutoff)),
            col("o_orderkey"),
            col("l_orderkey"),
        )
        .group_by([col("o_orderkey"), col("o_orderdate"), col("o_shippriority")])
        .agg([revenue().sum().alias("revenue")])
        .select([
            col("o_orderkey").alias("l_orderkey"),
            col("revenue"),
            col("o_orderdate"),
            col("o_shippriority"),
        ]);

    Ok(sorted(plan, &[("revenue", true), ("o_orderdate", false)]).limit(10))
}

fn q4(tables: &Tables) -> PlanResult {
    let late = tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_commitdate").lt(col("l_receiptdate")));

    let plan = tables
        .get(TpchTable::Orders)?
        .filter(col("o_orderdate").gt_eq(date(1993, 7, 1)?))
        .filter(col("o_orderdate").lt(date(1993, 10, 1)?));

    let plan = join_with(plan, late, &["o_orderkey"], &["l_orderkey"], JoinType::Semi)
        .group_by([col("o_orderpriority")])
        .agg([col("o_orderkey").count().alias("order_count")]);

    Ok(sorted(plan, &[("o_orderpriority", false)]))
}

fn q5(tables: &Tables) -> PlanResult {
    let plan = tables
        .get(TpchTable::Region)?
        .filter(col("r_name").eq(lit("ASIA")))
        .inner_join(tables.get(TpchTable::Nation)?, col("r_regionkey"), col("n_regionkey"))
        .inner_join(tables.get(TpchTable::Customer)?, col("n_nationkey"), col("c_nationkey"))
        .inner_join(
            tables
                .get(TpchTable::Orders)?
                .filter(col("o_orderdate").gt_eq(date(1994, 1, 1)?))
                .filter(col("o_orderdate").lt(date(1995, 1, 1)?)),
            col("c_custkey"),
            col("o_custkey"),
        )
        .inner_join(tables.get(TpchTable::Lineitem)?, col("o_orderkey"), col("l_orderkey"));

    // customer and supplier share the nation
    let plan = join_with(
        plan,
        tables.get(TpchTable::Supplier)?,
        &["l_suppkey", "n_nationkey"],
        &["s_suppkey", "s_nationkey"],
        JoinType::Inner,
    )
    .group_by([col("n_name")])
    .agg([revenue().sum().alias("revenue")]);

    Ok(sorted(plan, &[("revenue", true)]))
}

fn q6(tables: &Tables) -> PlanResult {
    Ok(tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_shipdate").gt_eq(date(1994, 1, 1)?))
        .filter(col("l_shipdate").lt(date(1995, 1, 1)?))
        .filter(col("l_discount").gt_eq(lit(0.05)))
        .filter(col("l_discount").lt_eq(lit(0.07)))
        .filter(col("l_quantity").lt(lit(24)))
        .select([(col("l_extendedprice") * col("l_discount"))
            .sum()
            .alias("revenue")]))
}

fn q7(tables: &Tables) -> PlanResult {
    let shipments = |supp_nation: &str, cust_nation: &str| -> PlanResult {
        let nation = tables.get(TpchTable::Nation)?;
        let cust = nation
            .clone()
            .filter(col("n_name").eq(lit(cust_nation)))
            .select([col("n_nationkey"), col("n_name").alias("cust_nation")]);
        let supp = nation
            .filter(col("n_name").eq(lit(supp_nation)))
            .select([col("n_nationkey"), col("n_name").alias("supp_nation")]);

        Ok(tables
            .get(TpchTable::Customer)?
            .inner_join(cust, col("c_nationkey"), col("n_nationkey"))
            .inner_join(tables.get(TpchTable::Orders)?, col("c_custkey"), col("o_custkey"))
            .inner_join(tables.get(TpchTable::Lineitem)?, col("o_orderkey"), col("l_orderkey"))
            .inner_join(tables.get(TpchTable::Supplier)?, col("l_suppkey"), col("s_suppkey"))
            .inner_join(supp, col("s_nationkey"), col("n_nationkey"))
            .select([
                col("supp_nation"),
                col("cust_nation"),
                col("l_shipdate"),
                col("l_extendedprice"),
                col("l_discount"),
            ]))
    };

    let plan = concat(
        [
            shipments("FRANCE", "GERMANY")?,
            shipments("GERMANY", "FRANCE")?,
        ],
        UnionArgs::default(),
    )?
    .filter(col("l_shipdate").gt_eq(date(1995, 1, 1)?))
    .filter(col("l_shipdate").lt_eq(date(1996, 12, 31)?))
    .group_by([
        col("supp_nation"),
        col("cust_nation"),
        col("l_shipdate").dt().year().alias("l_year"),
    ])
    .agg([revenue().sum().alias("revenue")]);

    Ok(sorted(
        plan,
        &[
            ("supp_nation", false),
            ("cust_nation", false),
            ("l_year", false),
        ],
    ))
}

fn q8(tables: &Tables) -> PlanResult {
    let nation = tables.get(TpchTable::Nation)?;

    let plan = tables
        .get(TpchTable::Part)?
        .filter(col("p_type").eq(lit("ECONOMY ANODIZED STEEL")))
        .inner_join(tables.get(TpchTable::Lineitem)?, col("p_partkey"), col("l_partkey"))
        .inner_join(tables.get(TpchTable::Supplier)?, col("l_suppkey"), col("s_suppkey"))
        .inner_join(
            tables
                .get(TpchTable::Orders)?
                .filter(col("o_orderdate").gt_eq(date(1995, 1, 1)?))
                .filter(col("o_orderdate").lt_eq(date(1996, 12, 31)?)),
            col("l_orderkey"),
            col("o_orderkey"),
        )
        .inner_join(tables.get(TpchTable::Customer)?, col("o_custkey"), col("c_custkey"))
        .inner_join(
            nation
                .clone()
                .select([col("n_nationkey"), col("n_regionkey")]),
            col("c_nationkey"),
            col("n_nationkey"),
        )
        .inner_join(
            tables
                .get(TpchTable::Region)?
                .filter(col("r_name").eq(lit("AMERICA"))),
            col("n_regionkey"),
            col("r_regionkey"),
        )
        .inner_join(
            nation.select([col("n_nationkey"), col("n_name")]),
            col("s_nationkey"),
            col("n_nationkey"),
        )
        .select([
            col("o_orderdate").dt().year().alias("o_year"),
            revenue().alias("volume"),
            col("n_name").alias("nation"),
        ])
        .group_by([col("o_year")])
        .agg([(when(col("nation").eq(lit("BRAZIL")))
            .then(col("volume"))
            .otherwise(lit(0.0))
            .sum()
            / col("volume").sum())
        .round(2)
        .alias("mkt_share")]);

    Ok(sorted(plan, &[("o_year", false)]))
}

fn q9(tables: &Tables) -> PlanResult {
    let plan = tables
        .get(TpchTable::Part)?
        .filter(col("p_name").str().contains(lit("green"), false))
        .inner_join(tables.get(TpchTable::Partsupp)?, col("p_partkey"), col("ps_partkey"))
        .inner_join(tables.get(TpchTable::Supplier)?, col("ps_suppkey"), col("s_suppkey"));

    let plan = join_with(
        plan,
        tables.get(TpchTable::Lineitem)?,
        &["p_partkey", "ps_suppkey"],
        &["l_partkey", "l_suppkey"],
        JoinType::Inner,
    )
    .inner_join(tables.get(TpchTable::Orders)?, col("l_orderkey"), col("o_orderkey"))
    .inner_join(tables.get(TpchTable::Nation)?, col("s_nationkey"), col("n_nationkey"))
    .select([
        col("n_name").alias("nation"),
        col("o_orderdate").dt().year().alias("o_year"),
        (revenue() - col("ps_supplycost") * col("l_quantity")).alias("amount"),
    ])
    .group_by([col("nation"), col("o_year")])
    .agg([col("amount").sum().round(2).alias("sum_profit")]);

    Ok(sorted(plan, &[("nation", false), ("o_year", true)]))
}

fn q10(tables: &Tables) -> PlanResult {
    let plan = tables
        .get(TpchTable::Customer)?
        .inner_join(
            tables
                .get(TpchTable::Orders)?
                .filter(col("o_orderdate").gt_eq(date(1993, 10, 1)?))
                .filter(col("o_orderdate").lt(date(1994, 1, 1)?)),
            col("c_custkey"),
            col("o_custkey"),
        )
        .inner_join(
            tables
                .get(TpchTable::Lineitem)?
                .filter(col("l_returnflag").eq(lit("R"))),
            col("o_orderkey"),
            col("l_orderkey"),
        )
        .inner_join(tables.get(TpchTable::Nation)?, col("c_nationkey"), col("n_nationkey"))
        .group_by([
            col("c_custkey"),
            col("c_name"),
            col("c_acctbal"),
            col("c_phone"),
            col("n_name"),
            col("c_address"),
            col("c_comment"),
        ])
        .agg([revenue().sum().round(2).alias("revenue")])
        .select([
            col("c_custkey"),
            col("c_name"),
            col("revenue"),
            col("c_acctbal"),
            col("n_name"),
            col("c_address"),
            col("c_phone"),
            col("c_comment"),
        ]);

    Ok(sorted(plan, &[("revenue", true)]).limit(20))
}

fn q11(tables: &Tables) -> PlanResult {
    let plan = tables
        .get(TpchTable::Partsupp)?
        .inner_join(tables.get(TpchTable::Supplier)?, col("ps_suppkey"), col("s_suppkey"))
        .inner_join(
            tables
                .get(TpchTable::Nation)?
                .filter(col("n_name").eq(lit("GERMANY"))),
            col("s_nationkey"),
            col("n_nationkey"),
        )
        .group_by([col("ps_partkey")])
        .agg([(col("ps_supplycost") * col("ps_availqty"))
            .sum()
            .round(2)
            .alias("value")])
        // the grouped values sum up to the national total
        .filter(col("value").gt(col("value").sum() * lit(0.0001)));

    Ok(sorted(plan, &[("value", true)]))
}

fn q12(tables: &Tables) -> PlanResult {
    let urgent = col("o_orderpriority").is_in(one_of(&["1-URGENT", "2-HIGH"]));

    let plan = tables
        .get(TpchTable::Orders)?
        .inner_join(
            tables
                .get(TpchTable::Lineitem)?
                .filter(col("l_shipmode").is_in(one_of(&["MAIL", "SHIP"])))
                .filter(col("l_commitdate").lt(col("l_receiptdate")))
                .filter(col("l_shipdate").lt(col("l_commitdate")))
                .filter(col("l_receiptdate").gt_eq(date(1994, 1, 1)?))
                .filter(col("l_receiptdate").lt(date(1995, 1, 1)?)),
            col("o_orderkey"),
            col("l_orderkey"),
        )
        .group_by([col("l_shipmode")])
        .agg([
            when(urgent.clone())
                .then(lit(1))
                .otherwise(lit(0))
                .sum()
                .alias("high_line_count"),
            when(urgent.not())
                .then(lit(1))
                .otherwise(lit(0))
                .sum()
                .alias("low_line_count"),
        ]);

    Ok(sorted(plan, &[("l_shipmode", false)]))
}

fn q13(tables: &Tables) -> PlanResult {
    let orders = tables
        .get(TpchTable::Orders)?
        .filter(
            col("o_comment")
                .str()
                .contains(lit("special.*requests"), false)
                .not(),
        );

    let plan = tables
        .get(TpchTable::Customer)?
        .left_join(orders, col("c_custkey"), col("o_custkey"))
        .group_by([col("c_custkey")])
        // customers without orders keep a single row with a null order
        .agg([col("o_orderkey").is_not_null().sum().alias("c_count")])
        .group_by([col("c_count")])
        .agg([col("c_custkey").count().alias("custdist")]);

    Ok(sorted(plan, &[("custdist", true), ("c_count", true)]))
}

fn q14(tables: &Tables) -> PlanResult {
    Ok(tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_shipdate").gt_eq(date(1995, 9, 1)?))
        .filter(col("l_shipdate").lt(date(1995, 10, 1)?))
        .inner_join(tables.get(TpchTable::Part)?, col("l_partkey"), col("p_partkey"))
        .select([(lit(100.0)
            * when(col("p_type").str().starts_with(lit("PROMO")))
                .then(revenue())
                .otherwise(lit(0.0))
                .sum()
            / revenue().sum())
        .round(2)
        .alias("promo_revenue")]))
}

fn q15(tables: &Tables) -> PlanResult {
    let revenue = tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_shipdate").gt_eq(date(1996, 1, 1)?))
        .filter(col("l_shipdate").lt(date(1996, 4, 1)?))
        .group_by([col("l_suppkey")])
        .agg([revenue().sum().alias("total_revenue")])
        .select([col("l_suppkey").alias("supplier_no"), col("total_revenue")]);

    let plan = tables
        .get(TpchTable::Supplier)?
        .inner_join(revenue, col("s_suppkey"), col("supplier_no"))
        .filter(col("total_revenue").eq(col("total_revenue").max()))
        .select([
            col("s_suppkey"),
            col("s_name"),
            col("s_address"),
            col("s_phone"),
            col("total_revenue").round(2),
        ]);

    Ok(sorted(plan, &[("s_suppkey", false)]))
}

fn q16(tables: &Tables) -> PlanResult {
    let complaints = tables
        .get(TpchTable::Supplier)?
        .filter(
            col("s_comment")
                .str()
                .contains(lit("Customer.*Complaints"), false),
        )
        .select([col("s_suppkey")]);

    let plan = tables
        .get(TpchTable::Part)?
        .filter(col("p_brand").neq(lit("Brand#45")))
        .filter(col("p_type").str().starts_with(lit("MEDIUM POLISHED")).not())
        .filter(col("p_size").is_in(lit(Series::new(
            "",
            &[49i64, 14, 23, 45, 19, 3, 36, 9],
        ))))
        .inner_join(tables.get(TpchTable::Partsupp)?, col("p_partkey"), col("ps_partkey"));

    let plan = join_with(plan, complaints, &["ps_suppkey"], &["s_suppkey"], JoinType::Anti)
        .group_by([col("p_brand"), col("p_type"), col("p_size")])
        .agg([col("ps_suppkey").n_unique().alias("supplier_cnt")]);

    Ok(sorted(
        plan,
        &[
            ("supplier_cnt", true),
            ("p_brand", false),
            ("p_type", false),
            ("p_size", false),
        ],
    ))
}

fn q17(tables: &Tables) -> PlanResult {
    let items = tables
        .get(TpchTable::Part)?
        .filter(col("p_brand").eq(lit("Brand#23")))
        .filter(col("p_container").eq(lit("MED BOX")))
        .inner_join(tables.get(TpchTable::Lineitem)?, col("p_partkey"), col("l_partkey"));

    let thresholds = items
        .clone()
        .group_by([col("p_partkey")])
        .agg([(lit(0.2) * col("l_quantity").mean()).alias("avg_quantity")])
        .select([col("p_partkey").alias("key"), col("avg_quantity")]);

    Ok(thresholds
        .inner_join(items, col("key"), col("p_partkey"))
        .filter(col("l_quantity").lt(col("avg_quantity")))
        .select([(col("l_extendedprice").sum() / lit(7.0))
            .round(2)
            .alias("avg_yearly")]))
}

fn q18(tables: &Tables) -> PlanResult {
    let lineitem = tables.get(TpchTable::Lineitem)?;

    let large = lineitem
        .clone()
        .group_by([col("l_orderkey")])
        .agg([col("l_quantity").sum().alias("sum_quantity")])
        .filter(col("sum_quantity").gt(lit(300)));

    let plan = join_with(
        tables.get(TpchTable::Orders)?,
        large,
        &["o_orderkey"],
        &["l_orderkey"],
        JoinType::Semi,
    )
    .inner_join(lineitem, col("o_orderkey"), col("l_orderkey"))
    .inner_join(tables.get(TpchTable::Customer)?, col("o_custkey"), col("c_custkey"))
    .group_by([
        col("c_name"),
        col("o_custkey"),
        col("o_orderkey"),
        col("o_orderdate"),
        col("o_totalprice"),
    ])
    .agg([col("l_quantity").sum().alias("col6")])
    // column names of the published answers
    .select([
        col("c_name"),
        col("o_custkey").alias("c_custkey"),
        col("o_orderkey"),
        col("o_orderdate").alias("o_orderdat"),
        col("o_totalprice"),
        col("col6"),
    ]);

    Ok(sorted(plan, &[("o_totalprice", true), ("o_orderdat", false)]).limit(100))
}

fn q19(tables: &Tables) -> PlanResult {
    let bracket = |brand: &str, containers: &[&str], min_qty: i64, max_size: i64| {
        col("p_brand")
            .eq(lit(brand))
            .and(col("p_container").is_in(one_of(containers)))
            .and(col("l_quantity").gt_eq(lit(min_qty)))
            .and(col("l_quantity").lt_eq(lit(min_qty + 10)))
            .and(col("p_size").gt_eq(lit(1)))
            .and(col("p_size").lt_eq(lit(max_size)))
    };

    Ok(tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_shipmode").is_in(one_of(&["AIR", "AIR REG"])))
        .filter(col("l_shipinstruct").eq(lit("DELIVER IN PERSON")))
        .inner_join(tables.get(TpchTable::Part)?, col("l_partkey"), col("p_partkey"))
        .filter(
            bracket("Brand#12", &["SM CASE", "SM BOX", "SM PACK", "SM PKG"], 1, 5)
                .or(bracket(
                    "Brand#23",
                    &["MED BAG", "MED BOX", "MED PKG", "MED PACK"],
                    10,
                    10,
                ))
                .or(bracket(
                    "Brand#34",
                    &["LG CASE", "LG BOX", "LG PACK", "LG PKG"],
                    20,
                    15,
                )),
        )
        .select([revenue().sum().round(2).alias("revenue")]))
}

fn q20(tables: &Tables) -> PlanResult {
    let shipped = tables
        .get(TpchTable::Lineitem)?
        .filter(col("l_shipdate").gt_eq(date(1994, 1, 1)?))
        .filter(col("l_shipdate").lt(date(1995, 1, 1)?))
        .group_by([col("l_partkey"), col("l_suppkey")])
        .agg([(col("l_quantity").sum() * lit(0.5)).alias("sum_quantity")]);

    let forest = tables
        .get(TpchTable::Part)?
        .filter(col("p_name").str().starts_with(lit("forest")))
        .select([col("p_partkey")]);

    let partsupp = join_with(
        tables.get(TpchTable::Partsupp)?,
        forest,
        &["ps_partkey"],
        &["p_partkey"],
        JoinType::Semi,
    );

    let excess = join_with(
        partsupp,
        shipped,
        &["ps_partkey", "ps_suppkey"],
        &["l_partkey", "l_suppkey"],
        JoinType::Inner,
    )
    .filter(col("ps_availqty").gt(col("sum_quantity")))
    .select([col("ps_suppkey")]);

    let canada = tables
        .get(TpchTable::Supplier)?
        .inner_join(
            tables
                .get(TpchTable::Nation)?
                .filter(col("n_name").eq(lit("CANADA"))),
            col("s_nationkey"),
            col("n_nationkey"),
        );

    let plan = join_with(canada, excess, &["s_suppkey"], &["ps_suppkey"], JoinType::Semi)
        .select([col("s_name"), col("s_address")]);

    Ok(sorted(plan, &[("s_name", false)]))
}

fn q21(tables: &Tables) -> PlanResult {
    let lineitem = tables.get(TpchTable::Lineitem)?;
    let late = lineitem
        .clone()
        .filter(col("l_receiptdate").gt(col("l_commitdate")));

    // orders served by more than one supplier
    let shared = lineitem
        .group_by([col("l_orderkey")])
        .agg([col("l_suppkey").n_unique().alias("n_supp")])
        .filter(col("n_supp").gt(lit(1)))
        .select([col("l_orderkey")]);

    let late_in_shared = join_with(late, shared, &["l_orderkey"], &["l_orderkey"], JoinType::Semi);

    // only one supplier of the order was late
    let single_late = late_in_shared
        .clone()
        .group_by([col("l_orderkey")])
        .agg([col("l_suppkey").n_unique().alias("n_late")])
        .filter(col("n_late").eq(lit(1)))
        .select([col("l_orderkey")]);

    let plan = join_with(
        late_in_shared,
        single_late,
        &["l_orderkey"],
        &["l_orderkey"],
        JoinType::Semi,
    )
    .inner_join(tables.get(TpchTable::Supplier)?, col("l_suppkey"), col("s_suppkey"))
    .inner_join(
        tables
            .get(TpchTable::Nation)?
            .filter(col("n_name").eq(lit("SAUDI ARABIA"))),
        col("s_nationkey"),
        col("n_nationkey"),
    )
    .inner_join(
        tables
            .get(TpchTable::Orders)?
            .filter(col("o_orderstatus").eq(lit("F"))),
        col("l_orderkey"),
        col("o_orderkey"),
    )
    .group_by([col("s_name")])
    .agg([col("l_orderkey").count().alias("numwait")]);

    Ok(sorted(plan, &[("numwait", true), ("s_name", false)]).limit(100))
}

fn q22(tables: &Tables) -> PlanResult {
    let codes = one_of(&["13", "31", "23", "29", "30", "18", "17"]);
    let positive = col("c_acctbal").filter(col("c_acctbal").gt(lit(0.0)));

    let candidates = tables
        .get(TpchTable::Customer)?
        .with_columns([col("c_phone").str().slice(0, Some(2)).alias("cntrycode")])
        .filter(col("cntrycode").is_in(codes))
        // average over every candidate, including those with orders
        .filter(col("c_acctbal").gt(positive.mean()))
        .select([col("c_custkey"), col("c_acctbal"), col("cntrycode")]);

    let plan = join_with(
        candidates,
        tables.get(TpchTable::Orders)?,
        &["c_custkey"],
        &["o_custkey"],
        JoinType::Anti,
    )
    .group_by([col("cntrycode")])
    .agg([
        col("c_acctbal").count().alias("numcust"),
        col("c_acctbal").sum().round(2).alias("totacctbal"),
    ]);

    Ok(sorted(plan, &[("cntrycode", false)]))
}
