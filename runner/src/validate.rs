use chrono::NaiveDate;
use itertools::Itertools;
use std::{cmp::Ordering, fmt};
use thiserror::Error;
use tracing::debug;

// tolerances used by polars' assert_frame_equal
pub const RTOL: f64 = 1e-5;
pub const ATOL: f64 = 1e-8;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Query {query}: columns differ, got {left:?} expected {right:?}")]
    Columns {
        query: u32,
        left: Vec<String>,
        right: Vec<String>,
    },
    #[error("Query {query}: row count differs, got {left} expected {right}")]
    RowCount {
        query: u32,
        left: usize,
        right: usize,
    },
    #[error("Query {query}: column {column:?} differs in row {row}, got {left} expected {right}")]
    Value {
        query: u32,
        column: String,
        row: usize,
        left: Cell,
        right: Cell,
    },
}

/// A single value of a materialized table, independent of the engine's physical types
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Str(String),
}

impl Cell {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::Date(_) => 3,
            Self::Str(_) => 4,
        }
    }

    /// total order used to sort rows before comparison, numbers are ordered by value
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::Date(left), Self::Date(right)) => left.cmp(right),
            (Self::Str(left), Self::Str(right)) => left.cmp(right),
            (left, right) => match (left.as_f64(), right.as_f64()) {
                (Some(left), Some(right)) => left.total_cmp(&right),
                _ => left.rank().cmp(&right.rank()),
            },
        }
    }

    /// equality that ignores Int/Float differences but not value differences
    pub fn matches(&self, other: &Self) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(left), Some(right)) => {
                left == right
                    || (left.is_finite()
                        && right.is_finite()
                        && (left - right).abs() <= ATOL + RTOL * right.abs())
                    || (left.is_nan() && right.is_nan())
            }
            _ => self == other,
        }
    }

    /// infer a cell from its textual form, the way CSV readers infer column types
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Null
        } else if let Ok(value) = raw.parse::<i64>() {
            Self::Int(value)
        } else if let Ok(value) = raw.parse::<f64>() {
            Self::Float(value)
        } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Self::Date(date)
        } else {
            match raw {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                _ => Self::Str(raw.to_string()),
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Date(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Engine independent, fully materialized table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// trim whitespace from column names and string cells
    pub fn normalized(self) -> Self {
        Self {
            columns: self
                .columns
                .into_iter()
                .map(|column| column.trim().to_string())
                .collect(),
            rows: self
                .rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| match cell {
                            Cell::Str(value) => Cell::Str(value.trim().to_string()),
                            other => other,
                        })
                        .collect()
                })
                .collect(),
        }
    }

    fn sorted_rows(&self) -> Vec<&Vec<Cell>> {
        self.rows
            .iter()
            .sorted_by(|left, right| {
                left.iter()
                    .zip(right.iter())
                    .map(|(left, right)| left.canonical_cmp(right))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
            .collect()
    }
}

fn rows_match(left: &[Cell], right: &[Cell]) -> bool {
    left.iter().zip(right).all(|(left, right)| left.matches(right))
}

fn first_difference(
    query: u32,
    columns: &[String],
    row: usize,
    left: &[Cell],
    right: &[Cell],
) -> ValidationError {
    let position = left
        .iter()
        .zip(right)
        .position(|(left, right)| !left.matches(right))
        .unwrap_or(0);

    ValidationError::Value {
        query,
        column: columns.get(position).cloned().unwrap_or_default(),
        row,
        left: left.get(position).cloned().unwrap_or(Cell::Null),
        right: right.get(position).cloned().unwrap_or(Cell::Null),
    }
}

/// Compare a query result against its reference answer.
///
/// Rows are compared as a multiset, numeric cells are compared by value regardless of their
/// integer or float representation. Column names and string cells must match exactly after
/// trimming.
pub fn assert_frame_equal(query: u32, result: &Frame, answer: &Frame) -> Result<(), ValidationError> {
    let result = result.clone().normalized();
    let answer = answer.clone().normalized();

    if result.columns != answer.columns {
        return Err(ValidationError::Columns {
            query,
            left: result.columns,
            right: answer.columns,
        });
    }

    if result.height() != answer.height() {
        return Err(ValidationError::RowCount {
            query,
            left: result.height(),
            right: answer.height(),
        });
    }

    // numeric cells only match within tolerance, so sorted neighbours may pair up crosswise
    let mut unmatched: Vec<Option<&Vec<Cell>>> =
        answer.sorted_rows().into_iter().map(Some).collect();
    let mut first_open = 0;

    for (index, left) in result.sorted_rows().into_iter().enumerate() {
        let partner = unmatched[first_open..]
            .iter()
            .position(|right| right.map_or(false, |right| rows_match(left, right)));

        match partner {
            Some(offset) => unmatched[first_open + offset] = None,
            None => {
                let right = unmatched
                    .get(index)
                    .copied()
                    .flatten()
                    .or_else(|| unmatched.iter().flatten().next().copied())
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                return Err(first_difference(query, &result.columns, index, left, right));
            }
        }

        while unmatched.get(first_open).map_or(false, Option::is_none) {
            first_open += 1;
        }
    }

    debug!(query, rows = result.height(), "Result matches reference answer");

    Ok(())
}
