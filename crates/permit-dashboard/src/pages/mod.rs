//! Page models. Each page is a pure function of a loaded table and the
//! request's query parameters.

pub mod bivariate;
pub mod exploration;
pub mod overview;
pub mod univariate;

use permit_processing::utils::{format_any_value, numeric_values};
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DashboardError, Result};

/// Rows of a frame as JSON cells, nulls as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn head(df: &DataFrame, n: usize) -> PolarsResult<Self> {
        let head = df.head(Some(n));
        let columns = head
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut rows = Vec::with_capacity(head.height());
        for idx in 0..head.height() {
            let row = head
                .get_columns()
                .iter()
                .map(|c| c.get(idx).map(|v| cell_value(&v)))
                .collect::<PolarsResult<Vec<_>>>()?;
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }
}

fn cell_value(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => Value::from(f64::from(*v)),
        AnyValue::Float64(v) => Value::from(*v),
        other => Value::String(format_any_value(other)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingEntry {
    pub column: String,
    pub missing_count: usize,
    /// Percent of rows, rounded to two decimals.
    pub missing_percentage: f64,
}

/// Columns with at least one null, most missing first.
pub fn missing_by_column(df: &DataFrame) -> Vec<MissingEntry> {
    let mut entries: Vec<MissingEntry> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .map(|c| MissingEntry {
            column: c.name().to_string(),
            missing_count: c.null_count(),
            missing_percentage: round2(c.null_count() as f64 / df.height() as f64 * 100.0),
        })
        .collect();
    entries.sort_by(|a, b| b.missing_count.cmp(&a.missing_count));
    entries
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DashboardError::UnknownColumn(name.to_string()))
}

/// Column named in the request, or `fallback` when none was given.
pub(crate) fn selected_column(
    df: &DataFrame,
    requested: Option<&str>,
    fallback: Option<&str>,
    param: &'static str,
) -> Result<String> {
    match requested.filter(|s| !s.is_empty()).or(fallback) {
        Some(name) => require_column(df, name).map(|c| c.name().to_string()),
        None => Err(DashboardError::bad_parameter(
            param,
            "no column selected and the dataset has none to default to",
        )),
    }
}

/// Comma-separated column list from a query string. Empty entries are dropped.
pub(crate) fn split_columns(list: Option<&str>) -> Vec<String> {
    list.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub(crate) fn check_range(
    name: &'static str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DashboardError::bad_parameter(
            name,
            format!("{} is outside {}..={}", value, min, max),
        ))
    }
}

/// Rows with a value in every one of `columns`.
pub(crate) fn drop_null_rows(df: &DataFrame, columns: &[String]) -> PolarsResult<DataFrame> {
    let mut mask = BooleanChunked::full("keep".into(), true, df.height());
    for name in columns {
        mask = &mask & &df.column(name)?.is_not_null();
    }
    df.filter(&mask)
}

/// Finite numeric values of a column, nulls skipped.
pub(crate) fn finite_values(column: &Column) -> PolarsResult<Vec<f64>> {
    Ok(numeric_values(column.as_materialized_series())?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_head_json_cells() {
        let df = df![
            "Permit Number" => ["201505065519", "M803667"],
            "Estimated Cost" => [Some(4000i64), None],
            "Revised Cost" => [Some(4000.5), Some(1.0)],
        ]
        .unwrap();
        let table = Table::head(&df, 10).unwrap();

        assert_eq!(table.columns, vec!["Permit Number", "Estimated Cost", "Revised Cost"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.rows[1],
            vec![Value::from("M803667"), Value::Null, Value::from(1.0)]
        );
    }

    #[test]
    fn test_missing_sorted_descending() {
        let df = df![
            "a" => [Some(1i64), None, None, None],
            "b" => [Some(1i64), Some(2), Some(3), Some(4)],
            "c" => [None, Some("x"), Some("y"), Some("z")],
        ]
        .unwrap();
        let missing = missing_by_column(&df);

        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].column, "a");
        assert_eq!(missing[0].missing_percentage, 75.0);
        assert_eq!(missing[1].missing_count, 1);
    }

    #[test]
    fn test_drop_null_rows_over_subset() {
        let df = df![
            "x" => [Some(1i64), None, Some(3)],
            "y" => [Some(1i64), Some(2), None],
            "z" => [None::<i64>, None, None],
        ]
        .unwrap();
        let kept = drop_null_rows(&df, &["x".to_string(), "y".to_string()]).unwrap();
        assert_eq!(kept.height(), 1);
    }

    #[test]
    fn test_split_columns() {
        assert_eq!(
            split_columns(Some("Estimated Cost, Revised Cost,,")),
            vec!["Estimated Cost", "Revised Cost"]
        );
        assert!(split_columns(None).is_empty());
    }
}
