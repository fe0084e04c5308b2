//! Deciding whether a column is charted as numbers or as categories.

use permit_processing::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::Serialize;

/// Numeric columns with at most this many distinct values are charted as
/// categories.
pub const DEFAULT_CATEGORICAL_THRESHOLD: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// How a column behaves on a chart axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTraits {
    /// Stored as integers or floats.
    pub numeric: bool,
    /// Text, boolean, date, or a low-cardinality number.
    pub categorical: bool,
}

impl ColumnTraits {
    pub fn of(column: &Column, threshold: usize) -> PolarsResult<Self> {
        let numeric = is_numeric_dtype(column.dtype());
        let categorical = if numeric {
            column.as_materialized_series().drop_nulls().n_unique()? <= threshold
        } else {
            true
        };
        Ok(Self {
            numeric,
            categorical,
        })
    }

    /// Single-column view: categories win over numbers.
    pub fn kind(&self) -> ColumnKind {
        if self.categorical {
            ColumnKind::Categorical
        } else {
            ColumnKind::Numeric
        }
    }
}

/// Names of numeric-dtype columns, in table order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .collect()
}

/// Names of text columns, in table order.
pub fn text_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::String))
        .map(|c| c.name().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_cardinality_numbers_are_categorical() {
        let df = df![
            "stories" => [1i64, 2, 2, 3, 1],
            "cost" => [100.0, 250.5, 3000.0, 12.0, 80.0],
            "status" => ["issued", "filed", "issued", "complete", "filed"],
        ]
        .unwrap();

        let stories = ColumnTraits::of(df.column("stories").unwrap(), 3).unwrap();
        assert!(stories.numeric && stories.categorical);
        assert_eq!(stories.kind(), ColumnKind::Categorical);

        let cost = ColumnTraits::of(df.column("cost").unwrap(), 3).unwrap();
        assert_eq!(cost.kind(), ColumnKind::Numeric);

        let status = ColumnTraits::of(df.column("status").unwrap(), 3).unwrap();
        assert!(!status.numeric);
        assert_eq!(status.kind(), ColumnKind::Categorical);

        assert_eq!(numeric_columns(&df), vec!["stories", "cost"]);
        assert_eq!(text_columns(&df), vec!["status"]);
    }

    #[test]
    fn test_threshold_counts_distinct_non_null() {
        let s = Series::new("units".into(), &[Some(1i64), None, Some(2), Some(2)]).into_column();
        assert!(ColumnTraits::of(&s, 2).unwrap().categorical);
        assert!(!ColumnTraits::of(&s, 1).unwrap().categorical);
    }
}
