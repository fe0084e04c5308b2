//! Median and constant imputation.

use polars::prelude::*;

use crate::error::{PermitError, Result};
use crate::utils::{fill_numeric_nulls, fill_string_nulls, median_sorted, sorted_numeric_values};

/// Outcome of a single-column fill.
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    pub filled: usize,
    /// The value written, rendered for reports.
    pub value: String,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a numeric column's gaps with its median.
    ///
    /// Integer columns whose median is whole stay integer; otherwise the
    /// column becomes `Float64`.
    pub fn apply_numeric_median(df: &mut DataFrame, col_name: &str) -> Result<FillOutcome> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let filled = series.null_count();
        let median = median_sorted(&sorted_numeric_values(&series)?)
            .ok_or_else(|| PermitError::NoValidValues(col_name.to_string()))?;

        if filled == 0 {
            return Ok(FillOutcome {
                filled,
                value: format_number(median),
            });
        }

        let mut result = fill_numeric_nulls(&series, median)?;
        if crate::utils::is_integer_dtype(series.dtype()) && median.fract() == 0.0 {
            result = result.cast(series.dtype())?;
        }
        df.replace(col_name, result)?;

        Ok(FillOutcome {
            filled,
            value: format_number(median),
        })
    }

    /// Fill a text column's gaps with a literal.
    pub fn apply_constant(df: &mut DataFrame, col_name: &str, value: &str) -> Result<FillOutcome> {
        let series = df.column(col_name)?.as_materialized_series().clone();
        let filled = series.null_count();
        if filled > 0 {
            let result = fill_string_nulls(&series, value)?;
            df.replace(col_name, result)?;
        }
        Ok(FillOutcome {
            filled,
            value: value.to_string(),
        })
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ========================================================================
    // apply_numeric_median() tests
    // ========================================================================

    #[test]
    fn test_apply_numeric_median_basic() {
        let mut df = df![
            "Number of Proposed Stories" => [Some(1.0), None, Some(3.0), None, Some(5.0)],
        ]
        .unwrap();

        let outcome =
            StatisticalImputer::apply_numeric_median(&mut df, "Number of Proposed Stories").unwrap();

        let values = df.column("Number of Proposed Stories").unwrap();
        assert_eq!(values.null_count(), 0);
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert_eq!(outcome, FillOutcome { filled: 2, value: "3".to_string() });
    }

    #[test]
    fn test_apply_numeric_median_keeps_integer_dtype() {
        let mut df = df!["Existing Units" => [Some(1i64), None, Some(3), Some(7)]].unwrap();

        StatisticalImputer::apply_numeric_median(&mut df, "Existing Units").unwrap();

        let units = df.column("Existing Units").unwrap();
        assert_eq!(units.dtype(), &DataType::Int64);
        assert_eq!(units.get(1).unwrap().try_extract::<i64>().unwrap(), 3);
    }

    #[test]
    fn test_apply_numeric_median_fractional_median_becomes_float() {
        let mut df = df!["Plansets" => [Some(1i64), None, Some(2)]].unwrap();

        let outcome = StatisticalImputer::apply_numeric_median(&mut df, "Plansets").unwrap();

        assert_eq!(df.column("Plansets").unwrap().dtype(), &DataType::Float64);
        assert_eq!(outcome.value, "1.50");
    }

    #[test]
    fn test_apply_numeric_median_no_nulls() {
        let mut df = df!["values" => [1i64, 2, 3]].unwrap();
        let outcome = StatisticalImputer::apply_numeric_median(&mut df, "values").unwrap();
        assert_eq!(outcome.filled, 0);
        assert_eq!(df.column("values").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_apply_numeric_median_all_null() {
        let mut df = df!["values" => [Option::<f64>::None, None]].unwrap();
        let err = StatisticalImputer::apply_numeric_median(&mut df, "values").unwrap_err();
        assert!(matches!(err, PermitError::NoValidValues(_)));
    }

    #[test]
    fn test_apply_numeric_median_missing_column() {
        let mut df = df!["a" => [1.0]].unwrap();
        assert!(StatisticalImputer::apply_numeric_median(&mut df, "b").is_err());
    }

    // ========================================================================
    // apply_constant() tests
    // ========================================================================

    #[test]
    fn test_apply_constant() {
        let mut df = df![
            "Street Suffix" => [Some("St"), None, Some("Av"), None],
        ]
        .unwrap();

        let outcome = StatisticalImputer::apply_constant(&mut df, "Street Suffix", "Unknown").unwrap();

        let suffix = df.column("Street Suffix").unwrap();
        assert_eq!(suffix.null_count(), 0);
        assert_eq!(suffix.str().unwrap().get(1), Some("Unknown"));
        assert_eq!(outcome.filled, 2);
    }
}
