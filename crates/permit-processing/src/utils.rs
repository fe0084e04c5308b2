//! Shared helpers for series inspection and transformation.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for cleaning purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Temporal,
    Boolean,
    String,
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    is_numeric_dtype(dtype) && !matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is a date or datetime.
#[inline]
pub fn is_temporal_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_temporal_dtype(dtype) {
        DtypeCategory::Temporal
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Parse a cell as a number the way a CSV reader would: no currency symbols,
/// no thousands separators.
pub fn parse_numeric_cell(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a cell as an integer.
pub fn parse_integer_cell(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Numeric values of a series as `f64`, nulls preserved.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Non-null numeric values, sorted ascending.
pub fn sorted_numeric_values(series: &Series) -> PolarsResult<Vec<f64>> {
    let mut values: Vec<f64> = numeric_values(series)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));
    Ok(values)
}

/// Quantile of pre-sorted values using linear interpolation between the
/// closest ranks. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(sorted[0]);
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted[lower]);
    }
    let weight = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    quantile_sorted(sorted, 0.5)
}

/// Most frequent string value. Ties go to the value seen first.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_series = series.drop_nulls().cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;

    let mut order: Vec<&str> = Vec::new();
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for val in str_chunked.into_iter().flatten() {
        let entry = counts.entry(val).or_insert(0);
        if *entry == 0 {
            order.push(val);
        }
        *entry += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for val in order {
        let count = counts[val];
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((val, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

/// Fraction of non-null cells in the table, 0.0 - 1.0.
pub fn completeness(df: &DataFrame) -> f64 {
    let cells = df.height() * df.width();
    if cells == 0 {
        return 1.0;
    }
    let nulls: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    1.0 - nulls as f64 / cells as f64
}

/// Missing fraction of a single column, 0.0 for an empty table.
pub fn missing_fraction(column: &Column) -> f64 {
    if column.is_empty() {
        0.0
    } else {
        column.null_count() as f64 / column.len() as f64
    }
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value. The result is
/// `Float64`.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let values: Vec<f64> = numeric_values(series)?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value))
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let cast = series.cast(&DataType::String)?;
    let values: Vec<String> = cast
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(fill_value).to_string())
        .collect();
    Ok(Series::new(series.name().clone(), values))
}

/// Collect sample values from a Series (non-null values only).
pub fn collect_sample_values(series: &Series, max_samples: usize) -> Vec<String> {
    let non_null = series.drop_nulls();
    (0..max_samples.min(non_null.len()))
        .filter_map(|i| non_null.get(i).ok())
        .map(|val| format_any_value(&val))
        .collect()
}

/// Render a cell without the quotes polars adds around strings.
pub fn format_any_value(val: &AnyValue) -> String {
    match val {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => format!("{}", other),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
        assert!(is_integer_dtype(&DataType::Int32));
        assert!(!is_integer_dtype(&DataType::Float32));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::Int64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Temporal);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
    }

    #[test]
    fn test_parse_numeric_cell() {
        assert_eq!(parse_numeric_cell("42"), Some(42.0));
        assert_eq!(parse_numeric_cell(" -3.5 "), Some(-3.5));
        assert_eq!(parse_numeric_cell("1e3"), Some(1000.0));
        assert_eq!(parse_numeric_cell(""), None);
        assert_eq!(parse_numeric_cell("12A"), None);
        assert_eq!(parse_numeric_cell("inf"), None);
        assert_eq!(parse_integer_cell("007"), Some(7));
        assert_eq!(parse_integer_cell("7.0"), None);
    }

    #[test]
    fn test_quantile_sorted_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&values, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&values, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&values, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&values, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[9.0], 0.75), Some(9.0));
    }

    #[test]
    fn test_sorted_numeric_values_skips_nulls() {
        let series = Series::new("cost".into(), &[Some(3i64), None, Some(1)]);
        assert_eq!(sorted_numeric_values(&series).unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_fill_numeric_nulls() {
        let series = Series::new("test".into(), &[Some(1.0), None, Some(3.0)]);
        let filled = fill_numeric_nulls(&series, 0.0).unwrap();

        assert_eq!(filled.null_count(), 0);
        assert_eq!(filled.get(1).unwrap().try_extract::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn test_fill_string_nulls() {
        let series = Series::new("status".into(), &[Some("issued"), None]);
        let filled = fill_string_nulls(&series, "Unknown").unwrap();
        assert_eq!(filled.str().unwrap().get(1), Some("Unknown"));
    }

    #[test]
    fn test_string_mode_tie_goes_to_first_seen() {
        let series = Series::new("test".into(), &["b", "a", "a", "b", "c"]);
        assert_eq!(string_mode(&series), Some("b".to_string()));
    }

    #[test]
    fn test_completeness_and_missing_fraction() {
        let df = df!(
            "a" => &[Some(1i64), None],
            "b" => &[Some("x"), Some("y")]
        )
        .unwrap();
        assert!((completeness(&df) - 0.75).abs() < 1e-9);
        assert!((missing_fraction(df.column("a").unwrap()) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_collect_sample_values() {
        let series = Series::new("test".into(), &[Some("a"), None, Some("b"), Some("c")]);
        let samples = collect_sample_values(&series, 5);
        assert_eq!(samples, vec!["a", "b", "c"]);
    }
}
