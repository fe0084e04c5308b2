//! Semantic type inference for column analysis.

use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

use crate::error::Result;
use crate::types::{NumericKind, SemanticType};
use crate::utils::{is_integer_dtype, is_numeric_dtype, is_temporal_dtype, numeric_values};

/// Share of sampled text values that must look like dates.
const DATE_MATCH_RATIO: f64 = 0.8;
/// Values inspected when deciding whether text holds dates.
const DATE_SAMPLE_SIZE: usize = 100;

// Date pattern regexes - compiled once at startup
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$").expect("Invalid regex: YYYY-MM-DD"),
        Regex::new(r"^\d{1,2}[-/]\d{1,2}[-/]\d{4}$").expect("Invalid regex: MM/DD/YYYY"),
        Regex::new(r"^\d{1,2}-[A-Za-z]{3}-\d{4}$").expect("Invalid regex: DD-Mon-YYYY"),
        Regex::new(r"^\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}(:\d{2})?").expect("Invalid regex: ISO datetime"),
        Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}\s+\d{1,2}:\d{2}").expect("Invalid regex: US datetime"),
    ]
});

pub(crate) fn looks_like_date(value: &str) -> bool {
    let trimmed = value.trim();
    DATE_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// Infer what a column holds.
pub(crate) fn infer_semantic_type(series: &Series) -> Result<SemanticType> {
    if series.null_count() == series.len() {
        return Ok(SemanticType::Empty);
    }

    let dtype = series.dtype();
    if is_temporal_dtype(dtype) {
        return Ok(SemanticType::Date);
    }
    if is_numeric_dtype(dtype) {
        return Ok(SemanticType::Numeric);
    }
    if dtype != &DataType::String {
        return Ok(SemanticType::Categorical);
    }

    let non_null = series.drop_nulls();
    let values = non_null.str()?;

    let checked = values.len().min(DATE_SAMPLE_SIZE);
    let date_like = values
        .into_iter()
        .take(checked)
        .flatten()
        .filter(|v| looks_like_date(v))
        .count();
    if checked > 0 && date_like as f64 / checked as f64 >= DATE_MATCH_RATIO {
        return Ok(SemanticType::Date);
    }

    // Free text: mostly unique and long.
    let unique_ratio = non_null.n_unique()? as f64 / non_null.len() as f64;
    let avg_length = values
        .into_iter()
        .flatten()
        .map(|s| s.chars().count())
        .sum::<usize>() as f64
        / non_null.len() as f64;
    if unique_ratio > 0.5 && avg_length > 30.0 {
        return Ok(SemanticType::Text);
    }

    Ok(SemanticType::Categorical)
}

/// Discrete when every value is a whole number and there are few of them.
pub(crate) fn infer_numeric_kind(
    series: &Series,
    distinct_count: usize,
    discrete_max_unique: usize,
) -> Result<NumericKind> {
    if distinct_count > discrete_max_unique {
        return Ok(NumericKind::Continuous);
    }
    let integral = is_integer_dtype(series.dtype())
        || numeric_values(series)?
            .into_iter()
            .flatten()
            .all(|v| v.fract() == 0.0);
    Ok(if integral {
        NumericKind::Discrete
    } else {
        NumericKind::Continuous
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_null_is_empty() {
        let series = Series::new("x".into(), &[None::<&str>, None]);
        assert_eq!(infer_semantic_type(&series).unwrap(), SemanticType::Empty);
    }

    #[test]
    fn test_native_types() {
        let ints = Series::new("Existing Units".into(), &[1i64, 2, 3]);
        assert_eq!(infer_semantic_type(&ints).unwrap(), SemanticType::Numeric);

        let flags = Series::new("Site Permit".into(), &[true, false]);
        assert_eq!(infer_semantic_type(&flags).unwrap(), SemanticType::Categorical);

        let dates = Series::new("d".into(), &[0i32, 1]).cast(&DataType::Date).unwrap();
        assert_eq!(infer_semantic_type(&dates).unwrap(), SemanticType::Date);
    }

    #[test]
    fn test_text_dates_detected() {
        let series = Series::new(
            "Filed Date".into(),
            &[Some("05/06/2015"), Some("2015-04-19"), None, Some("11/09/2015")],
        );
        assert_eq!(infer_semantic_type(&series).unwrap(), SemanticType::Date);
    }

    #[test]
    fn test_mostly_non_dates_stay_categorical() {
        let series = Series::new(
            "Unit".into(),
            &["05/06/2015", "A", "B", "C", "D"],
        );
        assert_eq!(infer_semantic_type(&series).unwrap(), SemanticType::Categorical);
    }

    #[test]
    fn test_long_unique_text() {
        let series = Series::new(
            "Description".into(),
            &[
                "ground fl facade: to erect illuminated electric wall sign",
                "remove (e) awning and associated signs, replace with new",
                "installation of separating wall between two retail units",
            ],
        );
        assert_eq!(infer_semantic_type(&series).unwrap(), SemanticType::Text);
    }

    #[test]
    fn test_numeric_kind() {
        let stories = Series::new("Number of Existing Stories".into(), &[Some(2i64), None, Some(3)]);
        assert_eq!(infer_numeric_kind(&stories, 2, 100).unwrap(), NumericKind::Discrete);

        let whole_floats = Series::new("Plansets".into(), &[0.0f64, 2.0]);
        assert_eq!(infer_numeric_kind(&whole_floats, 2, 100).unwrap(), NumericKind::Discrete);

        let cost = Series::new("Estimated Cost".into(), &[1000.5f64, 20.0]);
        assert_eq!(infer_numeric_kind(&cost, 2, 100).unwrap(), NumericKind::Continuous);

        assert_eq!(infer_numeric_kind(&stories, 500, 100).unwrap(), NumericKind::Continuous);
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("2017-01-03"));
        assert!(looks_like_date(" 01/10/2017 "));
        assert!(looks_like_date("03-Jan-2017"));
        assert!(looks_like_date("2017-01-03T10:15:00"));
        assert!(!looks_like_date("N/A"));
        assert!(!looks_like_date("94110"));
    }
}
