//! Statistical analysis functions for column profiling.

use polars::prelude::*;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::SemanticType;
use crate::utils::{quantile_sorted, sorted_numeric_values, string_mode};

/// Extract statistical characteristics from a column.
pub(crate) fn extract_column_characteristics(
    series: &Series,
    semantic_type: SemanticType,
    distinct_count: usize,
    iqr_multiplier: f64,
) -> Result<HashMap<String, serde_json::Value>> {
    let mut characteristics = HashMap::new();

    let cardinality = if distinct_count < 10 {
        "low"
    } else if distinct_count < 50 {
        "medium"
    } else {
        "high"
    };
    characteristics.insert("cardinality".to_string(), serde_json::json!(cardinality));

    match semantic_type {
        SemanticType::Numeric => {
            let sorted = sorted_numeric_values(series)?;
            if !sorted.is_empty() {
                let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
                let std = calculate_std(&sorted);
                let skewness = calculate_skewness(&sorted);

                characteristics.insert("mean".to_string(), serde_json::json!(mean));
                characteristics.insert("std".to_string(), serde_json::json!(std));
                characteristics.insert("skewness".to_string(), serde_json::json!(skewness));
                characteristics.insert(
                    "min".to_string(),
                    serde_json::json!(sorted.first().copied()),
                );
                characteristics.insert("max".to_string(), serde_json::json!(sorted.last().copied()));
                characteristics.insert(
                    "outlier_count".to_string(),
                    serde_json::json!(count_iqr_outliers(&sorted, iqr_multiplier)),
                );

                let distribution = if skewness.abs() < 1.0 {
                    "normal"
                } else {
                    "skewed"
                };
                characteristics.insert("distribution".to_string(), serde_json::json!(distribution));
            }
        }
        SemanticType::Categorical | SemanticType::Text => {
            if let Some(most_frequent) = string_mode(series) {
                characteristics.insert(
                    "most_frequent".to_string(),
                    serde_json::json!(most_frequent),
                );
            }
        }
        SemanticType::Date => {
            if crate::utils::is_temporal_dtype(series.dtype()) {
                let non_null = series.drop_nulls();
                if !non_null.is_empty() {
                    let sorted = non_null.sort(SortOptions::default())?;
                    let first = sorted.get(0)?;
                    let last = sorted.get(sorted.len() - 1)?;
                    characteristics.insert(
                        "earliest".to_string(),
                        serde_json::json!(first.to_string()),
                    );
                    characteristics.insert("latest".to_string(), serde_json::json!(last.to_string()));
                }
            }
        }
        SemanticType::Empty => {}
    }

    Ok(characteristics)
}

/// Sample standard deviation.
pub(crate) fn calculate_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n <= 1.0 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

pub(crate) fn calculate_skewness(values: &[f64]) -> f64 {
    let std = calculate_std(values);
    if std == 0.0 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values
        .iter()
        .map(|v| ((v - mean) / std).powi(3))
        .sum::<f64>()
        / n
}

/// Count values outside the Tukey fences of pre-sorted data.
pub(crate) fn count_iqr_outliers(sorted: &[f64], multiplier: f64) -> usize {
    let (Some(q1), Some(q3)) = (quantile_sorted(sorted, 0.25), quantile_sorted(sorted, 0.75))
    else {
        return 0;
    };
    let iqr = q3 - q1;
    let lower = q1 - multiplier * iqr;
    let upper = q3 + multiplier * iqr;
    sorted.iter().filter(|v| **v < lower || **v > upper).count()
}
