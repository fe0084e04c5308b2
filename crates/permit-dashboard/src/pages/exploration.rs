//! Guided data exploration: structure, distributions, gaps, duplicates and
//! correlations in one page.

use permit_processing::DataProfiler;
use permit_processing::types::DatasetProfile;
use permit_processing::utils::numeric_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{MissingEntry, finite_values, missing_by_column, round2, selected_column, split_columns};
use crate::classify::{numeric_columns, text_columns};
use crate::error::{DashboardError, Result};
use crate::figure::{BarChart, CorrelationHeatmap, Figure, Histogram};
use crate::sampling::{count_labels, value_counts};
use crate::state::DatasetChoice;
use crate::stats::{ColumnSummary, SummaryStats, describe, pearson};

const HISTOGRAM_BINS: usize = 50;
const TOP_CATEGORIES: usize = 15;
const DEFAULT_CORRELATION_COLUMNS: usize = 5;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExplorationParams {
    pub dataset: DatasetChoice,
    /// Numeric column for the distribution tab.
    pub numeric: Option<String>,
    /// Text column for the category tab.
    pub categorical: Option<String>,
    /// Comma-separated numeric columns to correlate.
    pub correlation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub column: String,
    pub dtype: String,
    pub non_null: usize,
    pub nulls: usize,
    pub unique: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub memory_mb: f64,
    pub dtype_chart: Figure,
    pub column_info: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NumericDetail {
    pub column: String,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub range: f64,
    pub histogram: Figure,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyColumnDuplicates {
    pub column: String,
    pub duplicate_count: usize,
    pub unique_values: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateAnalysis {
    pub complete_duplicates: usize,
    pub duplicate_percentage: f64,
    pub key_columns: Vec<KeyColumnDuplicates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryDetail {
    pub column: String,
    pub unique_values: usize,
    pub chart: Figure,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationDetail {
    pub figure: Figure,
    pub summary: Vec<ColumnSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplorationPage {
    pub dataset: DatasetChoice,
    pub info: DatasetInfo,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub univariate: Option<NumericDetail>,
    pub missing: Vec<MissingEntry>,
    pub missing_chart: Option<Figure>,
    pub duplicates: DuplicateAnalysis,
    pub categorical: Option<CategoryDetail>,
    pub correlation: Option<CorrelationDetail>,
}

pub fn build(df: &DataFrame, params: &ExplorationParams) -> Result<ExplorationPage> {
    let profile = DataProfiler::default().profile_dataset(df)?;
    let numeric = numeric_columns(df);
    let categorical = text_columns(df);

    let missing = missing_by_column(df);
    let missing_chart = (!missing.is_empty()).then(|| {
        Figure::Bar(BarChart::new(
            "Missing Data Percentage by Column",
            "Column",
            "Missing %",
            missing.iter().map(|m| m.column.clone()).collect(),
            missing.iter().map(|m| m.missing_percentage).collect(),
        ))
    });

    Ok(ExplorationPage {
        dataset: params.dataset,
        info: dataset_info(&profile),
        univariate: numeric_detail(df, params, &numeric)?,
        missing,
        missing_chart,
        duplicates: duplicate_analysis(&profile),
        categorical: category_detail(df, params, &categorical)?,
        correlation: correlation_detail(df, params, &numeric)?,
        numeric_columns: numeric,
        categorical_columns: categorical,
    })
}

fn dataset_info(profile: &DatasetProfile) -> DatasetInfo {
    let dtype_counts = count_labels(profile.column_profiles.iter().map(|c| c.dtype.as_str()));
    DatasetInfo {
        rows: profile.shape.0,
        columns: profile.shape.1,
        memory_mb: round2(profile.estimated_size_bytes as f64 / BYTES_PER_MB),
        dtype_chart: Figure::Bar(BarChart::new(
            "Data Types in Dataset",
            "Data Type",
            "Count",
            dtype_counts.iter().map(|c| c.category.clone()).collect(),
            dtype_counts.iter().map(|c| c.count as f64).collect(),
        )),
        column_info: profile
            .column_profiles
            .iter()
            .map(|c| ColumnInfo {
                column: c.name.clone(),
                dtype: c.dtype.clone(),
                non_null: profile.shape.0 - c.null_count,
                nulls: c.null_count,
                unique: c.distinct_count,
            })
            .collect(),
    }
}

fn duplicate_analysis(profile: &DatasetProfile) -> DuplicateAnalysis {
    DuplicateAnalysis {
        complete_duplicates: profile.duplicate_count,
        duplicate_percentage: round2(profile.duplicate_percentage),
        key_columns: profile
            .key_duplicates
            .iter()
            .map(|k| KeyColumnDuplicates {
                column: k.column.clone(),
                duplicate_count: k.duplicate_rows,
                unique_values: profile
                    .column(&k.column)
                    .map(|c| c.distinct_count)
                    .unwrap_or_default(),
            })
            .collect(),
    }
}

fn numeric_detail(
    df: &DataFrame,
    params: &ExplorationParams,
    numeric: &[String],
) -> Result<Option<NumericDetail>> {
    let Some(first) = numeric.first() else {
        return Ok(None);
    };
    let column = selected_column(df, params.numeric.as_deref(), Some(first), "numeric")?;
    if !numeric.contains(&column) {
        return Err(DashboardError::bad_parameter(
            "numeric",
            format!("'{}' is not a numeric column", column),
        ));
    }

    let values = finite_values(df.column(&column)?)?;
    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let Some(stats) = SummaryStats::from_sorted(&sorted) else {
        return Ok(None);
    };

    Ok(Some(NumericDetail {
        mean: stats.mean,
        median: stats.median,
        std: stats.std,
        range: stats.range(),
        histogram: Figure::Histogram(
            Histogram::new(
                format!("Distribution of {}", column),
                column.clone(),
                &values,
                HISTOGRAM_BINS,
            )
            .with_marginal_box(),
        ),
        column,
    }))
}

fn category_detail(
    df: &DataFrame,
    params: &ExplorationParams,
    categorical: &[String],
) -> Result<Option<CategoryDetail>> {
    let Some(first) = categorical.first() else {
        return Ok(None);
    };
    let column = selected_column(df, params.categorical.as_deref(), Some(first), "categorical")?;
    let mut counts = value_counts(df.column(&column)?.as_materialized_series())?;
    let unique_values = counts.len();
    counts.truncate(TOP_CATEGORIES);

    Ok(Some(CategoryDetail {
        chart: Figure::Bar(BarChart::new(
            format!("Top {} Categories in {}", TOP_CATEGORIES, column),
            column.clone(),
            "Frequency",
            counts.iter().map(|c| c.category.clone()).collect(),
            counts.iter().map(|c| c.count as f64).collect(),
        )),
        column,
        unique_values,
    }))
}

fn correlation_detail(
    df: &DataFrame,
    params: &ExplorationParams,
    numeric: &[String],
) -> Result<Option<CorrelationDetail>> {
    let requested = split_columns(params.correlation.as_deref());
    let columns: Vec<String> = if requested.is_empty() {
        numeric.iter().take(DEFAULT_CORRELATION_COLUMNS).cloned().collect()
    } else {
        for name in &requested {
            selected_column(df, Some(name), None, "correlation")?;
            if !numeric.contains(name) {
                return Err(DashboardError::bad_parameter(
                    "correlation",
                    format!("'{}' is not a numeric column", name),
                ));
            }
        }
        requested
    };
    if columns.is_empty() {
        return Ok(None);
    }

    let series = columns
        .iter()
        .map(|c| Ok(numeric_values(df.column(c)?.as_materialized_series())?))
        .collect::<Result<Vec<_>>>()?;
    let matrix = series
        .iter()
        .map(|a| series.iter().map(|b| pearson(a, b)).collect())
        .collect();

    Ok(Some(CorrelationDetail {
        figure: Figure::CorrelationHeatmap(CorrelationHeatmap {
            title: "Correlation Matrix".to_string(),
            columns: columns.clone(),
            matrix,
        }),
        summary: describe(df, &columns)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn permits() -> DataFrame {
        df![
            "Permit Number" => ["A1", "A2", "A2", "A4", "A1"],
            "Record ID" => [1i64, 2, 3, 4, 1],
            "Estimated Cost" => [Some(100.0), Some(200.0), None, Some(400.0), Some(100.0)],
            "Revised Cost" => [Some(110.0), Some(220.0), Some(330.0), Some(440.0), Some(110.0)],
            "Current Status" => [Some("issued"), Some("filed"), Some("issued"), None, Some("issued")],
        ]
        .unwrap()
    }

    #[test]
    fn test_info_and_duplicates() {
        let page = build(&permits(), &ExplorationParams::default()).unwrap();

        assert_eq!(page.info.rows, 5);
        assert_eq!(page.info.columns, 5);
        let cost = &page.info.column_info[2];
        assert_eq!((cost.non_null, cost.nulls, cost.unique), (4, 1, 3));

        // Rows 0 and 4 are identical.
        assert_eq!(page.duplicates.complete_duplicates, 1);
        assert_eq!(page.duplicates.duplicate_percentage, 20.0);
        let permit = &page.duplicates.key_columns[0];
        assert_eq!(permit.column, "Permit Number");
        assert_eq!(permit.duplicate_count, 2);
        assert_eq!(permit.unique_values, 3);
    }

    #[test]
    fn test_numeric_and_category_tabs() {
        let page = build(&permits(), &ExplorationParams::default()).unwrap();

        let numeric = page.univariate.unwrap();
        assert_eq!(numeric.column, "Record ID");
        assert_eq!(numeric.range, 3.0);

        let category = page.categorical.unwrap();
        assert_eq!(category.column, "Permit Number");
        assert_eq!(category.unique_values, 3);

        assert_eq!(page.missing.len(), 2);
        assert_eq!(page.missing[0].missing_percentage, 20.0);
    }

    #[test]
    fn test_correlation_defaults_and_selection() {
        let page = build(&permits(), &ExplorationParams::default()).unwrap();
        let corr = page.correlation.unwrap();
        let Figure::CorrelationHeatmap(heat) = corr.figure else {
            panic!("expected correlation heatmap");
        };
        assert_eq!(heat.columns, vec!["Record ID", "Estimated Cost", "Revised Cost"]);
        // Estimated vs Revised is exactly linear on the shared rows.
        let r = heat.matrix[1][2].unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        assert_eq!(corr.summary.len(), 3);

        let params = ExplorationParams {
            correlation: Some("Current Status".into()),
            ..Default::default()
        };
        let err = build(&permits(), &params).unwrap_err();
        assert_eq!(err.error_code(), "BAD_PARAMETER");
    }
}
