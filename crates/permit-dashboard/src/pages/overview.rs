//! Landing page: headline metrics, column dictionary, preview and the quick
//! status/neighbourhood charts.

use chrono::{Datelike, Duration, NaiveDate};
use permit_processing::cleaner::dates::date_days;
use permit_processing::schema::{
    CREATION_DATE_COLUMN, NEIGHBORHOOD_COLUMN, PERMIT_COLUMNS, PREVIEW_COLUMNS, STATUS_COLUMN,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{MissingEntry, Table, missing_by_column, require_column, selected_column, split_columns};
use crate::classify::{numeric_columns, text_columns};
use crate::error::Result;
use crate::figure::{BarChart, Figure, PieChart};
use crate::sampling::value_counts;
use crate::state::DatasetChoice;
use crate::stats::{ColumnSummary, describe};

const PREVIEW_ROWS: usize = 10;
const TOP_VALUES: usize = 20;
const STATUS_SLICES: usize = 20;
const TOP_NEIGHBORHOODS: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverviewParams {
    pub dataset: DatasetChoice,
    /// Comma-separated preview columns.
    pub preview: Option<String>,
    /// Text column for the top-values bar.
    pub categorical: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewMetrics {
    pub records: usize,
    pub columns: usize,
    /// `"2013 - 2018"`, or `"N/A"` without usable creation dates.
    pub date_range: String,
    pub missing_values: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewPage {
    pub dataset: DatasetChoice,
    pub metrics: OverviewMetrics,
    pub column_dictionary: Vec<ColumnDescription>,
    pub columns: Vec<String>,
    pub preview: Table,
    pub numeric_summary: Vec<ColumnSummary>,
    pub categorical_columns: Vec<String>,
    pub selected_categorical: Option<String>,
    pub top_values: Option<Figure>,
    pub missing: Vec<MissingEntry>,
    pub missing_chart: Option<Figure>,
    pub status_chart: Option<Figure>,
    pub neighborhood_chart: Option<Figure>,
}

pub fn build(df: &DataFrame, params: &OverviewParams) -> Result<OverviewPage> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();

    let metrics = OverviewMetrics {
        records: df.height(),
        columns: df.width(),
        date_range: date_range(df)?.unwrap_or_else(|| "N/A".to_string()),
        missing_values: df.get_columns().iter().map(|c| c.null_count()).sum(),
    };

    let column_dictionary = PERMIT_COLUMNS
        .iter()
        .filter(|c| df.column(c.name).is_ok())
        .map(|c| ColumnDescription {
            name: c.name.to_string(),
            description: c.description.to_string(),
        })
        .collect();

    let preview = Table::head(&df.select(preview_columns(df, params)?)?, PREVIEW_ROWS)?;
    let numeric_summary = describe(df, &numeric_columns(df))?;

    let categorical_columns = text_columns(df);
    let selected_categorical = match categorical_columns.first() {
        Some(first) => Some(selected_column(
            df,
            params.categorical.as_deref(),
            Some(first),
            "categorical",
        )?),
        None => None,
    };
    let top_values = match &selected_categorical {
        Some(name) => {
            let mut counts = value_counts(df.column(name)?.as_materialized_series())?;
            counts.truncate(TOP_VALUES);
            Some(Figure::Bar(BarChart::from_counts(
                format!("Top values: {}", name),
                name.clone(),
                &counts,
            )))
        }
        None => None,
    };

    let missing = missing_by_column(df);
    let missing_chart = (!missing.is_empty()).then(|| {
        Figure::Bar(BarChart::new(
            "Missing values by column",
            "column",
            "missing_count",
            missing.iter().map(|m| m.column.clone()).collect(),
            missing.iter().map(|m| m.missing_count as f64).collect(),
        ))
    });

    let status_chart = match df.column(STATUS_COLUMN) {
        Ok(col) => {
            let mut counts = value_counts(col.as_materialized_series())?;
            counts.truncate(STATUS_SLICES);
            Some(Figure::Pie(PieChart::from_counts(
                "Permit status distribution",
                &counts,
            )))
        }
        Err(_) => None,
    };

    let neighborhood_chart = match df.column(NEIGHBORHOOD_COLUMN) {
        Ok(col) => {
            let mut counts = value_counts(col.as_materialized_series())?;
            counts.truncate(TOP_NEIGHBORHOODS);
            Some(Figure::Bar(
                BarChart::from_counts("Top neighborhoods by permits", "neighborhood", &counts)
                    .horizontal(),
            ))
        }
        Err(_) => None,
    };

    Ok(OverviewPage {
        dataset: params.dataset,
        metrics,
        column_dictionary,
        columns,
        preview,
        numeric_summary,
        categorical_columns,
        selected_categorical,
        top_values,
        missing,
        missing_chart,
        status_chart,
        neighborhood_chart,
    })
}

/// Requested preview columns, else the usual identifying columns that are
/// present, else the first six.
fn preview_columns(df: &DataFrame, params: &OverviewParams) -> Result<Vec<String>> {
    let requested = split_columns(params.preview.as_deref());
    if !requested.is_empty() {
        for name in &requested {
            require_column(df, name)?;
        }
        return Ok(requested);
    }

    let defaults: Vec<String> = PREVIEW_COLUMNS
        .iter()
        .filter(|c| df.column(c).is_ok())
        .map(|c| c.to_string())
        .collect();
    if !defaults.is_empty() {
        return Ok(defaults);
    }
    Ok(df
        .get_column_names()
        .iter()
        .take(PREVIEW_COLUMNS.len())
        .map(|c| c.to_string())
        .collect())
}

/// First and last year of the permit creation dates.
fn date_range(df: &DataFrame) -> Result<Option<String>> {
    let Ok(col) = df.column(CREATION_DATE_COLUMN) else {
        return Ok(None);
    };
    let days: Vec<i32> = date_days(col.as_materialized_series())?
        .into_iter()
        .flatten()
        .collect();
    let (Some(first), Some(last)) = (days.iter().min(), days.iter().max()) else {
        return Ok(None);
    };
    Ok(match (year_of(*first), year_of(*last)) {
        (Some(a), Some(b)) => Some(format!("{} - {}", a, b)),
        _ => None,
    })
}

fn year_of(epoch_days: i32) -> Option<i32> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?
        .checked_add_signed(Duration::days(i64::from(epoch_days)))
        .map(|d| d.year())
}
