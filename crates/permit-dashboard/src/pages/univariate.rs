use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_range, drop_null_rows, finite_values, selected_column};
use crate::classify::{ColumnKind, ColumnTraits, DEFAULT_CATEGORICAL_THRESHOLD};
use crate::error::Result;
use crate::figure::{BarChart, BoxPlot, Figure, Histogram, PieChart};
use crate::sampling::{CategoryCount, sample_rows, truncate_top_k, value_counts};
use crate::state::DatasetChoice;
use crate::stats::SummaryStats;

const HISTOGRAM_BINS: usize = 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnivariateParams {
    pub dataset: DatasetChoice,
    /// Defaults to the first column.
    pub column: Option<String>,
    pub cat_threshold: usize,
    /// Rows kept for the numeric charts; 0 keeps all.
    pub sample_limit: usize,
    pub top_k: usize,
}

impl Default for UnivariateParams {
    fn default() -> Self {
        Self {
            dataset: DatasetChoice::Raw,
            column: None,
            cat_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            sample_limit: 0,
            top_k: 25,
        }
    }
}

impl UnivariateParams {
    fn validate(&self) -> Result<()> {
        check_range("cat_threshold", self.cat_threshold, 1, 1000)?;
        check_range("sample_limit", self.sample_limit, 0, 200_000)?;
        check_range("top_k", self.top_k, 3, 100)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum UnivariateView {
    Numeric {
        /// Rows behind the charts after sampling.
        plotted_rows: usize,
        histogram: Figure,
        box_plot: Figure,
        summary: Option<SummaryStats>,
    },
    Categorical {
        top_k: usize,
        bar: Figure,
        pie: Figure,
        counts: Vec<CategoryCount>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnivariatePage {
    pub dataset: DatasetChoice,
    pub columns: Vec<String>,
    pub column: String,
    pub kind: ColumnKind,
    pub dtype: String,
    pub non_null_rows: usize,
    #[serde(flatten)]
    pub view: UnivariateView,
}

pub fn build(df: &DataFrame, params: &UnivariateParams) -> Result<UnivariatePage> {
    params.validate()?;
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let column = selected_column(
        df,
        params.column.as_deref(),
        columns.first().map(String::as_str),
        "column",
    )?;

    let col = df.column(&column)?;
    let kind = ColumnTraits::of(col, params.cat_threshold)?.kind();
    let dtype = col.dtype().to_string();
    let present = drop_null_rows(&df.select([column.as_str()])?, std::slice::from_ref(&column))?;

    let view = match kind {
        ColumnKind::Numeric => {
            let sampled = sample_rows(&present, params.sample_limit)?;
            let values = finite_values(sampled.column(&column)?)?;
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            UnivariateView::Numeric {
                plotted_rows: sampled.height(),
                histogram: Figure::Histogram(Histogram::new(
                    format!("Histogram: {}", column),
                    column.clone(),
                    &values,
                    HISTOGRAM_BINS,
                )),
                box_plot: Figure::Box(BoxPlot::single(
                    format!("Box plot: {}", column),
                    column.clone(),
                    &values,
                )),
                summary: SummaryStats::from_sorted(&sorted),
            }
        }
        ColumnKind::Categorical => {
            let counts = truncate_top_k(
                value_counts(present.column(&column)?.as_materialized_series())?,
                params.top_k,
            );
            UnivariateView::Categorical {
                top_k: params.top_k,
                bar: Figure::Bar(BarChart::from_counts(
                    format!("Bar chart: {}", column),
                    column.clone(),
                    &counts,
                )),
                pie: Figure::Pie(PieChart::from_counts(format!("Pie chart: {}", column), &counts)),
                counts,
            }
        }
    };

    Ok(UnivariatePage {
        dataset: params.dataset,
        columns,
        non_null_rows: present.height(),
        column,
        kind,
        dtype,
        view,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn permits() -> DataFrame {
        let costs: Vec<Option<f64>> = (0..200i32)
            .map(|i| if i % 10 == 0 { None } else { Some(f64::from(i) * 100.0) })
            .collect();
        let status: Vec<String> = (0..200).map(|i| format!("status-{}", i % 30)).collect();
        let stories: Vec<i64> = (0..200).map(|i| i % 4).collect();
        df![
            "Estimated Cost" => costs,
            "Current Status" => status,
            "Number of Existing Stories" => stories,
        ]
        .unwrap()
    }

    fn params(column: &str) -> UnivariateParams {
        UnivariateParams {
            column: Some(column.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_numeric_column() {
        let page = build(&permits(), &params("Estimated Cost")).unwrap();
        assert_eq!(page.kind, ColumnKind::Numeric);
        assert_eq!(page.non_null_rows, 180);

        let UnivariateView::Numeric { plotted_rows, histogram, summary, .. } = page.view else {
            panic!("expected numeric view");
        };
        assert_eq!(plotted_rows, 180);
        let Figure::Histogram(hist) = histogram else {
            panic!("expected histogram");
        };
        assert_eq!(hist.bins.len(), 60);
        assert_eq!(hist.total(), 180);
        assert_eq!(summary.unwrap().count, 180);
    }

    #[test]
    fn test_numeric_sampling() {
        let p = UnivariateParams {
            sample_limit: 50,
            ..params("Estimated Cost")
        };
        let page = build(&permits(), &p).unwrap();
        let UnivariateView::Numeric { plotted_rows, summary, .. } = page.view else {
            panic!("expected numeric view");
        };
        assert_eq!(plotted_rows, 50);
        assert_eq!(summary.unwrap().count, 50);
    }

    #[test]
    fn test_categorical_top_k() {
        let p = UnivariateParams {
            top_k: 5,
            ..params("Current Status")
        };
        let page = build(&permits(), &p).unwrap();
        assert_eq!(page.kind, ColumnKind::Categorical);

        let UnivariateView::Categorical { counts, .. } = page.view else {
            panic!("expected categorical view");
        };
        assert_eq!(counts.len(), 6);
        assert_eq!(counts.iter().map(|c| c.count).sum::<usize>(), 200);
        assert_eq!(counts[0].category, "Other");
    }

    #[test]
    fn test_threshold_moves_numbers_to_categories() {
        let page = build(&permits(), &params("Number of Existing Stories")).unwrap();
        assert_eq!(page.kind, ColumnKind::Categorical);

        let p = UnivariateParams {
            cat_threshold: 3,
            ..params("Number of Existing Stories")
        };
        assert_eq!(build(&permits(), &p).unwrap().kind, ColumnKind::Numeric);
    }

    #[test]
    fn test_parameter_validation() {
        let p = UnivariateParams {
            top_k: 2,
            ..Default::default()
        };
        assert_eq!(build(&permits(), &p).unwrap_err().error_code(), "BAD_PARAMETER");

        let err = build(&permits(), &params("Nope")).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_defaults_to_first_column() {
        let page = build(&permits(), &UnivariateParams::default()).unwrap();
        assert_eq!(page.column, "Estimated Cost");
    }
}
