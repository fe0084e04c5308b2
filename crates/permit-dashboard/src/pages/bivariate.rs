//! Two-column views. The chart family follows from the column types:
//! numbers against numbers, numbers split by a category, or two categories.

use std::collections::HashMap;

use permit_processing::utils::{median_sorted, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_range, drop_null_rows, selected_column};
use crate::classify::{ColumnKind, ColumnTraits, DEFAULT_CATEGORICAL_THRESHOLD};
use crate::error::Result;
use crate::figure::{
    BarChart, BarMode, BarSeries, BoxGroup, BoxPlot, CrosstabHeatmap, DensityHeatmap, Figure,
    LineChart, ScatterPlot, ScatterPoint,
};
use crate::sampling::{collapse_to_top_k, count_labels, labels, sample_rows};
use crate::state::DatasetChoice;
use crate::stats::mean;

const DENSITY_BINS: usize = 40;
/// Categories kept per axis before cross-tabulating.
const MAX_DISPLAY_CATEGORIES: usize = 40;
/// Above this many distinct values on either axis the cross-tab gives way
/// to bars.
const MAX_HEATMAP_CATEGORIES: usize = 60;
const SCATTER_OPACITY: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPlot {
    #[default]
    Scatter,
    Heatmap,
    Line,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedChart {
    #[default]
    Box,
    Bar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Count,
    Mean,
    Median,
    Sum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalView {
    #[default]
    Heatmap,
    StackedBar,
    GroupedBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    NumericNumeric,
    NumericCategorical,
    CategoricalCategorical,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BivariateParams {
    pub dataset: DatasetChoice,
    /// Defaults to the first column.
    pub x: Option<String>,
    /// Defaults to the second column.
    pub y: Option<String>,
    /// Optional grouping for scatter points and boxes.
    pub color: Option<String>,
    /// Scatter points kept; 0 keeps all.
    pub sample_limit: usize,
    pub cat_threshold: usize,
    pub plot: NumericPlot,
    pub chart: MixedChart,
    pub agg: Aggregation,
    pub prefer: CategoricalView,
    pub show_counts: bool,
}

impl Default for BivariateParams {
    fn default() -> Self {
        Self {
            dataset: DatasetChoice::Raw,
            x: None,
            y: None,
            color: None,
            sample_limit: 5000,
            cat_threshold: DEFAULT_CATEGORICAL_THRESHOLD,
            plot: NumericPlot::default(),
            chart: MixedChart::default(),
            agg: Aggregation::default(),
            prefer: CategoricalView::default(),
            show_counts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BivariatePage {
    pub dataset: DatasetChoice,
    pub columns: Vec<String>,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub x_kind: ColumnKind,
    pub y_kind: ColumnKind,
    /// X and Y name the same column.
    pub same_column: bool,
    pub pairing: Pairing,
    /// Rows with every selected column present.
    pub complete_rows: usize,
    pub figure: Figure,
}

pub fn build(df: &DataFrame, params: &BivariateParams) -> Result<BivariatePage> {
    check_range("sample_limit", params.sample_limit, 0, 200_000)?;
    check_range("cat_threshold", params.cat_threshold, 1, 1000)?;

    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let x = selected_column(df, params.x.as_deref(), columns.first().map(String::as_str), "x")?;
    let y = selected_column(
        df,
        params.y.as_deref(),
        columns.get(1).or(columns.first()).map(String::as_str),
        "y",
    )?;
    let color = match params.color.as_deref().filter(|c| !c.is_empty()) {
        Some(name) => Some(selected_column(df, Some(name), None, "color")?),
        None => None,
    };

    let x_traits = ColumnTraits::of(df.column(&x)?, params.cat_threshold)?;
    let y_traits = ColumnTraits::of(df.column(&y)?, params.cat_threshold)?;

    let mut selected = vec![x.clone()];
    for name in [Some(&y), color.as_ref()].into_iter().flatten() {
        if !selected.contains(name) {
            selected.push(name.clone());
        }
    }
    let plot_df = drop_null_rows(&df.select(selected.iter().map(String::as_str))?, &selected)?;

    let view = View {
        df: &plot_df,
        x: &x,
        y: &y,
        color: color.as_deref(),
        params,
    };
    let (pairing, figure) = match (x_traits.numeric, y_traits.numeric) {
        (true, true) => (Pairing::NumericNumeric, view.numeric_numeric()?),
        (true, false) => (Pairing::NumericCategorical, view.numeric_by_category(&y, &x, false)?),
        (false, true) => (Pairing::NumericCategorical, view.numeric_by_category(&x, &y, true)?),
        (false, false) => (Pairing::CategoricalCategorical, view.categorical_categorical()?),
    };

    Ok(BivariatePage {
        dataset: params.dataset,
        columns,
        same_column: x == y,
        x_kind: x_traits.kind(),
        y_kind: y_traits.kind(),
        complete_rows: plot_df.height(),
        x,
        y,
        color,
        pairing,
        figure,
    })
}

struct View<'a> {
    df: &'a DataFrame,
    x: &'a str,
    y: &'a str,
    color: Option<&'a str>,
    params: &'a BivariateParams,
}

impl View<'_> {
    fn numbers(&self, df: &DataFrame, name: &str) -> Result<Vec<f64>> {
        Ok(numeric_values(df.column(name)?.as_materialized_series())?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    fn text(&self, df: &DataFrame, name: &str) -> Result<Vec<String>> {
        Ok(labels(df.column(name)?.as_materialized_series())?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect())
    }

    fn color_labels(&self, df: &DataFrame) -> Result<Option<Vec<String>>> {
        self.color.map(|c| self.text(df, c)).transpose()
    }

    fn numeric_numeric(&self) -> Result<Figure> {
        let title = format!("{} vs {}", self.y, self.x);
        match self.params.plot {
            NumericPlot::Scatter => {
                let sampled = sample_rows(self.df, self.params.sample_limit)?;
                let xs = self.numbers(&sampled, self.x)?;
                let ys = self.numbers(&sampled, self.y)?;
                let colors = self.color_labels(&sampled)?;
                let points = xs
                    .into_iter()
                    .zip(ys)
                    .enumerate()
                    .map(|(i, (x, y))| ScatterPoint {
                        x,
                        y,
                        color: colors.as_ref().map(|c| c[i].clone()),
                    })
                    .collect();
                Ok(Figure::Scatter(ScatterPlot {
                    title,
                    x_label: self.x.to_string(),
                    y_label: self.y.to_string(),
                    color_label: self.color.map(str::to_string),
                    opacity: SCATTER_OPACITY,
                    points,
                }))
            }
            NumericPlot::Heatmap => Ok(Figure::DensityHeatmap(DensityHeatmap::new(
                title,
                self.x,
                self.y,
                &self.pairs()?,
                DENSITY_BINS,
            ))),
            NumericPlot::Line => Ok(Figure::Line(LineChart::mean_by_x(
                title,
                self.x,
                self.y,
                &self.pairs()?,
            ))),
        }
    }

    fn pairs(&self) -> Result<Vec<(f64, f64)>> {
        let xs = self.numbers(self.df, self.x)?;
        let ys = self.numbers(self.df, self.y)?;
        Ok(xs.into_iter().zip(ys).collect())
    }

    /// `category` is drawn on the category axis, `value` on the value axis.
    fn numeric_by_category(&self, category: &str, value: &str, category_on_x: bool) -> Result<Figure> {
        let categories = self.text(self.df, category)?;
        let values = self.numbers(self.df, value)?;

        match self.params.chart {
            MixedChart::Box => {
                let colors = self.color_labels(self.df)?;
                let mut order: Vec<(String, Option<String>)> = Vec::new();
                let mut grouped: HashMap<(String, Option<String>), Vec<f64>> = HashMap::new();
                for (i, (cat, v)) in categories.iter().zip(&values).enumerate() {
                    let key = (cat.clone(), colors.as_ref().map(|c| c[i].clone()));
                    let bucket = grouped.entry(key.clone()).or_default();
                    if bucket.is_empty() {
                        order.push(key);
                    }
                    bucket.push(*v);
                }
                let groups = order
                    .into_iter()
                    .filter_map(|key| {
                        let values = grouped.get(&key)?;
                        Some(
                            BoxGroup::from_values(values)?
                                .in_category(key.0)
                                .with_color(key.1),
                        )
                    })
                    .collect();
                Ok(Figure::Box(BoxPlot {
                    title: format!("{} by {}", value, category),
                    x_label: Some(category.to_string()),
                    y_label: value.to_string(),
                    color_label: self.color.map(str::to_string),
                    groups,
                }))
            }
            MixedChart::Bar => {
                let mut grouped: HashMap<&str, Vec<f64>> = HashMap::new();
                for (cat, v) in categories.iter().zip(&values) {
                    grouped.entry(cat.as_str()).or_default().push(*v);
                }
                let mut keys: Vec<&str> = grouped.keys().copied().collect();
                keys.sort_unstable();

                let agg = self.params.agg;
                let heights = keys
                    .iter()
                    .map(|k| aggregate(&grouped[k], agg))
                    .collect();
                let value_label = match agg {
                    Aggregation::Count => "count".to_string(),
                    _ => value.to_string(),
                };
                let chart = BarChart::new(
                    format!("{} by {}", value_label, category),
                    category,
                    value_label,
                    keys.into_iter().map(str::to_string).collect(),
                    heights,
                );
                Ok(Figure::Bar(if category_on_x { chart } else { chart.horizontal() }))
            }
        }
    }

    fn categorical_categorical(&self) -> Result<Figure> {
        let mut xs = self.text(self.df, self.x)?;
        let mut ys = self.text(self.df, self.y)?;
        let ux = count_labels(xs.iter().map(String::as_str)).len();
        let uy = count_labels(ys.iter().map(String::as_str)).len();
        if ux > MAX_DISPLAY_CATEGORIES {
            collapse_to_top_k(&mut xs, MAX_DISPLAY_CATEGORIES);
        }
        if uy > MAX_DISPLAY_CATEGORIES {
            collapse_to_top_k(&mut ys, MAX_DISPLAY_CATEGORIES);
        }

        let heatmap_fits = ux <= MAX_HEATMAP_CATEGORIES && uy <= MAX_HEATMAP_CATEGORIES;
        let mode = match self.params.prefer {
            CategoricalView::Heatmap if heatmap_fits => {
                let pairs: Vec<(String, String)> = xs.into_iter().zip(ys).collect();
                return Ok(Figure::CrosstabHeatmap(CrosstabHeatmap::new(
                    format!("{} by {}", self.y, self.x),
                    self.x,
                    self.y,
                    &pairs,
                )));
            }
            CategoricalView::StackedBar => BarMode::Stack,
            _ => BarMode::Group,
        };

        let x_order: Vec<String> = first_seen(&xs);
        let y_order: Vec<String> = first_seen(&ys);
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for (x, y) in xs.iter().zip(&ys) {
            *counts.entry((x.as_str(), y.as_str())).or_insert(0) += 1;
        }
        let series = y_order
            .iter()
            .map(|y| BarSeries {
                name: Some(y.clone()),
                values: x_order
                    .iter()
                    .map(|x| counts.get(&(x.as_str(), y.as_str())).copied().unwrap_or(0) as f64)
                    .collect(),
            })
            .collect();

        Ok(Figure::Bar(BarChart {
            title: format!("{} by {}", self.y, self.x),
            category_label: self.x.to_string(),
            value_label: "count".to_string(),
            orientation: Default::default(),
            mode,
            categories: x_order,
            series,
            text_auto: self.params.show_counts,
        }))
    }
}

fn first_seen(values: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for v in values {
        if !seen.contains(v) {
            seen.push(v.clone());
        }
    }
    seen
}

fn aggregate(values: &[f64], agg: Aggregation) -> f64 {
    match agg {
        Aggregation::Count => values.len() as f64,
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Mean => mean(values).unwrap_or(f64::NAN),
        Aggregation::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            median_sorted(&sorted).unwrap_or(f64::NAN)
        }
    }
}
