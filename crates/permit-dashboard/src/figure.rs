//! Serializable chart descriptions.
//!
//! The server does all the aggregation (binning, quartiles, cross-tabs) and
//! ships the result; the browser only draws. Every figure serializes with a
//! `kind` tag, e.g. `{"kind": "histogram", "title": ..., "bins": [...]}`.

use permit_processing::utils::{median_sorted, quantile_sorted};
use serde::Serialize;

use crate::sampling::CategoryCount;

/// Fence multiplier for box-plot outlier points.
const BOX_WHISKER_IQR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figure {
    Histogram(Histogram),
    Box(BoxPlot),
    Bar(BarChart),
    Pie(PieChart),
    Scatter(ScatterPlot),
    DensityHeatmap(DensityHeatmap),
    CrosstabHeatmap(CrosstabHeatmap),
    Line(LineChart),
    CorrelationHeatmap(CorrelationHeatmap),
}

impl Figure {
    pub fn title(&self) -> &str {
        match self {
            Self::Histogram(f) => &f.title,
            Self::Box(f) => &f.title,
            Self::Bar(f) => &f.title,
            Self::Pie(f) => &f.title,
            Self::Scatter(f) => &f.title,
            Self::DensityHeatmap(f) => &f.title,
            Self::CrosstabHeatmap(f) => &f.title,
            Self::Line(f) => &f.title,
            Self::CorrelationHeatmap(f) => &f.title,
        }
    }
}

// ============================================================================
// Binning
// ============================================================================

/// `bins` equal-width intervals covering `[min, max]`. The last interval is
/// closed on the right. A constant column is widened by 0.5 on each side.
/// Returns `None` for no values or zero bins.
fn bin_edges(sorted: &[f64], bins: usize) -> Option<Vec<f64>> {
    let (&first, &last) = (sorted.first()?, sorted.last()?);
    if bins == 0 {
        return None;
    }
    let (min, max) = if first == last {
        (first - 0.5, last + 0.5)
    } else {
        (first, last)
    };
    let width = (max - min) / bins as f64;
    Some((0..=bins).map(|i| min + width * i as f64).collect())
}

fn bin_index(edges: &[f64], value: f64) -> usize {
    let bins = edges.len() - 1;
    let (min, max) = (edges[0], edges[bins]);
    let idx = ((value - min) / (max - min) * bins as f64).floor() as usize;
    idx.min(bins - 1)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

// ============================================================================
// Histogram
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub title: String,
    pub x_label: String,
    pub bins: Vec<HistogramBin>,
    /// Draw a box plot above the bars.
    pub marginal_box: bool,
}

impl Histogram {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, values: &[f64], bins: usize) -> Self {
        let sorted = sorted_finite(values);
        let bins = match bin_edges(&sorted, bins) {
            Some(edges) => {
                let mut counts = vec![0usize; edges.len() - 1];
                for &v in &sorted {
                    counts[bin_index(&edges, v)] += 1;
                }
                edges
                    .windows(2)
                    .zip(counts)
                    .map(|(w, count)| HistogramBin {
                        start: w[0],
                        end: w[1],
                        count,
                    })
                    .collect()
            }
            None => Vec::new(),
        };
        Self {
            title: title.into(),
            x_label: x_label.into(),
            bins,
            marginal_box: false,
        }
    }

    pub fn with_marginal_box(mut self) -> Self {
        self.marginal_box = true;
        self
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

// ============================================================================
// Box plot
// ============================================================================

/// Quartiles, whiskers and outlier points of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value at or above `q1 - 1.5 * IQR`.
    pub lower_whisker: f64,
    /// Largest value at or below `q3 + 1.5 * IQR`.
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxGroup {
    /// `None` when no finite values are given.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted_finite(values);
        let q1 = quantile_sorted(&sorted, 0.25)?;
        let median = median_sorted(&sorted)?;
        let q3 = quantile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;
        let (low_fence, high_fence) = (q1 - BOX_WHISKER_IQR * iqr, q3 + BOX_WHISKER_IQR * iqr);

        let inside = sorted.iter().copied().filter(|v| *v >= low_fence && *v <= high_fence);
        let lower_whisker = inside.clone().next().unwrap_or(q1);
        let upper_whisker = inside.last().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < low_fence || *v > high_fence)
            .collect();

        Some(Self {
            category: None,
            color: None,
            count: sorted.len(),
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlot {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_label: Option<String>,
    pub groups: Vec<BoxGroup>,
}

impl BoxPlot {
    /// A single box over every value.
    pub fn single(title: impl Into<String>, y_label: impl Into<String>, values: &[f64]) -> Self {
        Self {
            title: title.into(),
            x_label: None,
            y_label: y_label.into(),
            color_label: None,
            groups: BoxGroup::from_values(values).into_iter().collect(),
        }
    }
}

// ============================================================================
// Bar and pie
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarMode {
    #[default]
    Group,
    Stack,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    /// Label of the category axis.
    pub category_label: String,
    /// Label of the value axis.
    pub value_label: String,
    pub orientation: Orientation,
    pub mode: BarMode,
    pub categories: Vec<String>,
    pub series: Vec<BarSeries>,
    /// Print each bar's value on the bar.
    pub text_auto: bool,
}

impl BarChart {
    pub fn new(
        title: impl Into<String>,
        category_label: impl Into<String>,
        value_label: impl Into<String>,
        categories: Vec<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            title: title.into(),
            category_label: category_label.into(),
            value_label: value_label.into(),
            orientation: Orientation::Vertical,
            mode: BarMode::Group,
            categories,
            series: vec![BarSeries { name: None, values }],
            text_auto: false,
        }
    }

    /// One bar per category, height = count.
    pub fn from_counts(
        title: impl Into<String>,
        category_label: impl Into<String>,
        counts: &[CategoryCount],
    ) -> Self {
        Self::new(
            title,
            category_label,
            "count",
            counts.iter().map(|c| c.category.clone()).collect(),
            counts.iter().map(|c| c.count as f64).collect(),
        )
    }

    pub fn horizontal(mut self) -> Self {
        self.orientation = Orientation::Horizontal;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieChart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl PieChart {
    pub fn from_counts(title: impl Into<String>, counts: &[CategoryCount]) -> Self {
        Self {
            title: title.into(),
            labels: counts.iter().map(|c| c.category.clone()).collect(),
            values: counts.iter().map(|c| c.count as f64).collect(),
        }
    }
}

// ============================================================================
// Two-variable figures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_label: Option<String>,
    pub opacity: f64,
    pub points: Vec<ScatterPoint>,
}

/// Counts over a `bins x bins` grid. `counts[row][col]` is y bin `row`,
/// x bin `col`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityHeatmap {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    pub counts: Vec<Vec<usize>>,
}

impl DensityHeatmap {
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        points: &[(f64, f64)],
        bins: usize,
    ) -> Self {
        let finite: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        let xs = sorted_finite(&finite.iter().map(|p| p.0).collect::<Vec<_>>());
        let ys = sorted_finite(&finite.iter().map(|p| p.1).collect::<Vec<_>>());

        let (x_edges, y_edges, counts) = match (bin_edges(&xs, bins), bin_edges(&ys, bins)) {
            (Some(x_edges), Some(y_edges)) => {
                let mut counts = vec![vec![0usize; x_edges.len() - 1]; y_edges.len() - 1];
                for (x, y) in &finite {
                    counts[bin_index(&y_edges, *y)][bin_index(&x_edges, *x)] += 1;
                }
                (x_edges, y_edges, counts)
            }
            _ => (Vec::new(), Vec::new(), Vec::new()),
        };

        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            x_edges,
            y_edges,
            counts,
        }
    }
}

/// Contingency table of two categorical columns. `counts[row][col]` pairs
/// `y_categories[row]` with `x_categories[col]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosstabHeatmap {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_categories: Vec<String>,
    pub y_categories: Vec<String>,
    pub counts: Vec<Vec<usize>>,
    pub text_auto: bool,
}

/// Cells above which counts are no longer printed on the heatmap.
const CROSSTAB_TEXT_CELLS: usize = 400;

impl CrosstabHeatmap {
    /// Categories on each axis are sorted, as a pivot table would.
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        pairs: &[(String, String)],
    ) -> Self {
        let mut x_categories: Vec<String> = pairs.iter().map(|p| p.0.clone()).collect();
        let mut y_categories: Vec<String> = pairs.iter().map(|p| p.1.clone()).collect();
        x_categories.sort();
        x_categories.dedup();
        y_categories.sort();
        y_categories.dedup();

        let mut counts = vec![vec![0usize; x_categories.len()]; y_categories.len()];
        for (x, y) in pairs {
            if let (Ok(col), Ok(row)) = (x_categories.binary_search(x), y_categories.binary_search(y)) {
                counts[row][col] += 1;
            }
        }

        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            text_auto: x_categories.len() * y_categories.len() <= CROSSTAB_TEXT_CELLS,
            x_categories,
            y_categories,
            counts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub markers: bool,
    pub points: Vec<LinePoint>,
}

impl LineChart {
    /// Mean of `y` for each distinct `x`, ordered by `x`.
    pub fn mean_by_x(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        points: &[(f64, f64)],
    ) -> Self {
        let mut sorted: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut line: Vec<LinePoint> = Vec::new();
        let mut run: Option<(f64, f64, usize)> = None;
        for (x, y) in sorted {
            run = match run {
                Some((rx, sum, n)) if rx == x => Some((rx, sum + y, n + 1)),
                Some((rx, sum, n)) => {
                    line.push(LinePoint { x: rx, y: sum / n as f64 });
                    Some((x, y, 1))
                }
                None => Some((x, y, 1)),
            };
        }
        if let Some((rx, sum, n)) = run {
            line.push(LinePoint { x: rx, y: sum / n as f64 });
        }

        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            markers: true,
            points: line,
        }
    }
}

/// Pearson coefficients, `matrix[i][j]` between `columns[i]` and
/// `columns[j]`. Pairs without enough overlapping values are `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationHeatmap {
    pub title: String,
    pub columns: Vec<String>,
    pub matrix: Vec<Vec<Option<f64>>>,
}
