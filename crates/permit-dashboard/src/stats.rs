//! Descriptive statistics for the dashboard tables.

use permit_processing::utils::{median_sorted, quantile_sorted, sorted_numeric_values};
use polars::prelude::*;
use serde::Serialize;

/// The `describe()` row of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; 0 for a single value.
    pub std: f64,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q25: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q75: f64,
    pub max: f64,
}

impl SummaryStats {
    /// `None` when the column has no non-null values.
    pub fn from_series(series: &Series) -> PolarsResult<Option<Self>> {
        Ok(Self::from_sorted(&sorted_numeric_values(series)?))
    }

    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        Some(Self {
            count: sorted.len(),
            mean: mean(sorted)?,
            std: sample_std(sorted),
            min,
            q25: quantile_sorted(sorted, 0.25)?,
            median: median_sorted(sorted)?,
            q75: quantile_sorted(sorted, 0.75)?,
            max,
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// A summary row labelled with its column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    #[serde(flatten)]
    pub stats: SummaryStats,
}

/// Summaries of the given numeric columns; all-null columns are skipped.
pub fn describe(df: &DataFrame, columns: &[String]) -> PolarsResult<Vec<ColumnSummary>> {
    let mut rows = Vec::with_capacity(columns.len());
    for name in columns {
        let series = df.column(name)?.as_materialized_series();
        if let Some(stats) = SummaryStats::from_series(series)? {
            rows.push(ColumnSummary {
                column: name.clone(),
                stats,
            });
        }
    }
    Ok(rows)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn sample_std(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Pearson correlation over the rows where both values are present. `None`
/// when fewer than two pairs remain or either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_matches_describe() {
        let s = Series::new("cost".into(), &[Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)]);
        let stats = SummaryStats::from_series(&s).unwrap().unwrap();

        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.q25, 1.75);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q75, 3.25);
        assert_eq!(stats.max, 4.0);
        assert!((stats.std - 1.2909944).abs() < 1e-6);
        assert_eq!(stats.range(), 3.0);
    }

    #[test]
    fn test_summary_of_empty_column() {
        let s = Series::new_null("cost".into(), 3).cast(&DataType::Float64).unwrap();
        assert!(SummaryStats::from_series(&s).unwrap().is_none());
    }

    #[test]
    fn test_summary_serializes_with_percentile_keys() {
        let stats = SummaryStats::from_sorted(&[5.0]).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["50%"], 5.0);
        assert_eq!(json["std"], 0.0);
    }

    #[test]
    fn test_pearson() {
        let xs = [Some(1.0), Some(2.0), Some(3.0), None];
        let up = [Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        let down = [Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        let flat = [Some(1.0), Some(1.0), Some(1.0), Some(1.0)];

        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &flat), None);
        assert_eq!(pearson(&[Some(1.0)], &[Some(2.0)]), None);
    }
}
