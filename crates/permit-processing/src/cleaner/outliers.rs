//! IQR outlier filtering.
//!
//! Fitting and applying are separate steps. Bounds fitted on one table can be
//! applied to another, and applying the same bounds twice removes nothing the
//! second time. Refitting on an already filtered table may tighten the fences.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::OutlierBounds;
use crate::utils::{is_numeric_dtype, numeric_values, quantile_sorted, sorted_numeric_values};

/// Fit `[Q1 - k*IQR, Q3 + k*IQR]` on a column. `None` when it has no values.
pub fn fit_bounds(series: &Series, multiplier: f64) -> Result<Option<OutlierBounds>> {
    let sorted = sorted_numeric_values(series)?;
    let (Some(q1), Some(q3)) = (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75))
    else {
        return Ok(None);
    };
    let iqr = q3 - q1;
    Ok(Some(OutlierBounds {
        q1,
        q3,
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    }))
}

/// Removes rows whose value in any targeted column lies outside its fences.
pub struct OutlierFilter {
    multiplier: f64,
}

impl OutlierFilter {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    /// Fit bounds for each listed column that exists and is numeric.
    pub fn fit(&self, df: &DataFrame, columns: &[String]) -> Result<BTreeMap<String, OutlierBounds>> {
        let mut fitted = BTreeMap::new();
        for name in columns {
            let Ok(column) = df.column(name) else {
                debug!("Outlier column '{}' not present, skipping", name);
                continue;
            };
            if !is_numeric_dtype(column.dtype()) {
                warn!(
                    "Outlier column '{}' is {} not numeric, skipping",
                    name,
                    column.dtype()
                );
                continue;
            }
            if let Some(bounds) = fit_bounds(column.as_materialized_series(), self.multiplier)? {
                debug!(
                    "Fitted bounds for '{}': [{:.2}, {:.2}]",
                    name, bounds.lower, bounds.upper
                );
                fitted.insert(name.clone(), bounds);
            }
        }
        Ok(fitted)
    }

    /// Keep rows inside every fence. A null in a targeted column never
    /// removes the row. Returns the filtered frame and the rows removed.
    pub fn apply(
        df: &DataFrame,
        bounds: &BTreeMap<String, OutlierBounds>,
    ) -> Result<(DataFrame, usize)> {
        let mut keep = vec![true; df.height()];

        for (name, fence) in bounds {
            let Ok(column) = df.column(name) else {
                continue;
            };
            let values = numeric_values(column.as_materialized_series())?;
            for (flag, value) in keep.iter_mut().zip(values) {
                if let Some(v) = value
                    && !fence.contains(v)
                {
                    *flag = false;
                }
            }
        }

        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Ok((df.clone(), 0));
        }
        let mask = BooleanChunked::from_slice("mask".into(), &keep);
        Ok((df.filter(&mask)?, removed))
    }

    /// Fit on `df` and apply in one step.
    pub fn fit_apply(
        &self,
        df: &DataFrame,
        columns: &[String],
    ) -> Result<(DataFrame, BTreeMap<String, OutlierBounds>, usize)> {
        let bounds = self.fit(df, columns)?;
        let (filtered, removed) = Self::apply(df, &bounds)?;
        Ok((filtered, bounds, removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn costs() -> DataFrame {
        df!(
            "Estimated Cost" => &[Some(100.0), Some(200.0), Some(300.0), Some(400.0), Some(100_000.0), None],
            "Permit Type" => &["1", "2", "3", "4", "5", "6"]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_bounds_linear_quartiles() {
        let series = Series::new("c".into(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
        let bounds = fit_bounds(&series, 1.5).unwrap().unwrap();
        assert_eq!(bounds.q1, 2.0);
        assert_eq!(bounds.q3, 4.0);
        assert_eq!(bounds.lower, -1.0);
        assert_eq!(bounds.upper, 7.0);
    }

    #[test]
    fn test_fit_bounds_empty_column() {
        let series = Series::new("c".into(), &[None::<f64>, None]);
        assert!(fit_bounds(&series, 1.5).unwrap().is_none());
    }

    #[test]
    fn test_removes_exactly_rows_outside_bounds() {
        let df = costs();
        let filter = OutlierFilter::new(1.5);
        let (filtered, bounds, removed) = filter
            .fit_apply(&df, &["Estimated Cost".to_string()])
            .unwrap();

        let fence = bounds["Estimated Cost"];
        let expected: usize = df
            .column("Estimated Cost")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .filter(|v| !fence.contains(*v))
            .count();

        assert_eq!(removed, expected);
        assert_eq!(removed, 1);
        assert_eq!(filtered.height(), 5);
        // The null row survives.
        assert_eq!(filtered.column("Estimated Cost").unwrap().null_count(), 1);
    }

    #[test]
    fn test_reapplying_bounds_is_idempotent() {
        let df = costs();
        let filter = OutlierFilter::new(1.5);
        let (once, bounds, _) = filter
            .fit_apply(&df, &["Estimated Cost".to_string()])
            .unwrap();

        let (twice, removed) = OutlierFilter::apply(&once, &bounds).unwrap();
        assert_eq!(removed, 0);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_larger_multiplier_keeps_more_rows() {
        let df = df!("c" => &[1.0, 2.0, 2.0, 3.0, 4.0, 7.0]).unwrap();
        let cols = ["c".to_string()];
        let (_, _, strict) = OutlierFilter::new(1.5).fit_apply(&df, &cols).unwrap();
        let (_, _, loose) = OutlierFilter::new(3.0).fit_apply(&df, &cols).unwrap();
        assert_eq!(strict, 1);
        assert_eq!(loose, 0);
    }

    #[test]
    fn test_skips_missing_and_text_columns() {
        let df = costs();
        let bounds = OutlierFilter::new(1.5)
            .fit(&df, &["Permit Type".to_string(), "Revised Cost".to_string()])
            .unwrap();
        assert!(bounds.is_empty());
    }

    #[test]
    fn test_any_column_out_of_bounds_removes_row() {
        let df = df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 50.0, 2.0],
            "b" => &[10.0, 11.0, 12.0, 13.0, 12.0, -500.0]
        )
        .unwrap();
        let (filtered, bounds, removed) = OutlierFilter::new(1.5)
            .fit_apply(&df, &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(bounds.len(), 2);
        assert_eq!(removed, 2);
        assert_eq!(filtered.height(), 4);
    }
}
