use polars::prelude::*;
use rand::prelude::*;
use tracing::debug;

use crate::error::{PermitError, Result};
use crate::utils::is_numeric_dtype;

/// Fills gaps in continuous columns from the nearest complete rows.
///
/// Distances are taken over the other numeric columns, each rescaled to
/// `[0, 1]` so costs measured in dollars do not swamp story counts. The fill
/// is the inverse-distance weighted mean of the `k` nearest donors.
pub struct KNNImputer {
    n_neighbors: usize,
    max_donors: usize,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            max_donors: usize::MAX,
        }
    }

    /// Cap the donor rows scanned per column. Donors beyond the cap are
    /// dropped by a seeded shuffle, so runs are repeatable.
    pub fn with_max_donors(mut self, max_donors: usize) -> Self {
        self.max_donors = max_donors.max(1);
        self
    }

    /// Impute every listed numeric column that has gaps. Returns the new
    /// frame and the number of cells filled per column.
    pub fn fit_transform(
        &self,
        df: &DataFrame,
        columns: &[String],
    ) -> Result<(DataFrame, Vec<(String, usize)>)> {
        let mut result_df = df.clone();
        let mut filled = Vec::new();

        let to_impute: Vec<&String> = columns
            .iter()
            .filter(|col| {
                df.column(col)
                    .map(|c| c.null_count() > 0 && is_numeric_dtype(c.dtype()))
                    .unwrap_or(false)
            })
            .collect();

        if to_impute.is_empty() {
            return Ok((result_df, filled));
        }

        let numeric_cols: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .collect();

        // Features come from the input frame so imputation order does not
        // change the result.
        let matrix = create_scaled_matrix(df, &numeric_cols)?;

        for col_name in to_impute {
            let col_idx = numeric_cols
                .iter()
                .position(|c| c == col_name)
                .ok_or_else(|| PermitError::ColumnNotFound(col_name.clone()))?;

            let (series, count) = self.impute_column(df, &matrix, col_name, col_idx)?;
            debug!("KNN imputed {} values in '{}'", count, col_name);
            result_df.replace(col_name, series)?;
            filled.push((col_name.clone(), count));
        }

        Ok((result_df, filled))
    }

    fn impute_column(
        &self,
        df: &DataFrame,
        matrix: &[Vec<Option<f64>>],
        col_name: &str,
        col_idx: usize,
    ) -> Result<(Series, usize)> {
        let original = df
            .column(col_name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = original.f64()?.into_iter().collect();

        let donors = self.select_donors(&values);
        let fallback = mean_of(donors.iter().filter_map(|&row| values[row]));

        let mut count = 0;
        let imputed: Vec<Option<f64>> = values
            .iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) => Some(*v),
                None => {
                    count += 1;
                    Some(
                        self.impute_value(matrix, &values, &donors, row, col_idx)
                            .unwrap_or(fallback),
                    )
                }
            })
            .collect();

        Ok((Series::new(col_name.into(), imputed), count))
    }

    /// Rows with a value in the target column, capped at `max_donors`.
    fn select_donors(&self, values: &[Option<f64>]) -> Vec<usize> {
        let mut donors: Vec<usize> = values
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.map(|_| row))
            .collect();
        if donors.len() > self.max_donors {
            let mut rng = StdRng::seed_from_u64(42);
            donors.shuffle(&mut rng);
            donors.truncate(self.max_donors);
            donors.sort_unstable();
        }
        donors
    }

    /// Weighted mean of the nearest donors, `None` when no donor shares a
    /// feature with the target row.
    fn impute_value(
        &self,
        matrix: &[Vec<Option<f64>>],
        values: &[Option<f64>],
        donors: &[usize],
        target_row: usize,
        target_col: usize,
    ) -> Option<f64> {
        let mut distances: Vec<(usize, f64)> = donors
            .iter()
            .map(|&donor| {
                (
                    donor,
                    calculate_distance(&matrix[target_row], &matrix[donor], target_col),
                )
            })
            .filter(|(_, d)| d.is_finite())
            .collect();

        if distances.is_empty() {
            return None;
        }

        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for &(donor, distance) in distances.iter().take(self.n_neighbors) {
            if let Some(value) = values[donor] {
                let weight = if distance < 1e-10 {
                    1e10
                } else {
                    1.0 / distance
                };
                weighted_sum += value * weight;
                weight_sum += weight;
            }
        }

        (weight_sum > 0.0).then(|| weighted_sum / weight_sum)
    }
}

/// Numeric columns as rows of `[0, 1]`-scaled values.
fn create_scaled_matrix(df: &DataFrame, columns: &[String]) -> Result<Vec<Vec<Option<f64>>>> {
    let n_rows = df.height();
    let mut matrix = vec![vec![None; columns.len()]; n_rows];

    for (col_idx, col_name) in columns.iter().enumerate() {
        let float_series = df
            .column(col_name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let values = float_series.f64()?;

        let (min, max) = values
            .into_iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        for (row_idx, row) in matrix.iter_mut().enumerate() {
            row[col_idx] = values.get(row_idx).map(|v| {
                if range > 0.0 && range.is_finite() {
                    (v - min) / range
                } else {
                    0.0
                }
            });
        }
    }

    Ok(matrix)
}

/// Root-mean-square difference over the features both rows have, skipping
/// the target column.
fn calculate_distance(row1: &[Option<f64>], row2: &[Option<f64>], skip_col: usize) -> f64 {
    let mut sum_squared_diff = 0.0;
    let mut count = 0;

    for (col_idx, (a, b)) in row1.iter().zip(row2).enumerate() {
        if col_idx == skip_col {
            continue;
        }
        if let (Some(val1), Some(val2)) = (a, b) {
            let diff = val1 - val2;
            sum_squared_diff += diff * diff;
            count += 1;
        }
    }

    if count > 0 {
        (sum_squared_diff / count as f64).sqrt()
    } else {
        f64::INFINITY
    }
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 { sum / count as f64 } else { 0.0 }
}
