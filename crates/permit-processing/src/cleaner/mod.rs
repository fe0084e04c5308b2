//! Cleaning policy for the permits table.
//!
//! Steps, in order:
//! 1. Coerce date columns to `Date` (unparsable cells become null)
//! 2. Drop columns whose missing fraction exceeds the threshold
//! 3. Impute: median for discrete numbers, KNN for continuous numbers,
//!    a sentinel for categories; dates stay missing
//! 4. Remove rows outside the IQR fences of the outlier columns
//! 5. Drop any column still over the threshold
//!
//! `keep_columns` only shields a column from step 2, and only when step 3
//! can fill it. Step 5 applies to every column.

pub mod dates;
pub mod outliers;

pub use dates::{CoercedDates, coerce_to_date, parse_date};
pub use outliers::{OutlierFilter, fit_bounds};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::CleaningConfig;
use crate::error::Result;
use crate::imputers::{KNNImputer, StatisticalImputer};
use crate::profiler::{infer_numeric_kind, infer_semantic_type};
use crate::types::{
    ActionType, CleaningAction, CleaningReport, ImputationMethod, ImputationRecord, NumericKind,
    SemanticType,
};
use crate::utils::{is_numeric_dtype, is_temporal_dtype, missing_fraction};

/// Applies a [`CleaningConfig`] to a table.
pub struct DataCleaner {
    config: CleaningConfig,
}

impl DataCleaner {
    pub fn new(config: CleaningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Run every cleaning step on a working copy of `df`.
    pub fn clean(&self, df: DataFrame) -> Result<(DataFrame, CleaningReport)> {
        let mut report = CleaningReport {
            rows_before: df.height(),
            columns_before: df.width(),
            ..Default::default()
        };
        let mut df = df;

        info!("Cleaning {} rows x {} columns", df.height(), df.width());

        if self.config.remove_duplicates {
            df = self.remove_duplicates(df, &mut report)?;
        }
        self.coerce_dates(&mut df, &mut report)?;
        df = self.drop_sparse_columns(df, &mut report, true, "missing fraction above threshold");
        self.impute(&mut df, &mut report)?;
        df = self.filter_outliers(df, &mut report)?;
        df = self.drop_sparse_columns(df, &mut report, false, "missing fraction above threshold after cleaning");

        report.rows_after = df.height();
        report.columns_after = df.width();
        info!(
            "Cleaning done: {} -> {} rows, {} -> {} columns",
            report.rows_before, report.rows_after, report.columns_before, report.columns_after
        );

        Ok((df, report))
    }

    fn remove_duplicates(&self, df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        if df.width() == 0 {
            return Ok(df);
        }
        let before = df.height();
        let df = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
        let removed = before - df.height();
        if removed > 0 {
            debug!("Removed {} duplicate rows", removed);
            report.add_action(CleaningAction::new(
                ActionType::DuplicatesRemoved,
                "dataset",
                format!("Removed {} duplicate rows", removed),
            ));
        }
        report.duplicates_removed = removed;
        Ok(df)
    }

    /// Columns to coerce: configured ones present in the table, plus text
    /// columns that look like dates when auto-detection is on.
    fn date_targets(&self, df: &DataFrame) -> Result<Vec<String>> {
        let mut targets: Vec<String> = self
            .config
            .date_columns
            .iter()
            .filter(|name| df.column(name).is_ok())
            .cloned()
            .collect();

        if self.config.auto_detect_dates {
            for column in df.get_columns() {
                let name = column.name().to_string();
                if targets.contains(&name) || column.dtype() != &DataType::String {
                    continue;
                }
                if infer_semantic_type(column.as_materialized_series())? == SemanticType::Date {
                    debug!("Detected date column '{}'", name);
                    targets.push(name);
                }
            }
        }
        Ok(targets)
    }

    fn coerce_dates(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        for name in self.date_targets(df)? {
            let column = df.column(&name)?;
            if column.dtype() == &DataType::Date {
                continue;
            }
            let coerced = coerce_to_date(column.as_materialized_series())?;
            if coerced.failures > 0 {
                warn!(
                    "{} values in '{}' could not be parsed as dates and were set to null",
                    coerced.failures, name
                );
            }
            df.replace(&name, coerced.series)?;
            report.date_parse_failures.insert(name.clone(), coerced.failures);
            report.add_action(CleaningAction::new(
                ActionType::TypeCorrected,
                &name,
                format!("Converted to date ({} unparsable values)", coerced.failures),
            ));
        }
        Ok(())
    }

    fn drop_sparse_columns(
        &self,
        df: DataFrame,
        report: &mut CleaningReport,
        protect_kept: bool,
        reason: &str,
    ) -> DataFrame {
        let to_drop: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|c| missing_fraction(c) > self.config.drop_threshold)
            .filter(|c| !(protect_kept && self.is_protected(c)))
            .map(|c| c.name().to_string())
            .collect();

        if to_drop.is_empty() {
            return df;
        }

        for name in &to_drop {
            debug!("Dropping '{}': {}", name, reason);
            report.add_action(CleaningAction::new(ActionType::ColumnRemoved, name, reason));
        }
        info!(
            "Dropped {} columns with more than {:.0}% missing",
            to_drop.len(),
            self.config.drop_threshold * 100.0
        );
        report.dropped_columns.extend(to_drop.iter().cloned());

        let names: Vec<PlSmallStr> = to_drop.iter().map(|s| s.as_str().into()).collect();
        df.drop_many(names)
    }

    /// Kept columns survive the first pass only if imputation will fill them.
    fn is_protected(&self, column: &Column) -> bool {
        let name = column.name().as_str();
        if !self.config.keep_columns.iter().any(|k| k == name) {
            return false;
        }
        if is_temporal_dtype(column.dtype()) {
            warn!("'{}' is kept but dates are not imputed; dropping it", name);
            return false;
        }
        true
    }

    fn impute(&self, df: &mut DataFrame, report: &mut CleaningReport) -> Result<()> {
        let mut knn_columns = Vec::new();
        let gaps: Vec<(String, DataType)> = df
            .get_columns()
            .iter()
            .filter(|c| c.null_count() > 0)
            .map(|c| (c.name().to_string(), c.dtype().clone()))
            .collect();

        for (name, dtype) in gaps {
            if is_temporal_dtype(&dtype) {
                let missing = df.column(&name)?.null_count();
                report.imputations.push(ImputationRecord {
                    column: name,
                    method: ImputationMethod::LeftMissing,
                    filled: 0,
                });
                debug!("Leaving {} missing dates as null", missing);
                continue;
            }

            if is_numeric_dtype(&dtype) {
                match self.numeric_kind(df, &name)? {
                    NumericKind::Discrete => self.impute_median(df, &name, report)?,
                    NumericKind::Continuous => knn_columns.push(name),
                }
                continue;
            }

            let outcome =
                StatisticalImputer::apply_constant(df, &name, &self.config.categorical_sentinel)?;
            report.imputations.push(ImputationRecord {
                column: name.clone(),
                method: ImputationMethod::Sentinel,
                filled: outcome.filled,
            });
            report.add_action(CleaningAction::new(
                ActionType::ValueImputed,
                &name,
                format!("Filled {} values with '{}'", outcome.filled, outcome.value),
            ));
        }

        if !knn_columns.is_empty() {
            info!("KNN imputing {} columns", knn_columns.len());
            let imputer = KNNImputer::new(self.config.knn_neighbors)
                .with_max_donors(self.config.knn_max_donors);
            let (imputed, filled) = imputer.fit_transform(df, &knn_columns)?;
            *df = imputed;
            for (name, count) in filled {
                report.add_action(CleaningAction::new(
                    ActionType::ValueImputed,
                    &name,
                    format!(
                        "Filled {} values by KNN ({} neighbours)",
                        count, self.config.knn_neighbors
                    ),
                ));
                report.imputations.push(ImputationRecord {
                    column: name,
                    method: ImputationMethod::Knn,
                    filled: count,
                });
            }
        }

        Ok(())
    }

    fn numeric_kind(&self, df: &DataFrame, name: &str) -> Result<NumericKind> {
        if self.config.median_columns.iter().any(|c| c == name) {
            return Ok(NumericKind::Discrete);
        }
        if self.config.knn_columns.iter().any(|c| c == name) {
            return Ok(NumericKind::Continuous);
        }
        let series = df.column(name)?.as_materialized_series();
        let distinct = series.drop_nulls().n_unique()?;
        infer_numeric_kind(series, distinct, self.config.discrete_max_unique)
    }

    fn impute_median(&self, df: &mut DataFrame, name: &str, report: &mut CleaningReport) -> Result<()> {
        match StatisticalImputer::apply_numeric_median(df, name) {
            Ok(outcome) => {
                report.imputations.push(ImputationRecord {
                    column: name.to_string(),
                    method: ImputationMethod::Median,
                    filled: outcome.filled,
                });
                report.add_action(CleaningAction::new(
                    ActionType::ValueImputed,
                    name,
                    format!("Filled {} values with median {}", outcome.filled, outcome.value),
                ));
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!("Skipping median imputation of '{}': {}", name, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn filter_outliers(&self, df: DataFrame, report: &mut CleaningReport) -> Result<DataFrame> {
        let filter = OutlierFilter::new(self.config.iqr_multiplier);
        let (df, bounds, removed) = filter.fit_apply(&df, &self.config.outlier_columns)?;

        for (name, fence) in &bounds {
            report.add_action(CleaningAction::new(
                ActionType::OutlierHandled,
                name,
                format!(
                    "IQR fences [{:.2}, {:.2}] (k = {})",
                    fence.lower, fence.upper, self.config.iqr_multiplier
                ),
            ));
        }
        if removed > 0 {
            info!("Removed {} outlier rows", removed);
            report.add_action(CleaningAction::new(
                ActionType::RowsRemoved,
                "dataset",
                format!("Removed {} rows outside IQR fences", removed),
            ));
        }

        report.outlier_bounds = bounds;
        report.outlier_rows_removed = removed;
        Ok(df)
    }
}
