//! Derived columns.

use polars::prelude::*;
use tracing::{debug, warn};

use crate::cleaner::dates::date_days;
use crate::config::ProcessingTimeSpec;
use crate::error::{PermitError, Result};
use crate::types::FeatureReport;

/// Adds the processing-time column: `end - start` in whole days.
pub struct FeatureDeriver {
    spec: ProcessingTimeSpec,
}

impl FeatureDeriver {
    pub fn new(spec: ProcessingTimeSpec) -> Self {
        Self { spec }
    }

    /// Add the duration column to `df`. Inputs may be text or `Date`; a row
    /// with either date missing gets null. An existing column with the same
    /// name is replaced.
    pub fn derive(&self, df: DataFrame) -> Result<(DataFrame, FeatureReport)> {
        let start = self.dates(&df, &self.spec.start)?;
        let end = self.dates(&df, &self.spec.end)?;

        let durations: Vec<Option<i64>> = start
            .iter()
            .zip(&end)
            .map(|(s, e)| match (s, e) {
                (Some(s), Some(e)) => Some(i64::from(*e) - i64::from(*s)),
                _ => None,
            })
            .collect();

        let report = FeatureReport {
            column: self.spec.name.clone(),
            derived: durations.iter().filter(|d| d.is_some()).count(),
            missing: durations.iter().filter(|d| d.is_none()).count(),
            negative: durations.iter().flatten().filter(|d| **d < 0).count(),
            skipped_reason: None,
        };
        if report.negative > 0 {
            warn!(
                "{} rows have '{}' before '{}'",
                report.negative, self.spec.end, self.spec.start
            );
        }
        debug!(
            "Derived '{}': {} values, {} missing",
            report.column, report.derived, report.missing
        );

        let mut df = df;
        df.with_column(Series::new(self.spec.name.as_str().into(), durations))?;
        Ok((df, report))
    }

    fn dates(&self, df: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
        let column = df
            .column(name)
            .map_err(|_| PermitError::ColumnNotFound(name.to_string()))?;
        date_days(column.as_materialized_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn durations(df: &DataFrame) -> Vec<Option<i64>> {
        df.column("Processing Time (days)")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_processing_time_in_days() {
        let df = df!(
            "Filed Date" => &["2017-01-03", "05/06/2015"],
            "Issued Date" => &["2017-01-10", "05/06/2015"]
        )
        .unwrap();

        let (df, report) = FeatureDeriver::new(ProcessingTimeSpec::default())
            .derive(df)
            .unwrap();

        assert_eq!(durations(&df), vec![Some(7), Some(0)]);
        assert_eq!(
            df.column("Processing Time (days)").unwrap().dtype(),
            &DataType::Int64
        );
        assert_eq!(report.derived, 2);
        assert_eq!(report.missing, 0);
    }

    #[test]
    fn test_missing_date_gives_null_not_zero() {
        let df = df!(
            "Filed Date" => &[Some("2017-01-03"), Some("2017-01-03"), None],
            "Issued Date" => &[None, Some("garbage"), Some("2017-01-10")]
        )
        .unwrap();

        let (df, report) = FeatureDeriver::new(ProcessingTimeSpec::default())
            .derive(df)
            .unwrap();

        assert_eq!(durations(&df), vec![None, None, None]);
        assert_eq!(report.missing, 3);
    }

    #[test]
    fn test_negative_durations_kept_and_counted() {
        let df = df!(
            "Filed Date" => &["2017-01-10"],
            "Issued Date" => &["2017-01-03"]
        )
        .unwrap();

        let (df, report) = FeatureDeriver::new(ProcessingTimeSpec::default())
            .derive(df)
            .unwrap();

        assert_eq!(durations(&df), vec![Some(-7)]);
        assert_eq!(report.negative, 1);
    }

    #[test]
    fn test_works_on_date_columns() {
        // Days since epoch: 17169 = 2017-01-03, 17176 = 2017-01-10.
        let df = DataFrame::new(vec![
            Series::new("Filed Date".into(), &[17169i32])
                .cast(&DataType::Date)
                .unwrap()
                .into_column(),
            Series::new("Issued Date".into(), &[17176i32])
                .cast(&DataType::Date)
                .unwrap()
                .into_column(),
        ])
        .unwrap();

        let (df, _) = FeatureDeriver::new(ProcessingTimeSpec::default())
            .derive(df)
            .unwrap();
        assert_eq!(durations(&df), vec![Some(7)]);
    }

    #[test]
    fn test_missing_column_is_column_not_found() {
        let df = df!("Filed Date" => &["2017-01-03"]).unwrap();
        let err = FeatureDeriver::new(ProcessingTimeSpec::default())
            .derive(df)
            .unwrap_err();
        assert!(matches!(err, PermitError::ColumnNotFound(ref c) if c == "Issued Date"));
        assert!(err.is_recoverable());
    }
}
