//! Date coercion for the permit lifecycle columns.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::{PermitError, Result};
use crate::utils::{is_numeric_dtype, is_temporal_dtype};

const DATE_FORMATS: [&str; 6] = [
    "%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y", "%d-%b-%Y", "%Y%m%d",
];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parse one cell. Datetimes keep only their calendar date.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

/// Outcome of coercing one column.
#[derive(Debug)]
pub struct CoercedDates {
    pub series: Series,
    /// Non-null input cells that could not be parsed.
    pub failures: usize,
}

/// Convert a column to the `Date` dtype.
///
/// `Date` input is returned unchanged and `Datetime` input is truncated, so
/// coercing twice gives the same column. Text that does not parse becomes
/// null and is counted in [`CoercedDates::failures`].
pub fn coerce_to_date(series: &Series) -> Result<CoercedDates> {
    match series.dtype() {
        DataType::Date => {
            return Ok(CoercedDates {
                series: series.clone(),
                failures: 0,
            });
        }
        dtype if is_temporal_dtype(dtype) => {
            return Ok(CoercedDates {
                series: series.cast(&DataType::Date)?,
                failures: 0,
            });
        }
        _ => {}
    }

    let text = match series.dtype() {
        DataType::String => series.clone(),
        DataType::Null => series.cast(&DataType::String)?,
        dtype if is_numeric_dtype(dtype) => series.cast(&DataType::String)?,
        dtype => {
            return Err(PermitError::TypeConversionFailed {
                column: series.name().to_string(),
                target_type: "date".to_string(),
                reason: format!("cannot read dates from {}", dtype),
            });
        }
    };

    let mut failures = 0;
    let days: Vec<Option<i32>> = text
        .str()?
        .into_iter()
        .map(|opt| {
            opt.and_then(|raw| {
                let parsed = parse_date(raw).map(days_since_epoch);
                if parsed.is_none() {
                    failures += 1;
                }
                parsed
            })
        })
        .collect();

    let series = Series::new(series.name().clone(), days).cast(&DataType::Date)?;
    Ok(CoercedDates { series, failures })
}

/// Calendar dates of a `Date` series as day numbers since 1970-01-01.
pub fn date_days(series: &Series) -> Result<Vec<Option<i32>>> {
    let coerced = coerce_to_date(series)?;
    let physical = coerced.series.cast(&DataType::Int32)?;
    Ok(physical.i32()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_coerce_rejects_non_text_columns() {
        let flags = Series::new("Fire Only Permit".into(), [Some(true), None, Some(false)]);
        let err = coerce_to_date(&flags).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
        assert!(err.to_string().contains("Fire Only Permit"));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("01/03/2017"), Some(ymd(2017, 1, 3)));
        assert_eq!(parse_date("2017-01-10"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date("2017/01/10"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date("01-10-2017"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date("10-Jan-2017"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date("2017-01-10T13:45:00"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date("01/10/2017 01:45:00 PM"), Some(ymd(2017, 1, 10)));
        assert_eq!(parse_date(" 2017-01-10 "), Some(ymd(2017, 1, 10)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date("N/A"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("13/45/2017"), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_coerce_text_column() {
        let series = Series::new(
            "Filed Date".into(),
            &[Some("01/03/2017"), Some("N/A"), None, Some("2017-01-10")],
        );
        let coerced = coerce_to_date(&series).unwrap();

        assert_eq!(coerced.series.dtype(), &DataType::Date);
        assert_eq!(coerced.series.null_count(), 2);
        assert_eq!(coerced.failures, 1);
        assert_eq!(coerced.series.name().as_str(), "Filed Date");
    }

    #[test]
    fn test_coerce_is_idempotent() {
        let series = Series::new("Issued Date".into(), &[Some("01/10/2017"), Some("bad"), None]);
        let once = coerce_to_date(&series).unwrap().series;
        let twice = coerce_to_date(&once).unwrap();

        assert_eq!(twice.failures, 0);
        assert!(once.equals_missing(&twice.series));
    }

    #[test]
    fn test_coerce_datetime_truncates() {
        let ms = Series::new("ts".into(), &[86_400_000i64 + 3_600_000])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let days = date_days(&ms).unwrap();
        assert_eq!(days, vec![Some(1)]);
    }

    #[test]
    fn test_coerce_numeric_yyyymmdd() {
        let series = Series::new("Completed Date".into(), &[Some(20170103i64), None, Some(7)]);
        let coerced = coerce_to_date(&series).unwrap();
        assert_eq!(coerced.failures, 1);
        assert_eq!(
            date_days(&coerced.series).unwrap()[0],
            Some(days_since_epoch(ymd(2017, 1, 3)))
        );
    }

    #[test]
    fn test_all_null_column() {
        let series = Series::new("Completed Date".into(), &[None::<&str>, None]);
        let coerced = coerce_to_date(&series).unwrap();
        assert_eq!(coerced.series.dtype(), &DataType::Date);
        assert_eq!(coerced.failures, 0);
        assert_eq!(coerced.series.null_count(), 2);
    }
}
