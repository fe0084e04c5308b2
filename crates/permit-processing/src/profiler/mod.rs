//! Data profiling for a loaded permits table.
//!
//! Produces a [`DatasetProfile`]: per-column missing fraction, distinct-value
//! count and semantic type, plus dataset-level duplicate counts. The report
//! guides manual decisions; the cleaner re-derives what it needs from the same
//! functions.

mod statistics;
mod type_inference;

use polars::prelude::*;
use rand::prelude::*;
use tracing::debug;

use crate::config::{CleaningConfig, DEFAULT_IQR_MULTIPLIER};
use crate::error::{Result, ResultExt};
use crate::schema::KEY_COLUMNS;
use crate::types::{ColumnProfile, DatasetProfile, KeyDuplicates, SemanticType};
use crate::utils::{format_any_value, missing_fraction};

pub(crate) use type_inference::{infer_numeric_kind, infer_semantic_type};

/// Sample values kept per column.
const SAMPLE_SIZE: usize = 10;

/// Data profiler for analyzing dataset structure and characteristics.
#[derive(Debug, Clone)]
pub struct DataProfiler {
    discrete_max_unique: usize,
    iqr_multiplier: f64,
}

impl Default for DataProfiler {
    fn default() -> Self {
        Self {
            discrete_max_unique: 100,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
        }
    }
}

impl DataProfiler {
    pub fn from_config(config: &CleaningConfig) -> Self {
        Self {
            discrete_max_unique: config.discrete_max_unique,
            iqr_multiplier: config.iqr_multiplier,
        }
    }

    /// Profile an entire dataset.
    pub fn profile_dataset(&self, df: &DataFrame) -> Result<DatasetProfile> {
        let column_profiles = df
            .get_columns()
            .iter()
            .map(|col| self.profile_column(col))
            .collect::<Result<Vec<_>>>()?;

        let duplicate_count = count_duplicate_rows(df)?;
        let duplicate_percentage = percentage(duplicate_count, df.height());

        let key_duplicates = KEY_COLUMNS
            .iter()
            .filter_map(|key| df.column(key).ok())
            .map(|col| {
                let duplicate_rows = col.len() - col.n_unique()?;
                Ok(KeyDuplicates {
                    column: col.name().to_string(),
                    duplicate_rows,
                    duplicate_percentage: percentage(duplicate_rows, col.len()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total_missing = column_profiles.iter().map(|c| c.null_count).sum();

        Ok(DatasetProfile {
            shape: (df.height(), df.width()),
            column_profiles,
            total_missing,
            duplicate_count,
            duplicate_percentage,
            key_duplicates,
            estimated_size_bytes: df.estimated_size(),
        })
    }

    pub fn profile_column(&self, col: &Column) -> Result<ColumnProfile> {
        let name = col.name().to_string();
        let series = col.as_materialized_series();
        let null_count = series.null_count();

        let non_null = series.drop_nulls();
        let distinct_count = non_null
            .n_unique()
            .context(format!("Counting distinct values of '{}'", name))?;
        let sample_values = sample_values(&non_null);

        let semantic_type = infer_semantic_type(series)?;
        let numeric_kind = match semantic_type {
            SemanticType::Numeric => Some(infer_numeric_kind(
                series,
                distinct_count,
                self.discrete_max_unique,
            )?),
            _ => None,
        };

        let characteristics = statistics::extract_column_characteristics(
            series,
            semantic_type,
            distinct_count,
            self.iqr_multiplier,
        )?;

        debug!(
            "Profiled '{}': {} ({:?}), {} distinct, {} missing",
            name,
            semantic_type.as_str(),
            numeric_kind,
            distinct_count,
            null_count
        );

        Ok(ColumnProfile {
            name,
            dtype: format!("{}", series.dtype()),
            null_count,
            missing_fraction: missing_fraction(col),
            distinct_count,
            semantic_type,
            numeric_kind,
            sample_values,
            characteristics,
        })
    }
}

/// Rows identical to an earlier row in every column.
pub fn count_duplicate_rows(df: &DataFrame) -> Result<usize> {
    if df.width() == 0 {
        return Ok(0);
    }
    let unique = df.unique::<&str, &str>(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - unique.height())
}

/// Up to [`SAMPLE_SIZE`] values picked with a fixed seed.
fn sample_values(non_null: &Series) -> Vec<String> {
    if non_null.is_empty() {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(42);
    let indices: Vec<usize> = (0..non_null.len()).collect();
    indices
        .choose_multiple(&mut rng, SAMPLE_SIZE.min(non_null.len()))
        .filter_map(|&idx| non_null.get(idx).ok())
        .map(|val| format_any_value(&val))
        .collect()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumericKind;
    use pretty_assertions::assert_eq;

    fn permits() -> DataFrame {
        df!(
            "Permit Number" => &["P1", "P2", "P2", "P3"],
            "Record ID" => &[Some(10i64), Some(11), Some(11), None],
            "Existing Units" => &[Some(1i64), None, None, Some(2)],
            "Estimated Cost" => &[Some(1500.5f64), Some(20.25), Some(20.25), None],
            "Current Status" => &[Some("issued"), Some("filed"), Some("filed"), None],
            "Filed Date" => &["05/06/2015", "04/19/2015", "04/19/2015", "11/09/2015"]
        )
        .unwrap()
    }

    #[test]
    fn test_profile_shape_and_missing() {
        let profile = DataProfiler::default().profile_dataset(&permits()).unwrap();

        assert_eq!(profile.shape, (4, 6));
        assert_eq!(profile.total_missing, 5);

        let units = profile.column("Existing Units").unwrap();
        assert_eq!(units.null_count, 2);
        assert!((units.missing_fraction - 0.5).abs() < 1e-9);
        assert_eq!(units.distinct_count, 2);
    }

    #[test]
    fn test_profile_semantic_types() {
        let profile = DataProfiler::default().profile_dataset(&permits()).unwrap();

        let kinds: Vec<(&str, SemanticType, Option<NumericKind>)> = profile
            .column_profiles
            .iter()
            .map(|c| (c.name.as_str(), c.semantic_type, c.numeric_kind))
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("Permit Number", SemanticType::Categorical, None),
                ("Record ID", SemanticType::Numeric, Some(NumericKind::Discrete)),
                ("Existing Units", SemanticType::Numeric, Some(NumericKind::Discrete)),
                ("Estimated Cost", SemanticType::Numeric, Some(NumericKind::Continuous)),
                ("Current Status", SemanticType::Categorical, None),
                ("Filed Date", SemanticType::Date, None),
            ]
        );
    }

    #[test]
    fn test_profile_duplicates() {
        let profile = DataProfiler::default().profile_dataset(&permits()).unwrap();

        assert_eq!(profile.duplicate_count, 1);
        assert!((profile.duplicate_percentage - 25.0).abs() < 1e-9);
        assert_eq!(
            profile.key_duplicates,
            vec![
                KeyDuplicates {
                    column: "Permit Number".to_string(),
                    duplicate_rows: 1,
                    duplicate_percentage: 25.0,
                },
                KeyDuplicates {
                    column: "Record ID".to_string(),
                    duplicate_rows: 1,
                    duplicate_percentage: 25.0,
                },
            ]
        );
    }

    #[test]
    fn test_discrete_threshold_comes_from_config() {
        let config = CleaningConfig::builder().discrete_max_unique(1).build().unwrap();
        let profile = DataProfiler::from_config(&config)
            .profile_dataset(&permits())
            .unwrap();
        assert_eq!(
            profile.column("Existing Units").unwrap().numeric_kind,
            Some(NumericKind::Continuous)
        );
    }

    #[test]
    fn test_samples_are_deterministic() {
        let df = permits();
        let a = DataProfiler::default().profile_dataset(&df).unwrap();
        let b = DataProfiler::default().profile_dataset(&df).unwrap();
        assert_eq!(
            a.column("Current Status").unwrap().sample_values,
            b.column("Current Status").unwrap().sample_values
        );
        assert_eq!(a.column("Current Status").unwrap().sample_values.len(), 3);
    }

    #[test]
    fn test_empty_frame() {
        let profile = DataProfiler::default()
            .profile_dataset(&DataFrame::empty())
            .unwrap();
        assert_eq!(profile.shape, (0, 0));
        assert_eq!(profile.duplicate_count, 0);
    }
}
