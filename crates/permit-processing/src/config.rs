//! Configuration types for the permit cleaning pipeline.
//!
//! All thresholds the cleaner applies live here rather than in code. A config
//! can be built fluently with [`CleaningConfig::builder()`] or deserialized
//! from JSON, where every field is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PermitError, Result};
use crate::schema;

/// Default drop threshold: columns missing more than half their values go.
pub const DEFAULT_DROP_THRESHOLD: f64 = 0.5;
/// Default Tukey fence multiplier.
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
/// Default literal used to fill categorical gaps.
pub const DEFAULT_SENTINEL: &str = "Unknown";

/// Options for reading the raw file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Cell values read as missing (compared after trimming).
    pub null_markers: Vec<String>,

    /// Emit a warning for text columns holding a mix of numbers and text.
    pub warn_mixed_types: bool,

    /// Field delimiter for delimited input.
    pub separator: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            null_markers: [
                "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            warn_mixed_types: true,
            separator: b',',
        }
    }
}

/// Definition of the derived duration column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingTimeSpec {
    /// Name of the new column.
    pub name: String,
    /// Column holding the earlier date.
    pub start: String,
    /// Column holding the later date.
    pub end: String,
}

impl Default for ProcessingTimeSpec {
    fn default() -> Self {
        Self {
            name: "Processing Time (days)".to_string(),
            start: "Filed Date".to_string(),
            end: "Issued Date".to_string(),
        }
    }
}

/// Cleaning policy.
///
/// # Example
///
/// ```rust,ignore
/// use permit_processing::config::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .drop_threshold(0.4)
///     .iqr_multiplier(3.0)
///     .outlier_column("Estimated Cost")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Columns whose missing fraction is strictly above this are dropped.
    /// Default: 0.5
    pub drop_threshold: f64,

    /// Multiplier `k` for the `[Q1 - k*IQR, Q3 + k*IQR]` fences.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Neighbours consulted by the KNN imputer.
    /// Default: 5
    pub knn_neighbors: usize,

    /// Upper bound on donor rows the KNN imputer scans per column.
    /// Default: 5000
    pub knn_max_donors: usize,

    /// Integral numeric columns with at most this many distinct values are
    /// treated as discrete and median-imputed.
    /// Default: 100
    pub discrete_max_unique: usize,

    /// Literal written into missing categorical cells.
    /// Default: "Unknown"
    pub categorical_sentinel: String,

    /// Numeric columns always imputed with the median.
    pub median_columns: Vec<String>,

    /// Numeric columns always imputed with KNN.
    pub knn_columns: Vec<String>,

    /// Columns spared from the first sparse-column drop when imputation
    /// can fill them. Dates are never spared.
    pub keep_columns: Vec<String>,

    /// Columns coerced to dates.
    pub date_columns: Vec<String>,

    /// Also coerce text columns the profiler recognises as dates.
    /// Default: false
    pub auto_detect_dates: bool,

    /// Columns whose outliers are filtered out.
    pub outlier_columns: Vec<String>,

    /// Remove complete duplicate rows before anything else.
    /// Default: false
    pub remove_duplicates: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            knn_neighbors: 5,
            knn_max_donors: 5000,
            discrete_max_unique: 100,
            categorical_sentinel: DEFAULT_SENTINEL.to_string(),
            median_columns: Vec::new(),
            knn_columns: Vec::new(),
            keep_columns: Vec::new(),
            date_columns: schema::DEFAULT_DATE_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            auto_detect_dates: false,
            outlier_columns: schema::DEFAULT_OUTLIER_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            remove_duplicates: false,
        }
    }
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if !(0.0..=1.0).contains(&self.drop_threshold) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "drop_threshold".to_string(),
                value: self.drop_threshold,
            });
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        if self.knn_neighbors == 0 {
            return Err(ConfigValidationError::InvalidKnnNeighbors(
                self.knn_neighbors,
            ));
        }

        if self.knn_max_donors == 0 {
            return Err(ConfigValidationError::InvalidDonorCap);
        }

        if let Some(column) = self
            .median_columns
            .iter()
            .find(|c| self.knn_columns.contains(c))
        {
            return Err(ConfigValidationError::ConflictingImputation(column.clone()));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid IQR multiplier: {0} (must be a non-negative number)")]
    InvalidMultiplier(f64),

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("KNN donor cap must be at least 1")]
    InvalidDonorCap,

    #[error("Column '{0}' is listed for both median and KNN imputation")]
    ConflictingImputation(String),
}

impl From<ConfigValidationError> for PermitError {
    fn from(err: ConfigValidationError) -> Self {
        PermitError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    drop_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    knn_neighbors: Option<usize>,
    knn_max_donors: Option<usize>,
    discrete_max_unique: Option<usize>,
    categorical_sentinel: Option<String>,
    median_columns: Vec<String>,
    knn_columns: Vec<String>,
    keep_columns: Vec<String>,
    date_columns: Option<Vec<String>>,
    auto_detect_dates: Option<bool>,
    outlier_columns: Option<Vec<String>>,
    remove_duplicates: Option<bool>,
}

impl CleaningConfigBuilder {
    /// Set the missing-fraction threshold above which a column is dropped.
    ///
    /// # Arguments
    /// * `threshold` - Value between 0.0 and 1.0 (e.g., 0.5 = 50%)
    pub fn drop_threshold(mut self, threshold: f64) -> Self {
        self.drop_threshold = Some(threshold);
        self
    }

    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, k: f64) -> Self {
        self.iqr_multiplier = Some(k);
        self
    }

    /// Set the number of neighbors for KNN imputation.
    pub fn knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = Some(k);
        self
    }

    pub fn knn_max_donors(mut self, cap: usize) -> Self {
        self.knn_max_donors = Some(cap);
        self
    }

    pub fn discrete_max_unique(mut self, n: usize) -> Self {
        self.discrete_max_unique = Some(n);
        self
    }

    /// Set the literal used to fill missing categorical values.
    pub fn categorical_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.categorical_sentinel = Some(sentinel.into());
        self
    }

    pub fn median_column(mut self, column: impl Into<String>) -> Self {
        self.median_columns.push(column.into());
        self
    }

    pub fn knn_column(mut self, column: impl Into<String>) -> Self {
        self.knn_columns.push(column.into());
        self
    }

    pub fn keep_column(mut self, column: impl Into<String>) -> Self {
        self.keep_columns.push(column.into());
        self
    }

    /// Replace the default date columns.
    pub fn date_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn auto_detect_dates(mut self, enable: bool) -> Self {
        self.auto_detect_dates = Some(enable);
        self
    }

    /// Replace the default outlier columns.
    pub fn outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add one outlier column on top of those already set.
    pub fn outlier_column(mut self, column: impl Into<String>) -> Self {
        self.outlier_columns
            .get_or_insert_with(Vec::new)
            .push(column.into());
        self
    }

    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<CleaningConfig, ConfigValidationError> {
        let defaults = CleaningConfig::default();
        let config = CleaningConfig {
            drop_threshold: self.drop_threshold.unwrap_or(defaults.drop_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            knn_neighbors: self.knn_neighbors.unwrap_or(defaults.knn_neighbors),
            knn_max_donors: self.knn_max_donors.unwrap_or(defaults.knn_max_donors),
            discrete_max_unique: self
                .discrete_max_unique
                .unwrap_or(defaults.discrete_max_unique),
            categorical_sentinel: self
                .categorical_sentinel
                .unwrap_or(defaults.categorical_sentinel),
            median_columns: self.median_columns,
            knn_columns: self.knn_columns,
            keep_columns: self.keep_columns,
            date_columns: self.date_columns.unwrap_or(defaults.date_columns),
            auto_detect_dates: self.auto_detect_dates.unwrap_or(defaults.auto_detect_dates),
            outlier_columns: self.outlier_columns.unwrap_or(defaults.outlier_columns),
            remove_duplicates: self.remove_duplicates.unwrap_or(defaults.remove_duplicates),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Full pipeline configuration: how to read, clean, derive and report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub load: LoadOptions,
    pub cleaning: CleaningConfig,

    /// Derived duration column. `None` (`null` in JSON) disables feature
    /// derivation.
    pub processing_time: Option<ProcessingTimeSpec>,

    /// Write a JSON run report next to the cleaned artifact.
    pub emit_report: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            load: LoadOptions::default(),
            cleaning: CleaningConfig::default(),
            processing_time: Some(ProcessingTimeSpec::default()),
            emit_report: false,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PermitError::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.cleaning.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = CleaningConfig::default();
        assert_eq!(config.drop_threshold, 0.5);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.knn_neighbors, 5);
        assert_eq!(config.categorical_sentinel, "Unknown");
        assert!(config.date_columns.contains(&"Filed Date".to_string()));
        assert!(config.outlier_columns.contains(&"Estimated Cost".to_string()));
        assert!(!config.remove_duplicates);
    }

    #[test]
    fn test_builder_defaults() {
        let config = CleaningConfig::builder().build().unwrap();
        assert_eq!(config, CleaningConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = CleaningConfig::builder()
            .drop_threshold(0.3)
            .iqr_multiplier(3.0)
            .knn_neighbors(10)
            .categorical_sentinel("Missing")
            .outlier_columns(["Revised Cost"])
            .date_columns(Vec::<String>::new())
            .median_column("Number of Existing Stories")
            .build()
            .unwrap();

        assert_eq!(config.drop_threshold, 0.3);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.knn_neighbors, 10);
        assert_eq!(config.categorical_sentinel, "Missing");
        assert_eq!(config.outlier_columns, vec!["Revised Cost".to_string()]);
        assert!(config.date_columns.is_empty());
        assert_eq!(
            config.median_columns,
            vec!["Number of Existing Stories".to_string()]
        );
    }

    #[test]
    fn test_outlier_column_replaces_defaults() {
        let config = CleaningConfig::builder()
            .outlier_column("Existing Units")
            .build()
            .unwrap();
        assert_eq!(config.outlier_columns, vec!["Existing Units".to_string()]);
    }

    #[test]
    fn test_validation_invalid_threshold() {
        let result = CleaningConfig::builder().drop_threshold(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_multiplier() {
        let result = CleaningConfig::builder().iqr_multiplier(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidMultiplier(_)
        ));
    }

    #[test]
    fn test_validation_invalid_knn_neighbors() {
        let result = CleaningConfig::builder().knn_neighbors(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidKnnNeighbors(0)
        ));
    }

    #[test]
    fn test_validation_conflicting_imputation() {
        let result = CleaningConfig::builder()
            .median_column("Existing Units")
            .knn_column("Existing Units")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::ConflictingImputation(c) if c == "Existing Units"
        ));
    }

    #[test]
    fn test_pipeline_config_from_partial_json() {
        let json = r#"{
            "cleaning": { "drop_threshold": 0.25, "outlier_columns": [] },
            "processing_time": { "end": "Completed Date" }
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.cleaning.drop_threshold, 0.25);
        assert_eq!(config.cleaning.iqr_multiplier, 1.5);
        assert!(config.cleaning.outlier_columns.is_empty());
        let spec = config.processing_time.unwrap();
        assert_eq!(spec.start, "Filed Date");
        assert_eq!(spec.end, "Completed Date");
        assert_eq!(config.load, LoadOptions::default());
    }

    #[test]
    fn test_pipeline_config_derivation_on_by_default() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.processing_time, Some(ProcessingTimeSpec::default()));

        let config: PipelineConfig = serde_json::from_str(r#"{ "processing_time": null }"#).unwrap();
        assert!(config.processing_time.is_none());
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = PipelineConfig::from_json_file("does/not/exist.json").unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_from_json_file_rejects_invalid_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "cleaning": { "drop_threshold": 2.0 } }"#).unwrap();

        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
