use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What a column holds, as far as the cleaning policy is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Date,
    Text,
    /// Every value is missing.
    Empty,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Date => "date",
            Self::Text => "text",
            Self::Empty => "empty",
        }
    }
}

/// Numeric columns split into counts (median-imputed) and measurements
/// (KNN-imputed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    Discrete,
    Continuous,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    /// Fraction of rows missing, 0.0 - 1.0.
    pub missing_fraction: f64,
    /// Distinct non-null values.
    pub distinct_count: usize,
    pub semantic_type: SemanticType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_kind: Option<NumericKind>,
    pub sample_values: Vec<String>,
    pub characteristics: HashMap<String, serde_json::Value>,
}

impl ColumnProfile {
    pub fn missing_percentage(&self) -> f64 {
        self.missing_fraction * 100.0
    }
}

/// Duplicate count for a single identifier column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDuplicates {
    pub column: String,
    /// Rows whose key repeats an earlier row's key.
    pub duplicate_rows: usize,
    pub duplicate_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub shape: (usize, usize),
    pub column_profiles: Vec<ColumnProfile>,
    pub total_missing: usize,
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    pub key_duplicates: Vec<KeyDuplicates>,
    pub estimated_size_bytes: usize,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.column_profiles.iter().find(|c| c.name == name)
    }

    /// Columns whose missing fraction is strictly above `threshold`.
    pub fn columns_above_missing(&self, threshold: f64) -> Vec<&str> {
        self.column_profiles
            .iter()
            .filter(|c| c.missing_fraction > threshold)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A text column in which some cells parse as numbers and others do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInferenceWarning {
    pub column: String,
    pub numeric_count: usize,
    pub non_numeric_count: usize,
    pub examples: Vec<String>,
}

impl std::fmt::Display for TypeInferenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "column '{}' mixes {} numeric and {} non-numeric values (e.g. {}); kept as text",
            self.column,
            self.numeric_count,
            self.non_numeric_count,
            self.examples.join(", ")
        )
    }
}

// ============================================================================
// Cleaning report
// ============================================================================

/// How a column's gaps were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    Median,
    Knn,
    Sentinel,
    /// Missing cells were left as explicit nulls (dates).
    LeftMissing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationRecord {
    pub column: String,
    pub method: ImputationMethod,
    pub filled: usize,
}

/// Fitted Tukey fences for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// A single action taken during cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningAction {
    pub action_type: ActionType,
    /// Column name or "dataset".
    pub target: String,
    pub description: String,
}

impl CleaningAction {
    pub fn new(
        action_type: ActionType,
        target: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            target: target.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ColumnRemoved,
    RowsRemoved,
    TypeCorrected,
    ValueImputed,
    OutlierHandled,
    DuplicatesRemoved,
    FeatureDerived,
}

impl ActionType {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ColumnRemoved => "Column Removed",
            Self::RowsRemoved => "Rows Removed",
            Self::TypeCorrected => "Type Corrected",
            Self::ValueImputed => "Value Imputed",
            Self::OutlierHandled => "Outlier Handled",
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::FeatureDerived => "Feature Derived",
        }
    }
}

/// Everything the cleaner did to a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub actions: Vec<CleaningAction>,
    pub dropped_columns: Vec<String>,
    pub imputations: Vec<ImputationRecord>,
    /// Cells per date column that could not be parsed and became null.
    pub date_parse_failures: BTreeMap<String, usize>,
    pub outlier_bounds: BTreeMap<String, OutlierBounds>,
    pub outlier_rows_removed: usize,
    pub duplicates_removed: usize,
}

impl CleaningReport {
    pub fn add_action(&mut self, action: CleaningAction) {
        self.actions.push(action);
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn rows_removed_percentage(&self) -> f64 {
        if self.rows_before == 0 {
            0.0
        } else {
            self.rows_removed() as f64 / self.rows_before as f64 * 100.0
        }
    }

    pub fn imputation_for(&self, column: &str) -> Option<&ImputationRecord> {
        self.imputations.iter().find(|r| r.column == column)
    }
}

/// Outcome of deriving the processing-time column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureReport {
    pub column: String,
    pub derived: usize,
    /// Rows left null because one of the dates was missing.
    pub missing: usize,
    pub negative: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

/// Human-readable summary of a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// Non-null cell fraction, 0.0 - 1.0.
    pub completeness_before: f64,
    pub completeness_after: f64,
    pub warnings: Vec<String>,
}

impl RunSummary {
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn completeness_improvement(&self) -> f64 {
        (self.completeness_after - self.completeness_before) * 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_outlier_bounds_contains_edges() {
        let bounds = OutlierBounds {
            q1: 10.0,
            q3: 20.0,
            lower: -5.0,
            upper: 35.0,
        };
        assert_eq!(bounds.iqr(), 10.0);
        assert!(bounds.contains(-5.0));
        assert!(bounds.contains(35.0));
        assert!(!bounds.contains(35.01));
    }

    #[test]
    fn test_cleaning_report_rows_removed() {
        let report = CleaningReport {
            rows_before: 200,
            rows_after: 150,
            ..Default::default()
        };
        assert_eq!(report.rows_removed(), 50);
        assert!((report.rows_removed_percentage() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cleaning_report_empty_table_percentage() {
        assert_eq!(CleaningReport::default().rows_removed_percentage(), 0.0);
    }

    #[test]
    fn test_columns_above_missing_is_strict() {
        let profile = DatasetProfile {
            shape: (4, 2),
            column_profiles: vec![
                column("a", 0.5),
                column("b", 0.75),
            ],
            total_missing: 5,
            duplicate_count: 0,
            duplicate_percentage: 0.0,
            key_duplicates: Vec::new(),
            estimated_size_bytes: 0,
        };
        assert_eq!(profile.columns_above_missing(0.5), vec!["b"]);
        assert!(profile.column("a").is_some());
    }

    #[test]
    fn test_type_warning_display() {
        let warning = TypeInferenceWarning {
            column: "Street Number Suffix".to_string(),
            numeric_count: 3,
            non_numeric_count: 2,
            examples: vec!["A".to_string(), "B".to_string()],
        };
        let text = warning.to_string();
        assert!(text.contains("Street Number Suffix"));
        assert!(text.contains("A, B"));
    }

    #[test]
    fn test_action_types_serialize_snake_case() {
        let json = serde_json::to_string(&ActionType::FeatureDerived).unwrap();
        assert_eq!(json, "\"feature_derived\"");
        let json = serde_json::to_string(&ImputationMethod::LeftMissing).unwrap();
        assert_eq!(json, "\"left_missing\"");
        assert_eq!(ActionType::ColumnRemoved.display_name(), "Column Removed");
    }

    fn column(name: &str, missing_fraction: f64) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            dtype: "f64".to_string(),
            null_count: 0,
            missing_fraction,
            distinct_count: 0,
            semantic_type: SemanticType::Numeric,
            numeric_kind: Some(NumericKind::Continuous),
            sample_values: Vec::new(),
            characteristics: HashMap::new(),
        }
    }
}
