//! Building permit processing library
//!
//! Loads a municipal building-permit export, profiles it, cleans it and adds
//! a processing-time feature, built on Polars.
//!
//! # Overview
//!
//! - **Loading**: every CSV column is read as text and typed afterwards, so
//!   mixed columns never abort a read ([`loader`])
//! - **Profiling**: missing fraction, distinct count and semantic type per
//!   column, plus duplicate counts ([`profiler`])
//! - **Cleaning**: date coercion, sparse column removal, median/KNN/sentinel
//!   imputation and IQR outlier removal ([`cleaner`])
//! - **Features**: `Processing Time (days)` from the filed and issued dates
//!   ([`features`])
//! - **Export**: CSV or Parquet by extension ([`exporter`])
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use permit_processing::{Pipeline, PipelineConfig};
//!
//! let result = Pipeline::builder()
//!     .config(PipelineConfig::default())
//!     .build()?
//!     .run("Building_Permits.csv", Some("out/cleaned.csv".as_ref()))?;
//!
//! println!(
//!     "{} -> {} rows, completeness {:.1}% -> {:.1}%",
//!     result.summary.rows_before,
//!     result.summary.rows_after,
//!     result.summary.completeness_before * 100.0,
//!     result.summary.completeness_after * 100.0,
//! );
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use permit_processing::config::CleaningConfig;
//!
//! let cleaning = CleaningConfig::builder()
//!     .drop_threshold(0.5)          // drop columns with >50% missing
//!     .iqr_multiplier(1.5)
//!     .knn_neighbors(5)
//!     .categorical_sentinel("Unknown")
//!     .outlier_columns(["Estimated Cost", "Revised Cost"])
//!     .build()?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod exporter;
pub mod features;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;

pub use cleaner::{DataCleaner, OutlierFilter};
pub use config::{
    CleaningConfig, CleaningConfigBuilder, ConfigValidationError, LoadOptions, PipelineConfig,
    ProcessingTimeSpec,
};
pub use error::{PermitError, Result, ResultExt};
pub use exporter::{DatasetExporter, ExportSummary};
pub use features::FeatureDeriver;
pub use imputers::{KNNImputer, StatisticalImputer};
pub use loader::{DatasetLoader, LoadedDataset, SourceFormat};
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineResult, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use profiler::DataProfiler;
pub use reporting::{ReportGenerator, RunReport};
pub use types::{
    ActionType, CleaningAction, CleaningReport, ColumnProfile, DatasetProfile, FeatureReport,
    ImputationMethod, NumericKind, OutlierBounds, RunSummary, SemanticType, TypeInferenceWarning,
};
