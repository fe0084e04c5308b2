//! Imputation strategies for missing values.
//!
//! - KNN imputation for continuous measurements
//! - Median and constant fills for counts and categories

mod knn;
mod statistical;

pub use knn::KNNImputer;
pub use statistical::{FillOutcome, StatisticalImputer};
