use std::path::{Path, PathBuf};
use std::sync::Arc;

use permit_processing::{DatasetLoader, LoadOptions};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DashboardError, Result};

/// Which file a page is rendered from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetChoice {
    #[default]
    Raw,
    Cleaned,
}

/// Paths the server was started with. Nothing loaded from them is kept
/// between requests.
#[derive(Debug, Clone)]
pub struct DashboardState {
    inner: Arc<Sources>,
}

#[derive(Debug)]
struct Sources {
    raw: PathBuf,
    cleaned: Option<PathBuf>,
    load_options: LoadOptions,
}

impl DashboardState {
    pub fn new(raw: impl Into<PathBuf>, cleaned: Option<PathBuf>) -> Self {
        Self::with_load_options(raw, cleaned, LoadOptions::default())
    }

    pub fn with_load_options(
        raw: impl Into<PathBuf>,
        cleaned: Option<PathBuf>,
        load_options: LoadOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Sources {
                raw: raw.into(),
                cleaned,
                load_options,
            }),
        }
    }

    pub fn path_for(&self, choice: DatasetChoice) -> Result<&Path> {
        match choice {
            DatasetChoice::Raw => Ok(&self.inner.raw),
            DatasetChoice::Cleaned => self
                .inner
                .cleaned
                .as_deref()
                .ok_or(DashboardError::CleanedUnavailable),
        }
    }

    /// Read the chosen dataset from disk.
    pub fn load(&self, choice: DatasetChoice) -> Result<DataFrame> {
        let path = self.path_for(choice)?;
        let loaded = DatasetLoader::new(self.inner.load_options.clone()).load_dataset(path)?;
        debug!(
            "Loaded {:?} dataset {} ({} rows, {} columns)",
            choice,
            path.display(),
            loaded.df.height(),
            loaded.df.width()
        );
        Ok(loaded.df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_path_is_optional() {
        let state = DashboardState::new("raw.csv", None);
        assert_eq!(
            state.path_for(DatasetChoice::Raw).unwrap(),
            Path::new("raw.csv")
        );
        assert!(matches!(
            state.path_for(DatasetChoice::Cleaned),
            Err(DashboardError::CleanedUnavailable)
        ));
    }

    #[test]
    fn test_missing_file_is_reported_per_request() {
        let state = DashboardState::new("/nonexistent/raw.csv", None);
        let err = state.load(DatasetChoice::Raw).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
    }
}
