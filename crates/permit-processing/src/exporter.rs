//! Writing the cleaned table.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PermitError, Result};
use crate::loader::SourceFormat;

/// What was written and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub rows: usize,
    pub columns: usize,
    pub bytes: u64,
}

/// Writes a table as CSV or Parquet depending on the file extension.
pub struct DatasetExporter;

impl DatasetExporter {
    /// Write `df` to `path`, creating parent directories and replacing any
    /// existing file.
    pub fn export(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<ExportSummary> {
        let path = path.as_ref();
        let format = SourceFormat::from_path(path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| export_failed(path, e))?;
        }

        let mut file = File::create(path).map_err(|e| export_failed(path, e))?;
        match format {
            SourceFormat::Csv => CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(b',')
                .with_quote_char(b'"')
                .with_date_format(Some("%Y-%m-%d".into()))
                .finish(df)
                .map_err(|e| export_failed(path, e))?,
            SourceFormat::Parquet => {
                ParquetWriter::new(&mut file)
                    .finish(df)
                    .map_err(|e| export_failed(path, e))?;
            }
        }

        let bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        info!(
            "Dataset saved: {} ({} rows, {} columns)",
            path.display(),
            df.height(),
            df.width()
        );

        Ok(ExportSummary {
            path: path.to_path_buf(),
            format,
            rows: df.height(),
            columns: df.width(),
            bytes,
        })
    }
}

fn export_failed(path: &Path, err: impl std::fmt::Display) -> PermitError {
    PermitError::ExportFailed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DatasetLoader;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn cleaned() -> DataFrame {
        let filed = Series::new("Filed Date".into(), &[Some(17169i32), None])
            .cast(&DataType::Date)
            .unwrap();
        DataFrame::new(vec![
            Series::new("Permit Number".into(), &["201505065519", "201604195146"]).into_column(),
            filed.into_column(),
            Series::new("Estimated Cost".into(), &[4000.0, 1.0]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn test_export_csv_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("nested").join("cleaned.csv");
        let mut df = cleaned();

        let summary = DatasetExporter::export(&mut df, &path).unwrap();

        assert!(path.exists());
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.columns, 3);
        assert!(summary.bytes > 0);

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Permit Number,Filed Date,Estimated Cost"));
        assert!(lines.next().unwrap().contains("2017-01-03"));
    }

    #[test]
    fn test_export_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cleaned.csv");
        fs::write(&path, "stale").unwrap();

        DatasetExporter::export(&mut cleaned(), &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
    }

    #[test]
    fn test_export_parquet_preserves_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cleaned.parquet");
        let mut df = cleaned();

        let summary = DatasetExporter::export(&mut df, &path).unwrap();
        assert!(matches!(summary.format, SourceFormat::Parquet));

        let loaded = DatasetLoader::default().load_dataset(&path).unwrap();
        assert_eq!(loaded.df.column("Filed Date").unwrap().dtype(), &DataType::Date);
        assert!(loaded.df.equals_missing(&df));
    }
}
