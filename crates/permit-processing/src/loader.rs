//! Reading the raw permits file.
//!
//! CSV input is read with every column as text, then each column is typed
//! here: null markers become nulls, all-integer columns become `Int64`,
//! all-numeric columns become `Float64`, and anything else stays `String`.
//! Text columns that mix numbers with other values are reported as
//! [`TypeInferenceWarning`]s.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LoadOptions;
use crate::error::{PermitError, Result};
use crate::types::TypeInferenceWarning;
use crate::utils::{parse_integer_cell, parse_numeric_cell};

/// Examples kept per mixed-type warning.
const WARNING_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => Self::Parquet,
            _ => Self::Csv,
        }
    }
}

/// A table fresh off disk.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub df: DataFrame,
    pub warnings: Vec<TypeInferenceWarning>,
    pub source: PathBuf,
    pub format: SourceFormat,
}

pub struct DatasetLoader {
    options: LoadOptions,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl DatasetLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Load a CSV or Parquet file. A missing or unreadable file is an error
    /// the caller is expected to abort on.
    pub fn load_dataset(&self, path: impl AsRef<Path>) -> Result<LoadedDataset> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PermitError::FileNotFound(path.to_path_buf()));
        }

        let format = SourceFormat::from_path(path);
        let (df, warnings) = match format {
            SourceFormat::Parquet => (read_parquet(path)?, Vec::new()),
            SourceFormat::Csv => {
                let raw = self.read_csv_as_text(path)?;
                self.infer_types(raw)?
            }
        };

        for warning in &warnings {
            warn!("Type inference: {}", warning);
        }
        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );

        Ok(LoadedDataset {
            df,
            warnings,
            source: path.to_path_buf(),
            format,
        })
    }

    /// Read every column as text. Falls back to a repaired copy of the
    /// content when the quoted read fails.
    fn read_csv_as_text(&self, path: &Path) -> Result<DataFrame> {
        let first_error = match self
            .csv_options()
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
        {
            Ok(df) => return Ok(df),
            Err(e) => {
                debug!("Standard loading failed: {}", e);
                e
            }
        };

        let content = std::fs::read_to_string(path)?;
        let cleaned = clean_csv_content(&content);
        self.csv_options()
            .into_reader_with_file_handle(Cursor::new(cleaned))
            .finish()
            .map_err(|e| {
                debug!("Loading pre-cleaned content failed: {}", e);
                PermitError::Parse {
                    path: path.to_path_buf(),
                    reason: first_error.to_string(),
                }
            })
    }

    fn csv_options(&self) -> CsvReadOptions {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(self.options.separator)
                    .with_quote_char(Some(b'"')),
            )
    }

    fn is_null_marker(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.options.null_markers.iter().any(|m| m == trimmed)
    }

    /// Type every text column of `df`.
    pub fn infer_types(&self, df: DataFrame) -> Result<(DataFrame, Vec<TypeInferenceWarning>)> {
        let mut columns = Vec::with_capacity(df.width());
        let mut warnings = Vec::new();

        for column in df.get_columns() {
            if column.dtype() != &DataType::String {
                columns.push(column.clone());
                continue;
            }
            let (typed, warning) = self.infer_column(column.as_materialized_series())?;
            columns.push(typed.into_column());
            warnings.extend(warning);
        }

        Ok((DataFrame::new(columns)?, warnings))
    }

    fn infer_column(&self, series: &Series) -> Result<(Series, Option<TypeInferenceWarning>)> {
        let name = series.name().clone();
        let values: Vec<Option<&str>> = series
            .str()?
            .into_iter()
            .map(|v| v.filter(|s| !self.is_null_marker(s)))
            .collect();

        let mut numeric = 0usize;
        let mut integral = 0usize;
        let mut examples = Vec::new();
        let mut non_numeric = 0usize;
        for value in values.iter().flatten() {
            if parse_numeric_cell(value).is_some() {
                numeric += 1;
                if parse_integer_cell(value).is_some() {
                    integral += 1;
                }
            } else {
                non_numeric += 1;
                if examples.len() < WARNING_EXAMPLES && !examples.iter().any(|e| e == value) {
                    examples.push(value.to_string());
                }
            }
        }

        if numeric > 0 && non_numeric == 0 {
            let typed = if integral == numeric {
                let ints: Vec<Option<i64>> = values
                    .iter()
                    .map(|v| v.and_then(parse_integer_cell))
                    .collect();
                Series::new(name, ints)
            } else {
                let floats: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| v.and_then(parse_numeric_cell))
                    .collect();
                Series::new(name, floats)
            };
            debug!("Column '{}' typed as {}", typed.name(), typed.dtype());
            return Ok((typed, None));
        }

        let warning = (self.options.warn_mixed_types && numeric > 0 && non_numeric > 0).then(|| {
            TypeInferenceWarning {
                column: name.to_string(),
                numeric_count: numeric,
                non_numeric_count: non_numeric,
                examples,
            }
        });

        Ok((Series::new(name, values), warning))
    }
}

fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| PermitError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Repair doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
