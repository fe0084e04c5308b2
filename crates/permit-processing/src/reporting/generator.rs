use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PermitError, Result};
use crate::pipeline::PipelineResult;
use crate::types::{CleaningReport, DatasetProfile, FeatureReport, RunSummary, TypeInferenceWarning};

/// Everything known about one pipeline run, for `--json` output and
/// `--emit-report` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: String,
    pub input_file: String,
    pub output_file: Option<String>,
    pub summary: RunSummary,
    pub load_warnings: Vec<TypeInferenceWarning>,
    pub profile: DatasetProfile,
    pub cleaning: CleaningReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureReport>,
    /// Schema of the cleaned table as `(name, dtype)` pairs.
    pub output_schema: Vec<(String, String)>,
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn build(input: &Path, output: Option<&Path>, result: &PipelineResult) -> RunReport {
        let output_schema = result
            .data
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().to_string()))
            .collect();

        RunReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input.display().to_string(),
            output_file: output.map(|p| p.display().to_string()),
            summary: result.summary.clone(),
            load_warnings: result.load_warnings.clone(),
            profile: result.profile.clone(),
            cleaning: result.cleaning.clone(),
            features: result.features.clone(),
            output_schema,
        }
    }

    /// `<dir>/<stem>_report.json` for an artifact at `<dir>/<stem>.<ext>`.
    pub fn report_path_for(artifact: &Path) -> PathBuf {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "permits".to_string());
        artifact.with_file_name(format!("{}_report.json", stem))
    }

    /// Write `report` as pretty JSON, replacing any existing file.
    pub fn write_report_to_file(report: &RunReport, path: &Path) -> Result<PathBuf> {
        let write = || -> Result<()> {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(path)?;
            file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;
            Ok(())
        };
        write().map_err(|e| PermitError::ReportGenerationFailed(e.to_string()))?;

        info!("Report saved: {}", path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_path_for() {
        assert_eq!(
            ReportGenerator::report_path_for(Path::new("out/cleaned.csv")),
            PathBuf::from("out/cleaned_report.json")
        );
        assert_eq!(
            ReportGenerator::report_path_for(Path::new("cleaned.parquet")),
            PathBuf::from("cleaned_report.json")
        );
    }
}
