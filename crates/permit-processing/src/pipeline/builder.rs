//! The cleaning pipeline and its builder.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, error, info, warn};

use crate::cleaner::DataCleaner;
use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::exporter::{DatasetExporter, ExportSummary};
use crate::features::FeatureDeriver;
use crate::loader::DatasetLoader;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::DataProfiler;
use crate::reporting::ReportGenerator;
use crate::types::{
    CleaningReport, DatasetProfile, FeatureReport, RunSummary, TypeInferenceWarning,
};
use crate::utils::completeness;

/// Row loss above this share of the input adds a warning to the summary.
const HIGH_ROW_LOSS_PERCENT: f64 = 30.0;

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// The cleaned table, with the derived column when enabled.
    pub data: DataFrame,
    /// Profile of the table before cleaning.
    pub profile: DatasetProfile,
    pub cleaning: CleaningReport,
    /// `None` when derivation is switched off.
    pub features: Option<FeatureReport>,
    pub summary: RunSummary,
    pub load_warnings: Vec<TypeInferenceWarning>,
    /// Set by [`Pipeline::run`] when a file was written.
    pub export: Option<ExportSummary>,
}

/// Load, profile, clean, derive and export a permits table.
///
/// # Example
///
/// ```rust,ignore
/// use permit_processing::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run("permits.csv", Some("out/cleaned.csv".as_ref()))?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    loader: DatasetLoader,
    profiler: DataProfiler,
    cleaner: DataCleaner,
    deriver: Option<FeatureDeriver>,
}

static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read `input`, process it and, when `output` is given, write the
    /// cleaned table there (plus a JSON report if `emit_report` is set).
    pub fn run(&self, input: impl AsRef<Path>, output: Option<&Path>) -> Result<PipelineResult> {
        let input = input.as_ref();
        let started = Instant::now();

        let outcome = self.load_and_process(input).and_then(|mut result| {
            if let Some(path) = output {
                self.export(&mut result, input, path)?;
            }
            result.summary.duration_ms = started.elapsed().as_millis() as u64;
            Ok(result)
        });
        self.finish(outcome)
    }

    /// Profile, clean and derive an already-loaded table.
    pub fn process(&self, df: DataFrame) -> Result<PipelineResult> {
        let outcome = self.process_internal(df, Vec::new());
        self.finish(outcome)
    }

    fn finish(&self, outcome: Result<PipelineResult>) -> Result<PipelineResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn load_and_process(&self, input: &Path) -> Result<PipelineResult> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}", input.display()),
        ));
        info!("Step 1: Loading {}...", input.display());

        let loaded = self.loader.load_dataset(input)?;
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} rows", loaded.df.height()),
        ));

        self.process_internal(loaded.df, loaded.warnings)
    }

    fn process_internal(
        &self,
        df: DataFrame,
        load_warnings: Vec<TypeInferenceWarning>,
    ) -> Result<PipelineResult> {
        let started = Instant::now();
        let mut summary = RunSummary {
            rows_before: df.height(),
            columns_before: df.width(),
            completeness_before: completeness(&df),
            ..Default::default()
        };
        for warning in &load_warnings {
            summary.add_warning(warning.to_string());
        }

        // Step 2: profile
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Profiling,
            0.0,
            "Profiling dataset...",
        ));
        info!("Step 2: Profiling dataset...");

        let profile = self
            .profiler
            .profile_dataset(&df)
            .context("Profiling dataset")?;
        debug!("Shape: {:?}", profile.shape);

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Profiling,
            1.0,
            format!("Profiled {} columns", profile.column_profiles.len()),
        ));

        // Step 3: clean
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            "Cleaning dataset...",
        ));
        info!("Step 3: Cleaning dataset...");

        let (df, cleaning) = self.cleaner.clean(df).context("Cleaning dataset")?;
        for (column, failures) in &cleaning.date_parse_failures {
            if *failures > 0 {
                summary.add_warning(format!(
                    "{} values in '{}' were not valid dates and were set to missing",
                    failures, column
                ));
            }
        }

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            1.0,
            format!("{} actions applied", cleaning.actions.len()),
        ));

        // Step 4: derive
        let (df, features) = match &self.deriver {
            Some(deriver) => {
                self.report_progress(ProgressUpdate::new(
                    PipelineStage::FeatureDerivation,
                    0.0,
                    "Deriving processing time...",
                ));
                info!("Step 4: Deriving processing time...");
                let (df, report) = self.derive(deriver, df, &mut summary)?;
                (df, Some(report))
            }
            None => {
                info!("Step 4: Skipping feature derivation (disabled)");
                (df, None)
            }
        };

        summary.rows_after = df.height();
        summary.columns_after = df.width();
        summary.completeness_after = completeness(&df);
        summary.duration_ms = started.elapsed().as_millis() as u64;

        let removed_pct = cleaning.rows_removed_percentage();
        if removed_pct > HIGH_ROW_LOSS_PERCENT {
            summary.add_warning(format!(
                "High data loss: {:.1}% of rows were removed",
                removed_pct
            ));
        }

        Ok(PipelineResult {
            data: df,
            profile,
            cleaning,
            features,
            summary,
            load_warnings,
            export: None,
        })
    }

    /// A missing date column skips the feature instead of failing the run.
    fn derive(
        &self,
        deriver: &FeatureDeriver,
        df: DataFrame,
        summary: &mut RunSummary,
    ) -> Result<(DataFrame, FeatureReport)> {
        let backup = df.clone();
        match deriver.derive(df) {
            Ok(derived) => Ok(derived),
            Err(e) if e.is_recoverable() => {
                let spec_name = self
                    .config
                    .processing_time
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                warn!("Skipping '{}': {}", spec_name, e);
                summary.add_warning(format!("Skipped '{}': {}", spec_name, e));
                let report = FeatureReport {
                    column: spec_name,
                    skipped_reason: Some(e.to_string()),
                    ..Default::default()
                };
                Ok((backup, report))
            }
            Err(e) => Err(e),
        }
    }

    fn export(&self, result: &mut PipelineResult, input: &Path, output: &Path) -> Result<()> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Exporting,
            0.0,
            format!("Writing {}", output.display()),
        ));
        info!("Step 5: Saving output files...");

        let export = DatasetExporter::export(&mut result.data, output)?;
        result.export = Some(export);

        if self.config.emit_report {
            let report = ReportGenerator::build(input, Some(output), result);
            let path = ReportGenerator::report_path_for(output);
            ReportGenerator::write_report_to_file(&report, &path)?;
        }

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Exporting,
            1.0,
            "Output files saved",
        ));
        Ok(())
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Shorthand for [`progress_reporter`](Self::progress_reporter) with a closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline. Fails if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, crate::config::ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            loader: DatasetLoader::new(config.load.clone()),
            profiler: DataProfiler::from_config(&config.cleaning),
            cleaner: DataCleaner::new(config.cleaning.clone()),
            deriver: config.processing_time.clone().map(FeatureDeriver::new),
            progress_reporter: self.progress_reporter,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CleaningConfig, ProcessingTimeSpec};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn permits() -> DataFrame {
        df!(
            "Permit Number" => &["P1", "P2", "P3", "P4"],
            "Filed Date" => &[Some("2017-01-03"), Some("2017-02-01"), Some("N/A"), Some("2017-03-01")],
            "Issued Date" => &[Some("2017-01-10"), None, Some("2017-03-02"), Some("2017-03-11")],
            "Estimated Cost" => &[Some(1000.0), Some(2000.5), None, Some(1500.0)]
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = Pipeline::builder().build().unwrap();
        assert!(pipeline.deriver.is_some());
        assert!(!pipeline.config.emit_report);
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.cleaning.drop_threshold = 2.0;
        assert!(Pipeline::builder().config(config).build().is_err());
    }

    #[test]
    fn test_process_derives_processing_time() {
        let result = Pipeline::builder().build().unwrap().process(permits()).unwrap();

        let days: Vec<Option<i64>> = result
            .data
            .column("Processing Time (days)")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(days, vec![Some(7), None, None, Some(10)]);

        let features = result.features.unwrap();
        assert_eq!(features.derived, 2);
        assert_eq!(features.missing, 2);
        assert_eq!(result.summary.rows_before, 4);
        // Dates and the derived column stay sparse; everything else is filled.
        for name in ["Permit Number", "Estimated Cost"] {
            assert_eq!(result.data.column(name).unwrap().null_count(), 0, "{}", name);
        }
        assert_eq!(result.data.column("Filed Date").unwrap().null_count(), 1);
        assert!(result.summary.completeness_after < 1.0);
        assert!(result.summary.warnings.iter().any(|w| w.contains("Filed Date")));
    }

    #[test]
    fn test_missing_date_column_skips_feature() {
        let df = permits().drop("Issued Date").unwrap();
        let result = Pipeline::builder().build().unwrap().process(df).unwrap();

        assert!(result.data.column("Processing Time (days)").is_err());
        let features = result.features.unwrap();
        assert!(features.skipped_reason.is_some());
        assert!(result.summary.warnings.iter().any(|w| w.contains("Skipped")));
    }

    #[test]
    fn test_derivation_can_be_disabled() {
        let config = PipelineConfig {
            processing_time: None,
            ..Default::default()
        };
        let result = Pipeline::builder().config(config).build().unwrap().process(permits()).unwrap();
        assert!(result.features.is_none());
        assert!(result.data.column("Processing Time (days)").is_err());
    }

    #[test]
    fn test_custom_processing_time_columns() {
        let df = df!(
            "Filed Date" => &["2017-01-03"],
            "Completed Date" => &["2017-02-03"]
        )
        .unwrap();
        let config = PipelineConfig {
            cleaning: CleaningConfig::builder()
                .date_columns(["Filed Date", "Completed Date"])
                .build()
                .unwrap(),
            processing_time: Some(ProcessingTimeSpec {
                name: "Days To Complete".to_string(),
                end: "Completed Date".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = Pipeline::builder().config(config).build().unwrap().process(df).unwrap();
        let days = result.data.column("Days To Complete").unwrap();
        assert_eq!(days.get(0).unwrap().try_extract::<i64>().unwrap(), 31);
    }

    #[test]
    fn test_progress_reports_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let pipeline = Pipeline::builder()
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap();

        pipeline.process(permits()).unwrap();

        let mut seen = stages.lock().unwrap().clone();
        seen.dedup();
        assert_eq!(
            seen,
            vec![
                PipelineStage::Profiling,
                PipelineStage::Cleaning,
                PipelineStage::FeatureDerivation,
                PipelineStage::Complete,
            ]
        );
    }

    #[test]
    fn test_failure_is_reported() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let pipeline = Pipeline::builder()
            .on_progress(move |update| {
                if update.stage == PipelineStage::Failed {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
            .unwrap();

        let err = pipeline.run("does/not/exist.csv", None).unwrap_err();
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }
}
