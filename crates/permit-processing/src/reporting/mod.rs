//! Run reports.
//!
//! A [`RunReport`] collects the profile, cleaning actions, derived-feature
//! counts and summary of one run. It is printed for `--json` and written next
//! to the cleaned file for `--emit-report`.
//!
//! # Example
//!
//! ```rust,ignore
//! use permit_processing::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build(&input, Some(&output), &result);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let path = ReportGenerator::report_path_for(&output);
//! ReportGenerator::write_report_to_file(&report, &path)?;
//! ```

mod generator;

pub use generator::{ReportGenerator, RunReport};
