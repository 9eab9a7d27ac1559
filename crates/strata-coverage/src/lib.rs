//! Coverage data aggregation and report generation for Strata.
//!
//! Per-test `.coverage` files are nested under each test's path-safe address,
//! combined into one data file by the external coverage tool, and then
//! rendered into the configured report formats concurrently.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ini;
pub mod report;
pub mod settings;

pub use aggregate::{merge_coverage_data, CoverageData, MergedCoverageData};
pub use config::{create_coverage_config, CoverageConfig};
pub use error::{CoverageError, CoverageResult};
pub use report::{generate_coverage_reports, CoverageReport, FilesystemCoverageReport};
pub use settings::{CoverageReportType, CoverageSettings, CoverageTool};
