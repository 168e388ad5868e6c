// src/models/mod.rs

//! Data structures shared across the pipeline.

pub mod case;
pub mod config;
pub mod run;
pub mod search;

pub use case::{AnalysisStatus, AnalyzedCase, CaseSignature, NormalizedCaseText, RawCaseRecord};
pub use config::{
    AnalysisConfig, Config, HttpConfig, PipelineConfig, ResultOrder, RetryConfig, ScraperConfig,
};
pub use run::{ExecutionRun, RunCounts, RunStatus};
pub use search::{DateWindow, DateWindowSpec, SearchConfiguration, SearchCriteria};
