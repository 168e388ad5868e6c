//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::filter::DateFilterMode;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client and session settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry/backoff policy for remote-source requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Search-result scraping behavior
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// AI analysis settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Run scheduling and concurrency bounds
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.base_url.trim().is_empty() {
            return Err(AppError::config("http.base_url is empty"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::config("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::config("http.timeout_secs must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be > 0"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(AppError::config("retry.multiplier must be >= 1.0"));
        }
        if self.scraper.max_pages == 0 {
            return Err(AppError::config("scraper.max_pages must be > 0"));
        }
        if self.analysis.max_attempts == 0 {
            return Err(AppError::config("analysis.max_attempts must be > 0"));
        }
        if self.pipeline.max_concurrent_runs == 0 {
            return Err(AppError::config("pipeline.max_concurrent_runs must be > 0"));
        }
        if self.pipeline.max_concurrent_records == 0 {
            return Err(AppError::config(
                "pipeline.max_concurrent_records must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Base URL of the CBOSA-equivalent remote source
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum spacing between outbound requests in milliseconds.
    /// Shared across all concurrent runs targeting the source.
    #[serde(default = "defaults::min_request_interval")]
    pub min_request_interval_ms: u64,
}

impl HttpConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            min_request_interval_ms: defaults::min_request_interval(),
        }
    }
}

/// Retry/backoff policy knobs, reused by the session client and the
/// analysis stage (with its own section below).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before giving up (first try included)
    #[serde(default = "defaults::retry_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry, in milliseconds
    #[serde(default = "defaults::retry_base_delay")]
    pub base_delay_ms: u64,

    /// Exponential multiplier applied per attempt
    #[serde(default = "defaults::retry_multiplier")]
    pub multiplier: f64,

    /// Upper bound of the uniform random jitter, in milliseconds
    #[serde(default = "defaults::retry_jitter")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::retry_attempts(),
            base_delay_ms: defaults::retry_base_delay(),
            multiplier: defaults::retry_multiplier(),
            jitter_ms: defaults::retry_jitter(),
        }
    }
}

/// Ordering of the remote source's result listing. Short-circuiting
/// pagination is only sound when the order is known newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Most recent decisions first (CBOSA default)
    #[default]
    Descending,
    /// Order not guaranteed; never short-circuit
    Unknown,
}

/// Search-result scraping behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Hard cap on listing pages walked per run
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Hard cap on records kept per run
    #[serde(default = "defaults::max_results")]
    pub max_results: usize,

    /// Date reconciliation mode (strict_local is the correctness path)
    #[serde(default)]
    pub date_filter_mode: DateFilterMode,

    /// Listing order assumption used by the short-circuit optimization
    #[serde(default)]
    pub result_order: ResultOrder,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::max_pages(),
            max_results: defaults::max_results(),
            date_filter_mode: DateFilterMode::default(),
            result_order: ResultOrder::default(),
        }
    }
}

/// AI analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Chat-completions endpoint base (e.g. "https://api.openai.com/v1")
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Model name passed to the capability
    #[serde(default = "defaults::model")]
    pub model: String,

    /// Completion token cap per case
    #[serde(default = "defaults::max_completion_tokens")]
    pub max_completion_tokens: u32,

    /// Per-call timeout in seconds
    #[serde(default = "defaults::analysis_timeout")]
    pub timeout_secs: u64,

    /// Attempts before downgrading to analysis_failed
    #[serde(default = "defaults::analysis_attempts")]
    pub max_attempts: u32,

    /// Base retry delay in milliseconds
    #[serde(default = "defaults::analysis_base_delay")]
    pub base_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            model: defaults::model(),
            max_completion_tokens: defaults::max_completion_tokens(),
            timeout_secs: defaults::analysis_timeout(),
            max_attempts: defaults::analysis_attempts(),
            base_delay_ms: defaults::analysis_base_delay(),
        }
    }
}

/// Run scheduling and concurrency bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Search configurations executed concurrently
    #[serde(default = "defaults::max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Per-run bound on concurrent extract+analyze record work
    #[serde(default = "defaults::max_concurrent_records")]
    pub max_concurrent_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: defaults::max_concurrent_runs(),
            max_concurrent_records: defaults::max_concurrent_records(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn base_url() -> String {
        "https://orzeczenia.nsa.gov.pl".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; orzecznik/0.1)".into()
    }
    pub fn timeout() -> u64 {
        40
    }
    pub fn min_request_interval() -> u64 {
        1000
    }

    // Retry defaults
    pub fn retry_attempts() -> u32 {
        4
    }
    pub fn retry_base_delay() -> u64 {
        1000
    }
    pub fn retry_multiplier() -> f64 {
        1.6
    }
    pub fn retry_jitter() -> u64 {
        400
    }

    // Scraper defaults
    pub fn max_pages() -> usize {
        20
    }
    pub fn max_results() -> usize {
        100
    }

    // Analysis defaults
    pub fn api_base() -> String {
        "https://api.openai.com/v1".into()
    }
    pub fn model() -> String {
        "gpt-4o-mini".into()
    }
    pub fn max_completion_tokens() -> u32 {
        2000
    }
    pub fn analysis_timeout() -> u64 {
        120
    }
    pub fn analysis_attempts() -> u32 {
        3
    }
    pub fn analysis_base_delay() -> u64 {
        1000
    }

    // Pipeline defaults
    pub fn max_concurrent_runs() -> usize {
        2
    }
    pub fn max_concurrent_records() -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.http.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retry_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.pipeline.max_concurrent_runs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [http]
            min_request_interval_ms = 250

            [scraper]
            date_filter_mode = "trust_server"
            "#,
        )
        .unwrap();
        assert_eq!(config.http.min_request_interval_ms, 250);
        assert_eq!(config.http.timeout_secs, 40);
        assert_eq!(config.scraper.date_filter_mode, DateFilterMode::TrustServer);
        assert_eq!(config.scraper.result_order, ResultOrder::Descending);
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scraper]\nmax_pages = 3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.scraper.max_pages, 3);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn load_or_default_survives_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.http.base_url, defaults::base_url());
    }
}
