// src/error.rs

//! Unified error handling for the pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Why a document could not be turned into normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionReason {
    /// The document download failed after retries were exhausted.
    DownloadFailed,
    /// The document is neither RTF nor HTML/plain text we can decode.
    UnsupportedFormat,
    /// The document decoded to an empty body.
    EmptyBody,
}

impl fmt::Display for ExtractionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionReason::DownloadFailed => "download_failed",
            ExtractionReason::UnsupportedFormat => "unsupported_format",
            ExtractionReason::EmptyBody => "empty_body",
        };
        f.write_str(s)
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (transport-level, before retry wrapping)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// A request failed for good after the retry budget was spent.
    #[error("fetch failed for {url} after {attempts} attempts (last status: {})",
            .last_status.map_or_else(|| "none".to_string(), |s| s.to_string()))]
    Fetch {
        url: String,
        last_status: Option<u16>,
        attempts: u32,
    },

    /// A single document could not be extracted. Absorbed and counted by the
    /// run; never aborts it.
    #[error("extraction failed for {url}: {reason}")]
    Extraction {
        url: String,
        reason: ExtractionReason,
    },

    /// The text-generation capability failed after retries. Downgraded to an
    /// `analysis_failed` status at the AnalysisStage boundary.
    #[error("analysis failed after {attempts} attempts: {message}")]
    Analysis { message: String, attempts: u32 },

    /// Invalid configuration or search configuration. Aborts only the
    /// affected run.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an extraction error for a document URL.
    pub fn extraction(url: impl Into<String>, reason: ExtractionReason) -> Self {
        Self::Extraction {
            url: url.into(),
            reason,
        }
    }

    /// True when this error names a single-record extraction failure.
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction { .. })
    }
}
