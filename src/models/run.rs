//! Execution run tracking.
//!
//! One `ExecutionRun` per pipeline invocation per search configuration.
//! Its counts and status are the sole unit downstream systems log and alert
//! on, so they must be sufficient to reconstruct what happened without logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage counters for one run.
///
/// Invariants (enforced by the recording methods, checked by
/// `is_consistent`):
/// - `fetched >= filtered_out + extracted + skipped`
/// - `extracted >= analyzed + failed`
///
/// `failed` counts analysis failures; extraction failures are the gap
/// `fetched - filtered_out - extracted - skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Unique records parsed from listing pages (after dedup)
    pub fetched: usize,
    /// Records excluded by the date filter (missing dates included)
    pub filtered_out: usize,
    /// Records successfully normalized to plain text
    pub extracted: usize,
    /// Records with a successful AI summary
    pub analyzed: usize,
    /// Records whose analysis failed after retries
    pub failed: usize,
    /// Records never attempted because shutdown was requested
    pub skipped: usize,
}

impl RunCounts {
    /// Verify the count inequalities.
    pub fn is_consistent(&self) -> bool {
        self.fetched >= self.filtered_out + self.extracted + self.skipped
            && self.extracted >= self.analyzed + self.failed
    }

    /// Extraction failures, derived rather than stored.
    pub fn extraction_failures(&self) -> usize {
        self.fetched
            .saturating_sub(self.filtered_out)
            .saturating_sub(self.extracted)
            .saturating_sub(self.skipped)
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every fetched in-window record was extracted and analyzed
    Success,
    /// Some records failed extraction or analysis, others succeeded
    Partial,
    /// The run produced no results at all
    Failed,
}

/// One invocation of the pipeline for one search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRun {
    /// Correlation id of the search configuration
    pub config_id: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Stage counters
    pub counts: RunCounts,

    /// Listing pages lost to exhausted fetch retries
    pub lost_pages: usize,

    /// Terminal status; set by `close`
    pub status: RunStatus,
}

impl ExecutionRun {
    /// Open a run for the given configuration.
    pub fn start(config_id: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            counts: RunCounts::default(),
            lost_pages: 0,
            status: RunStatus::Failed,
        }
    }

    /// Record the scrape stage outcome.
    pub fn record_fetch(&mut self, fetched: usize, filtered_out: usize, lost_pages: usize) {
        self.counts.fetched = fetched;
        self.counts.filtered_out = filtered_out;
        self.lost_pages = lost_pages;
    }

    pub fn record_extracted(&mut self) {
        self.counts.extracted += 1;
    }

    pub fn record_analyzed(&mut self) {
        self.counts.analyzed += 1;
    }

    pub fn record_analysis_failed(&mut self) {
        self.counts.failed += 1;
    }

    /// A record left unprocessed because shutdown was requested.
    pub fn record_skipped(&mut self) {
        self.counts.skipped += 1;
    }

    /// Extraction failures implied by the counters.
    pub fn extraction_failures(&self) -> usize {
        self.counts.extraction_failures()
    }

    /// Total per-record failures in this run.
    pub fn failure_count(&self) -> usize {
        self.extraction_failures() + self.counts.failed
    }

    /// Close the run and derive its terminal status.
    ///
    /// Success requires zero per-record failures, zero lost pages and zero
    /// shutdown skips. A run with failures or leftovers but at least one
    /// analyzed case is partial; a run that produced nothing despite having
    /// work failed. A run that legitimately matched nothing closes as
    /// success.
    pub fn close(&mut self) -> RunStatus {
        self.finished_at = Some(Utc::now());
        debug_assert!(self.counts.is_consistent());

        let failures = self.failure_count();
        self.status = if failures == 0 && self.lost_pages == 0 && self.counts.skipped == 0 {
            RunStatus::Success
        } else if self.counts.analyzed > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };
        self.status
    }

    /// Close the run as failed with no partial credit. Used for
    /// unrecoverable per-configuration errors.
    pub fn abort(&mut self) {
        self.finished_at = Some(Utc::now());
        self.status = RunStatus::Failed;
    }
}
