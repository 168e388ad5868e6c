//! Date-window inclusion logic.
//!
//! The remote source accepts date parameters but its server-side filter has
//! proven unreliable, so inclusion is recomputed locally by default.
//! Trust-server mode keeps only a sanity check and is an explicit opt-in
//! optimization, not a correctness path.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::DateWindow;

/// Days of drift tolerated around the window in trust-server mode.
const TRUST_SERVER_SLACK_DAYS: u64 = 7;

/// How server-side and local date filtering are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFilterMode {
    /// Recompute inclusion from the record's own decision date. Records
    /// without a parsable date are excluded (and counted as filtered out).
    #[default]
    StrictLocal,
    /// Assume the server already filtered; reject only dates falling clearly
    /// outside the window (beyond a few days of slack). Records without a
    /// date pass.
    TrustServer,
}

/// Decides record inclusion for one resolved window.
#[derive(Debug, Clone, Copy)]
pub struct DateFilter {
    window: DateWindow,
    mode: DateFilterMode,
}

impl DateFilter {
    pub fn new(window: DateWindow, mode: DateFilterMode) -> Self {
        Self { window, mode }
    }

    pub fn window(&self) -> DateWindow {
        self.window
    }

    pub fn mode(&self) -> DateFilterMode {
        self.mode
    }

    /// Whether a record with this decision date belongs to the run.
    pub fn includes(&self, date: Option<NaiveDate>) -> bool {
        match (self.mode, date) {
            (DateFilterMode::StrictLocal, Some(date)) => self.window.contains(date),
            (DateFilterMode::StrictLocal, None) => false,
            (DateFilterMode::TrustServer, Some(date)) => self.padded_window().contains(date),
            (DateFilterMode::TrustServer, None) => true,
        }
    }

    /// The window widened by the trust-server slack on both ends.
    fn padded_window(&self) -> DateWindow {
        let slack = Days::new(TRUST_SERVER_SLACK_DAYS);
        DateWindow::new(
            self.window.from.and_then(|d| d.checked_sub_days(slack)),
            self.window.to.and_then(|d| d.checked_add_days(slack)),
        )
    }

    /// True when the page's trailing (oldest) parsed date has fallen below
    /// the window's lower bound. On a newest-first listing every later page
    /// is older still, so pagination may stop even when earlier rows on this
    /// page were in-window. Pages with no parsable dates never report
    /// exhaustion.
    pub fn page_exhausted(&self, dates: &[Option<NaiveDate>]) -> bool {
        dates
            .iter()
            .rev()
            .flatten()
            .next()
            .is_some_and(|last| self.window.below_lower_bound(*last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(Some(d("2024-03-01")), Some(d("2024-03-31")))
    }

    #[test]
    fn strict_local_rejects_out_of_window_dates() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        assert!(filter.includes(Some(d("2024-03-15"))));
        assert!(!filter.includes(Some(d("2024-02-29"))));
        assert!(!filter.includes(Some(d("2024-04-01"))));
        assert!(!filter.includes(Some(d("2019-01-01"))));
    }

    #[test]
    fn strict_local_excludes_missing_dates() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        assert!(!filter.includes(None));
    }

    #[test]
    fn trust_server_passes_missing_dates() {
        let filter = DateFilter::new(window(), DateFilterMode::TrustServer);
        assert!(filter.includes(None));
    }

    #[test]
    fn trust_server_still_rejects_obvious_outliers() {
        let filter = DateFilter::new(window(), DateFilterMode::TrustServer);
        assert!(!filter.includes(Some(d("2012-06-01"))));
        assert!(!filter.includes(Some(d("2024-01-15"))));
        assert!(filter.includes(Some(d("2024-03-02"))));
    }

    #[test]
    fn trust_server_tolerates_small_drift_strict_does_not() {
        let trust = DateFilter::new(window(), DateFilterMode::TrustServer);
        let strict = DateFilter::new(window(), DateFilterMode::StrictLocal);
        // Two days outside the window: within the trust-server slack.
        assert!(trust.includes(Some(d("2024-02-28"))));
        assert!(trust.includes(Some(d("2024-04-02"))));
        assert!(!strict.includes(Some(d("2024-02-28"))));
        assert!(!strict.includes(Some(d("2024-04-02"))));
    }

    #[test]
    fn page_exhausted_when_all_dates_below_lower_bound() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        assert!(filter.page_exhausted(&[Some(d("2024-02-20")), Some(d("2024-02-01"))]));
    }

    #[test]
    fn page_exhausted_once_trailing_date_falls_below() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        // Newest-first page that runs past the lower bound mid-page.
        assert!(filter.page_exhausted(&[
            Some(d("2024-03-05")),
            Some(d("2024-03-02")),
            Some(d("2024-02-20")),
        ]));
        assert!(filter.page_exhausted(&[Some(d("2024-03-05")), None, Some(d("2024-02-20"))]));
    }

    #[test]
    fn page_not_exhausted_while_trailing_date_in_window() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        assert!(!filter.page_exhausted(&[Some(d("2024-02-20")), Some(d("2024-03-05"))]));
        assert!(!filter.page_exhausted(&[Some(d("2024-03-05")), Some(d("2024-03-02"))]));
    }

    #[test]
    fn page_without_dates_never_exhausts() {
        let filter = DateFilter::new(window(), DateFilterMode::StrictLocal);
        assert!(!filter.page_exhausted(&[None, None]));
        assert!(!filter.page_exhausted(&[]));
    }

    #[test]
    fn open_lower_bound_never_exhausts() {
        let open = DateWindow::new(None, Some(d("2024-03-31")));
        let filter = DateFilter::new(open, DateFilterMode::StrictLocal);
        assert!(!filter.page_exhausted(&[Some(d("1999-01-01"))]));
    }
}
