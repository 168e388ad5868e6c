//! Search configuration: one recurring subscriber query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A resolved, inclusive date window. Either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// True when the date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(from) = self.from {
            if date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if date > to {
                return false;
            }
        }
        true
    }

    /// True when the date is strictly below the lower bound. Open lower
    /// bounds never report exhaustion.
    pub fn below_lower_bound(&self, date: NaiveDate) -> bool {
        self.from.is_some_and(|from| date < from)
    }
}

/// How a search configuration describes its target date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateWindowSpec {
    /// Explicit start/end, either bound optional
    Range {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Everything published since the previous scheduled run
    SinceLastRun { last_run: NaiveDate },
}

impl DateWindowSpec {
    /// Resolve the spec into a concrete window for this run.
    pub fn resolve(&self, today: NaiveDate) -> DateWindow {
        match *self {
            DateWindowSpec::Range { from, to } => DateWindow::new(from, to),
            DateWindowSpec::SinceLastRun { last_run } => {
                DateWindow::new(Some(last_run), Some(today))
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let DateWindowSpec::Range {
            from: Some(from),
            to: Some(to),
        } = self
        {
            if from > to {
                return Err(AppError::config(format!(
                    "date window start {from} is after end {to}"
                )));
            }
        }
        Ok(())
    }
}

/// Free-form query criteria mapped onto the remote search form.
/// Every field is optional; empty criteria is a valid "everything new" query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Full-text keywords ("wszystkieSlowa")
    #[serde(default)]
    pub keywords: Option<String>,

    /// Court restriction ("sad"), e.g. a specific WSA
    #[serde(default)]
    pub court: Option<String>,

    /// Case symbol filter ("symbole"), e.g. "6110"
    #[serde(default)]
    pub case_symbol: Option<String>,

    /// Judgment type ("rodzaj"): Wyrok, Postanowienie, Uchwała
    #[serde(default)]
    pub judgment_type: Option<String>,

    /// Thematic tag ("hasla")
    #[serde(default)]
    pub thematic_tags: Option<String>,

    /// Only final (prawomocne) judgments
    #[serde(default)]
    pub final_judgment: bool,

    /// Only judgments carrying a written justification
    #[serde(default)]
    pub with_justification: bool,
}

/// One recurring subscriber query: criteria plus a date-range spec plus the
/// identifier used to correlate results back to subscribers. Immutable for
/// the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfiguration {
    /// Correlation identifier owned by the caller
    pub id: String,

    /// Human-readable name for logs and reports
    #[serde(default)]
    pub name: String,

    /// Query criteria
    #[serde(default)]
    pub criteria: SearchCriteria,

    /// Target date range
    pub window: DateWindowSpec,
}

impl SearchConfiguration {
    /// Validate the configuration. Failure aborts only this
    /// configuration's run.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::config("search configuration id is empty"));
        }
        self.window.validate()
    }

    /// Load an ordered set of search configurations from a JSON file.
    pub fn load_all(path: impl AsRef<std::path::Path>) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn window_contains_bounds_inclusive() {
        let w = DateWindow::new(Some(d("2024-01-01")), Some(d("2024-01-31")));
        assert!(w.contains(d("2024-01-01")));
        assert!(w.contains(d("2024-01-31")));
        assert!(!w.contains(d("2023-12-31")));
        assert!(!w.contains(d("2024-02-01")));
    }

    #[test]
    fn open_bounds_accept_everything_on_that_side() {
        let w = DateWindow::new(None, Some(d("2024-01-31")));
        assert!(w.contains(d("1990-06-15")));
        assert!(!w.below_lower_bound(d("1990-06-15")));
    }

    #[test]
    fn since_last_run_resolves_to_closed_window() {
        let spec = DateWindowSpec::SinceLastRun {
            last_run: d("2024-03-04"),
        };
        let w = spec.resolve(d("2024-03-11"));
        assert_eq!(w.from, Some(d("2024-03-04")));
        assert_eq!(w.to, Some(d("2024-03-11")));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = SearchConfiguration {
            id: "sub-1".into(),
            name: String::new(),
            criteria: SearchCriteria::default(),
            window: DateWindowSpec::Range {
                from: Some(d("2024-02-01")),
                to: Some(d("2024-01-01")),
            },
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_id_is_rejected() {
        let config = SearchConfiguration {
            id: "  ".into(),
            name: String::new(),
            criteria: SearchCriteria::default(),
            window: DateWindowSpec::Range {
                from: None,
                to: None,
            },
        };
        assert!(config.validate().is_err());
    }
}
