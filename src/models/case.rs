//! Case record entities flowing through the pipeline.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Structured Polish court case-reference identifier,
/// e.g. `II SA/Wa 123/24`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSignature {
    /// Chamber/division ordinal in roman numerals ("II")
    pub chamber: String,

    /// Court-type code ("SA", "FSK", "OSK")
    pub court: String,

    /// Local division suffix ("Wa" in "SA/Wa"), absent for NSA signatures
    pub division: Option<String>,

    /// Sequential case number within the year
    pub number: u32,

    /// Two-digit registration year
    pub year: u16,
}

impl fmt::Display for CaseSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.division {
            Some(div) => write!(
                f,
                "{} {}/{} {}/{:02}",
                self.chamber, self.court, div, self.number, self.year
            ),
            None => write!(
                f,
                "{} {} {}/{:02}",
                self.chamber, self.court, self.number, self.year
            ),
        }
    }
}

/// One search-result entry as listed by the remote source. All listing
/// metadata is optional: the source guarantees no schema, so missing fields
/// become `None` rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCaseRecord {
    /// Source-assigned identifier derived from the document URL.
    /// Dedup key within a run.
    pub source_id: String,

    /// Absolute URL of the case page
    pub url: String,

    /// Signature text as shown in the listing, if any
    pub signature_text: Option<String>,

    /// Court name from the listing row, if present
    pub court: Option<String>,

    /// Decision date parsed from the listing row, if present
    pub decision_date: Option<NaiveDate>,
}

/// Plain-text judgment body plus identifying metadata.
/// Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedCaseText {
    /// Source identifier of the originating record
    pub source_id: String,

    /// Normalized plain-text body
    pub text: String,

    /// Parsed case signature; `None` is a valid unidentified record
    pub signature: Option<CaseSignature>,

    /// Decision date carried over from the listing
    pub decision_date: Option<NaiveDate>,
}

/// Terminal per-case status of the analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    AnalysisFailed,
}

/// Terminal entity of the pipeline: normalized text plus the AI summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedCase {
    /// The normalized case this summary belongs to
    #[serde(flatten)]
    pub case: NormalizedCaseText,

    /// AI-generated summary; absent when analysis failed
    pub summary: Option<String>,

    /// Outcome of the analysis stage
    pub status: AnalysisStatus,
}

impl AnalyzedCase {
    pub fn succeeded(&self) -> bool {
        self.status == AnalysisStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_display_with_division() {
        let sig = CaseSignature {
            chamber: "II".into(),
            court: "SA".into(),
            division: Some("Wa".into()),
            number: 123,
            year: 24,
        };
        assert_eq!(sig.to_string(), "II SA/Wa 123/24");
    }

    #[test]
    fn signature_display_without_division() {
        let sig = CaseSignature {
            chamber: "I".into(),
            court: "FSK".into(),
            division: None,
            number: 625,
            year: 24,
        };
        assert_eq!(sig.to_string(), "I FSK 625/24");
    }

    #[test]
    fn signature_display_pads_year() {
        let sig = CaseSignature {
            chamber: "III".into(),
            court: "FZ".into(),
            division: None,
            number: 113,
            year: 5,
        };
        assert_eq!(sig.to_string(), "III FZ 113/05");
    }
}
