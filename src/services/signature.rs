//! Polish case-signature parsing.
//!
//! Signatures look like `II SA/Wa 123/24` (chamber in roman numerals, court
//! code, optional division suffix, sequential number, two-digit year). They
//! appear in listing link text, in "Sygn. akt" lines of the judgment body,
//! and occasionally only in raw RTF. A record without a recognizable
//! signature is valid but unidentified, so parsing returns `Option`, never
//! an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::CaseSignature;

fn signature_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // chamber: roman numerals; court: 2-4 uppercase letters;
        // division: optional /Xx suffix; number/year: digits.
        Regex::new(r"\b([IVX]+)\s+([A-Z]{2,4})(?:/([A-Za-z]{1,4}))?\s+(\d{1,6})/(\d{2})\b")
            .expect("signature regex is valid")
    })
}

/// Parse the first case signature found in the given text.
pub fn parse(text: &str) -> Option<CaseSignature> {
    let caps = signature_regex().captures(text)?;

    let number: u32 = caps[4].parse().ok()?;
    let year: u16 = caps[5].parse().ok()?;

    Some(CaseSignature {
        chamber: caps[1].to_string(),
        court: caps[2].to_string(),
        division: caps.get(3).map(|m| m.as_str().to_string()),
        number,
        year,
    })
}

/// Parse a signature from structured metadata first, falling back to free
/// text (e.g. the extracted judgment body).
pub fn parse_with_fallback(metadata: Option<&str>, text: &str) -> Option<CaseSignature> {
    metadata.and_then(parse).or_else(|| parse(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signature_with_division() {
        let sig = parse("II SA/Wa 123/24").unwrap();
        assert_eq!(sig.chamber, "II");
        assert_eq!(sig.court, "SA");
        assert_eq!(sig.division.as_deref(), Some("Wa"));
        assert_eq!(sig.number, 123);
        assert_eq!(sig.year, 24);
    }

    #[test]
    fn parses_signature_without_division() {
        let sig = parse("I FSK 625/24").unwrap();
        assert_eq!(sig.chamber, "I");
        assert_eq!(sig.court, "FSK");
        assert_eq!(sig.division, None);
        assert_eq!(sig.number, 625);
        assert_eq!(sig.year, 24);
    }

    #[test]
    fn parses_signature_embedded_in_text() {
        let text = "Wyrok z dnia 12 marca 2024 r., Sygn. akt III FZ 113/25 - Wyrok NSA";
        let sig = parse(text).unwrap();
        assert_eq!(sig.to_string(), "III FZ 113/25");
    }

    #[test]
    fn non_signature_text_yields_none() {
        assert!(parse("not a signature").is_none());
        assert!(parse("").is_none());
        assert!(parse("Wyrok z dnia 12 marca 2024").is_none());
    }

    #[test]
    fn listing_decoration_is_ignored() {
        let sig = parse("I SA/Gl 81/25 - Wyrok WSA w Gliwicach").unwrap();
        assert_eq!(sig.chamber, "I");
        assert_eq!(sig.court, "SA");
        assert_eq!(sig.division.as_deref(), Some("Gl"));
        assert_eq!(sig.number, 81);
        assert_eq!(sig.year, 25);
    }

    #[test]
    fn metadata_takes_precedence_over_text() {
        let sig = parse_with_fallback(Some("II OSK 40/24"), "I SA/Po 188/25").unwrap();
        assert_eq!(sig.court, "OSK");
    }

    #[test]
    fn falls_back_to_body_text() {
        let sig = parse_with_fallback(Some("no signature here"), "Sygn. akt I SA/Po 188/25");
        assert_eq!(sig.unwrap().to_string(), "I SA/Po 188/25");
    }
}
