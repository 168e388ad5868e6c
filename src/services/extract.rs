//! Document download and text normalization.
//!
//! The remote source serves each judgment as a case page with a downloadable
//! RTF document; some older entries only carry the text inline as HTML.
//! Either way the output is plain text with paragraph breaks and Polish
//! diacritics intact. Encodings are detected (UTF-8 or Windows-1250), never
//! assumed.

use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1250};
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, ExtractionReason, Result};
use crate::models::{NormalizedCaseText, RawCaseRecord};
use crate::services::session::SessionClient;
use crate::services::signature;

/// Downloads one record's document and produces normalized plain text.
pub struct DocumentExtractor {
    session: Arc<SessionClient>,
    base_url: Url,
}

impl DocumentExtractor {
    pub fn new(session: Arc<SessionClient>, base_url: Url) -> Self {
        Self { session, base_url }
    }

    /// Extract one record. Errors are per-record: the caller counts them and
    /// continues with the remaining records.
    pub async fn extract(&self, record: &RawCaseRecord) -> Result<NormalizedCaseText> {
        let page = self
            .session
            .get_text(&record.url)
            .await
            .map_err(|e| download_failed(&record.url, e))?;

        let text = match find_document_link(&page, &self.base_url) {
            Some(doc_url) => {
                let bytes = self
                    .session
                    .get_bytes(doc_url.as_str())
                    .await
                    .map_err(|e| download_failed(doc_url.as_str(), e))?;
                document_to_text(&bytes)
                    .ok_or_else(|| AppError::extraction(doc_url.as_str(), ExtractionReason::UnsupportedFormat))?
            }
            // No download link: fall back to the case page body itself.
            None => html_to_text(&page),
        };

        if text.trim().is_empty() {
            return Err(AppError::extraction(&record.url, ExtractionReason::EmptyBody));
        }

        Ok(NormalizedCaseText {
            source_id: record.source_id.clone(),
            signature: signature::parse_with_fallback(record.signature_text.as_deref(), &text),
            decision_date: record.decision_date,
            text,
        })
    }
}

fn download_failed(url: &str, error: AppError) -> AppError {
    log::warn!("document download failed for {url}: {error}");
    AppError::extraction(url, ExtractionReason::DownloadFailed)
}

/// Locate the judgment download link on a case page. The source labels it
/// with an "rtf" href or a "pobierz" anchor text.
fn find_document_link(page_html: &str, base_url: &Url) -> Option<Url> {
    let document = Html::parse_document(page_html);
    let anchors = Selector::parse("a[href]").expect("static selector");

    for link in document.select(&anchors) {
        let href = link.value().attr("href")?;
        let text = link.text().collect::<String>().to_lowercase();
        if href.to_lowercase().contains("rtf")
            || text.contains("rtf")
            || text.contains("pobierz")
            || text.contains("download")
        {
            if let Ok(resolved) = base_url.join(href) {
                return Some(resolved);
            }
        }
    }
    None
}

/// Convert downloaded document bytes to plain text, sniffing the format.
/// Returns `None` for formats we cannot handle.
fn document_to_text(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(b"{\\rtf") {
        return Some(rtf_to_text(bytes));
    }

    let decoded = decode_bytes(bytes);
    let trimmed = decoded.trim_start();
    if trimmed.starts_with('<') {
        return Some(html_to_text(&decoded));
    }
    // Binary blobs (PDF, DOC) are not supported.
    if bytes.starts_with(b"%PDF") || bytes.starts_with(&[0xD0, 0xCF]) {
        return None;
    }
    Some(normalize_text(&decoded))
}

/// Decode raw bytes as UTF-8 when valid, otherwise as Windows-1250 (the
/// legacy Polish codepage the source still serves for older documents).
fn decode_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => WINDOWS_1250.decode(bytes).0.into_owned(),
    }
}

/// Extract visible text from an HTML document.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    // Leaf-level blocks only; nested containers would duplicate their text.
    let blocks = Selector::parse("p, li, h1, h2, h3").expect("static selector");

    // Collect text per block element to keep paragraph boundaries; fall back
    // to the whole tree when the page has no block structure.
    let mut paragraphs: Vec<String> = Vec::new();
    for block in document.select(&blocks) {
        let text: String = block.text().collect::<Vec<_>>().join(" ");
        let text = collapse_spaces(&text);
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    if paragraphs.is_empty() {
        let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
        return normalize_text(&text);
    }
    paragraphs.dedup();
    normalize_text(&paragraphs.join("\n"))
}

/// RTF destination groups whose content is metadata, not body text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "themedata",
    "generator",
    "header",
    "footer",
];

/// Strip RTF control sequences down to plain text.
///
/// Handles the escapes the source actually emits: `\'xx` codepage bytes
/// (decoded per the document's `\ansicpgN`), `\uN` unicode words with
/// `\ucN` fallback skipping, `\par`/`\line` paragraph breaks, and skipped
/// destination groups (`\*`, font/color tables, embedded pictures).
pub fn rtf_to_text(bytes: &[u8]) -> String {
    let encoding = detect_rtf_codepage(bytes);
    let mut out = String::new();
    let mut depth: usize = 0;
    let mut skip_from: Option<usize> = None;
    let mut uc_skip: usize = 1;
    let mut pending_skip: usize = 0;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
                if skip_from.is_none() && is_skipped_destination(&bytes[i..]) {
                    skip_from = Some(depth);
                }
            }
            b'}' => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'\\' => {
                i += 1;
                if i >= bytes.len() {
                    break;
                }
                match bytes[i] {
                    b'\'' => {
                        // \'hh codepage byte
                        if i + 2 < bytes.len() {
                            let hex = &bytes[i + 1..i + 3];
                            if let Some(byte) = parse_hex_byte(hex) {
                                if skip_from.is_none() {
                                    if pending_skip > 0 {
                                        pending_skip -= 1;
                                    } else {
                                        out.push_str(&encoding.decode(&[byte]).0);
                                    }
                                }
                            }
                            i += 3;
                        } else {
                            i = bytes.len();
                        }
                    }
                    b'\\' | b'{' | b'}' => {
                        if skip_from.is_none() && pending_skip == 0 {
                            out.push(bytes[i] as char);
                        } else if pending_skip > 0 {
                            pending_skip -= 1;
                        }
                        i += 1;
                    }
                    b'~' => {
                        if skip_from.is_none() {
                            out.push(' ');
                        }
                        i += 1;
                    }
                    b'*' => {
                        // \* introduces an ignorable destination
                        if skip_from.is_none() {
                            skip_from = Some(depth);
                        }
                        i += 1;
                    }
                    c if c.is_ascii_alphabetic() => {
                        let (word, param, consumed) = read_control_word(&bytes[i..]);
                        i += consumed;
                        if skip_from.is_some() {
                            continue;
                        }
                        match word.as_str() {
                            "par" | "line" | "sect" | "page" => out.push('\n'),
                            "tab" | "cell" => out.push('\t'),
                            "emdash" => out.push('—'),
                            "endash" => out.push('–'),
                            "uc" => uc_skip = param.unwrap_or(1).max(0) as usize,
                            "u" => {
                                if let Some(value) = param {
                                    let code = if value < 0 { value + 65536 } else { value };
                                    if let Some(ch) = char::from_u32(code as u32) {
                                        out.push(ch);
                                    }
                                    pending_skip = uc_skip;
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => {
                        i += 1;
                    }
                }
            }
            b'\r' | b'\n' => {
                i += 1;
            }
            byte => {
                if skip_from.is_none() {
                    if pending_skip > 0 {
                        pending_skip -= 1;
                    } else if byte < 0x80 {
                        out.push(byte as char);
                    } else {
                        out.push_str(&encoding.decode(&[byte]).0);
                    }
                }
                i += 1;
            }
        }
    }

    normalize_text(&out)
}

/// Read an RTF control word (letters + optional signed integer parameter +
/// one optional delimiting space). Returns the word, its parameter, and the
/// number of bytes consumed.
fn read_control_word(bytes: &[u8]) -> (String, Option<i32>, usize) {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let word = String::from_utf8_lossy(&bytes[..i]).into_owned();

    let param_start = i;
    if i < bytes.len() && bytes[i] == b'-' {
        i += 1;
    }
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let param = if i > param_start {
        std::str::from_utf8(&bytes[param_start..i])
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
    } else {
        None
    };

    // Control words are delimited by a single space that belongs to the word.
    if i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    (word, param, i)
}

fn is_skipped_destination(rest: &[u8]) -> bool {
    if !rest.starts_with(b"\\") {
        return false;
    }
    let rest = &rest[1..];
    if rest.starts_with(b"*") {
        return true;
    }
    SKIPPED_DESTINATIONS.iter().any(|dest| {
        rest.starts_with(dest.as_bytes())
            && rest
                .get(dest.len())
                .map_or(true, |b| !b.is_ascii_alphabetic())
    })
}

fn parse_hex_byte(hex: &[u8]) -> Option<u8> {
    let s = std::str::from_utf8(hex).ok()?;
    u8::from_str_radix(s, 16).ok()
}

fn detect_rtf_codepage(bytes: &[u8]) -> &'static Encoding {
    // \ansicpgN appears in the header; scan a bounded prefix.
    let prefix = &bytes[..bytes.len().min(256)];
    let prefix = String::from_utf8_lossy(prefix);
    if let Some(pos) = prefix.find("\\ansicpg") {
        let digits: String = prefix[pos + 8..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        match digits.as_str() {
            "65001" => return UTF_8,
            "1250" | "" => return WINDOWS_1250,
            other => {
                if let Some(enc) = Encoding::for_label(format!("windows-{other}").as_bytes()) {
                    return enc;
                }
            }
        }
    }
    WINDOWS_1250
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse horizontal whitespace per line and runs of blank lines, keeping
/// paragraph boundaries.
fn normalize_text(s: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_pending = false;
    for line in s.lines() {
        let line = collapse_spaces(line);
        if line.is_empty() {
            blank_pending = !lines.is_empty();
        } else {
            if blank_pending {
                lines.push(String::new());
                blank_pending = false;
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtf_preserves_polish_diacritics_from_cp1250_escapes() {
        // "Wyrok sądu" with ą as CP1250 0xB9, plus every Polish letter as an escape.
        let rtf = b"{\\rtf1\\ansi\\ansicpg1250 Wyrok s\\'b9du: \\'b9\\'e6\\'ea\\'b3\\'f1\\'f3\\'9c\\'9f\\'bf\\par}";
        let text = rtf_to_text(rtf);
        assert_eq!(text, "Wyrok sądu: ąćęłńóśźż");
    }

    #[test]
    fn rtf_unicode_escapes_with_fallback_skip() {
        let rtf = b"{\\rtf1\\ansi\\uc1 \\u322?\\u243?dka\\par}";
        assert_eq!(rtf_to_text(rtf), "łódka");
    }

    #[test]
    fn rtf_paragraph_breaks_survive() {
        let rtf = b"{\\rtf1\\ansi\\ansicpg1250 Sentencja\\par\\par Uzasadnienie\\par tekst}";
        let text = rtf_to_text(rtf);
        assert_eq!(text, "Sentencja\n\nUzasadnienie\ntekst");
    }

    #[test]
    fn rtf_font_table_and_ignorable_groups_are_dropped() {
        let rtf = b"{\\rtf1\\ansi{\\fonttbl{\\f0 Times New Roman;}}{\\*\\generator Riched20;}body text}";
        assert_eq!(rtf_to_text(rtf), "body text");
    }

    #[test]
    fn rtf_escaped_braces_and_backslashes() {
        let rtf = b"{\\rtf1\\ansi a \\{b\\} c\\\\d}";
        assert_eq!(rtf_to_text(rtf), "a {b} c\\d");
    }

    #[test]
    fn unsupported_binary_is_rejected() {
        assert!(document_to_text(b"%PDF-1.4 binary").is_none());
    }

    #[test]
    fn plain_utf8_text_passes_through() {
        let text = document_to_text("Wyrok s\u{105}du".as_bytes()).unwrap();
        assert_eq!(text, "Wyrok sądu");
    }

    #[test]
    fn cp1250_plain_text_is_decoded() {
        // "żółw" in Windows-1250
        let bytes = [0xBF, 0xF3, 0xB3, b'w'];
        let text = document_to_text(&bytes).unwrap();
        assert_eq!(text, "żółw");
    }

    #[test]
    fn html_text_extraction_keeps_paragraphs() {
        let html = "<html><body><p>Sygn. akt II SA/Wa 123/24</p><p>Uzasadnienie</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("Sygn. akt II SA/Wa 123/24"));
        assert!(text.contains('\n'));
        assert!(text.contains("Uzasadnienie"));
    }

    #[test]
    fn normalize_collapses_whitespace_but_keeps_blank_lines() {
        let input = "  a   b \n\n\n c  \n";
        assert_eq!(normalize_text(input), "a b\n\nc");
    }

    #[test]
    fn detects_utf8_codepage_marker() {
        let rtf = b"{\\rtf1\\ansi\\ansicpg65001 abc}";
        assert_eq!(detect_rtf_codepage(rtf), UTF_8);
    }
}
