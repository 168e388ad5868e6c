//! Search-result scraping for one search configuration.
//!
//! Walks the remote source's paginated listing sequentially: submit the
//! search form, parse each result page into raw case records, dedupe by
//! source identifier across pages, and apply the date filter per record.
//! With a newest-first listing and strict-local filtering, pagination stops
//! once a page's trailing records have fallen below the window's lower
//! bound.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::models::{
    DateWindow, RawCaseRecord, ResultOrder, ScraperConfig, SearchConfiguration, SearchCriteria,
};
use crate::pipeline::filter::{DateFilter, DateFilterMode};
use crate::services::session::SessionClient;

/// What one scrape pass produced, including its failure accounting.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    /// Deduplicated records that passed the date filter, listing order
    pub records: Vec<RawCaseRecord>,
    /// Listing pages successfully fetched and parsed
    pub pages_fetched: usize,
    /// Records excluded by the date filter (missing dates included)
    pub filtered_out: usize,
    /// Unique records seen before filtering
    pub fetched: usize,
    /// Pages lost to exhausted fetch retries
    pub lost_pages: usize,
}

/// Single-pass scraper. Create a fresh instance per execution run.
pub struct CaseScraper {
    session: Arc<SessionClient>,
    base_url: Url,
    config: ScraperConfig,
    filter: DateFilter,
    cancel: CancellationToken,
}

impl CaseScraper {
    pub fn new(
        session: Arc<SessionClient>,
        base_url: Url,
        config: ScraperConfig,
        filter: DateFilter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            base_url,
            config,
            filter,
            cancel,
        }
    }

    /// Run the search and walk result pages until exhaustion, the page cap,
    /// or a short-circuit. The search form itself failing is a run-level
    /// error; later page failures are absorbed as lost pages.
    pub async fn search(&self, search: &SearchConfiguration) -> Result<ScrapeOutcome> {
        let query_url = self.base_url.join("/cbo/query")?;
        let submit_url = self.base_url.join("/cbo/search")?;

        let form_page = self.session.get_text(query_url.as_str()).await?;
        let form_data = build_form_data(
            &search.criteria,
            self.filter.window(),
            &collect_hidden_inputs(&form_page),
        );

        log::info!(
            "[{}] submitting search ({} form fields)",
            search.id,
            form_data.len()
        );
        let mut page_html = self.session.post_form(submit_url.as_str(), &form_data).await?;

        let mut outcome = ScrapeOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            outcome.pages_fetched += 1;
            let page = parse_listing(&page_html, &self.base_url);
            let mut page_dates: Vec<Option<NaiveDate>> = Vec::new();

            let mut capped = false;
            for record in page.records {
                if !seen.insert(record.source_id.clone()) {
                    continue;
                }
                if self.filter.includes(record.decision_date) {
                    // Records past the cap stay uncounted: they were never
                    // part of this run.
                    if outcome.records.len() >= self.config.max_results {
                        capped = true;
                        break;
                    }
                    outcome.fetched += 1;
                    page_dates.push(record.decision_date);
                    outcome.records.push(record);
                } else {
                    outcome.fetched += 1;
                    page_dates.push(record.decision_date);
                    log::debug!(
                        "[{}] filtered out {} ({:?})",
                        search.id,
                        record.source_id,
                        record.decision_date
                    );
                    outcome.filtered_out += 1;
                }
            }

            if capped {
                log::info!("[{}] reached max_results cap", search.id);
                break;
            }
            if self.can_short_circuit() && self.filter.page_exhausted(&page_dates) {
                log::info!(
                    "[{}] page {} fully below window, stopping pagination early",
                    search.id,
                    outcome.pages_fetched
                );
                break;
            }
            if outcome.pages_fetched >= self.config.max_pages {
                log::info!("[{}] reached max_pages cap", search.id);
                break;
            }
            if self.cancel.is_cancelled() {
                log::warn!("[{}] shutdown requested, stopping pagination", search.id);
                break;
            }

            let Some(next_url) = page.next_page else {
                break;
            };
            match self.session.get_text(next_url.as_str()).await {
                Ok(html) => page_html = html,
                Err(error) => {
                    // The page and everything behind it is lost; keep what
                    // we have and let the run report it.
                    log::warn!("[{}] lost listing page {}: {}", search.id, next_url, error);
                    outcome.lost_pages += 1;
                    break;
                }
            }
        }

        log::info!(
            "[{}] scrape done: {} kept, {} filtered out, {} pages, {} lost",
            search.id,
            outcome.records.len(),
            outcome.filtered_out,
            outcome.pages_fetched,
            outcome.lost_pages
        );
        Ok(outcome)
    }

    /// Short-circuiting is only sound with strict-local filtering over a
    /// known newest-first listing.
    fn can_short_circuit(&self) -> bool {
        self.filter.mode() == DateFilterMode::StrictLocal
            && self.config.result_order == ResultOrder::Descending
    }
}

/// One parsed listing page.
struct ListingPage {
    records: Vec<RawCaseRecord>,
    next_page: Option<Url>,
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2})|(\d{2})\.(\d{2})\.(\d{4})").expect("date regex is valid")
    })
}

/// Parse the decision date out of a listing row's text. The source shows
/// ISO dates; a dotted variant appears on some older pages.
fn parse_row_date(text: &str) -> Option<NaiveDate> {
    let caps = date_regex().captures(text)?;
    if let Some(iso) = caps.get(1) {
        return iso.as_str().parse().ok();
    }
    let (day, month, year) = (caps.get(2)?, caps.get(3)?, caps.get(4)?);
    NaiveDate::from_ymd_opt(
        year.as_str().parse().ok()?,
        month.as_str().parse().ok()?,
        day.as_str().parse().ok()?,
    )
}

/// Derive the source-assigned identifier from a document URL
/// (last path segment, extension stripped).
fn extract_source_id(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let id = segment.split('.').next().unwrap_or(segment);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Parse a result listing page. Primary results are `doc` links inside
/// `info-list-value` cells; `powiazane` marks related-case links that must
/// not be collected. Rows missing fields degrade to `None`, never fail.
fn parse_listing(html: &str, base_url: &Url) -> ListingPage {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");

    let mut records = Vec::new();
    for link in document.select(&anchors) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !href.contains("doc") {
            continue;
        }

        let parent_classes: Vec<&str> = link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| p.value().classes().collect())
            .unwrap_or_default();
        if !parent_classes.contains(&"info-list-value") || parent_classes.contains(&"powiazane") {
            continue;
        }

        let Ok(url) = base_url.join(href) else {
            continue;
        };
        let Some(source_id) = extract_source_id(&url) else {
            continue;
        };

        let link_text: String = link.text().collect::<Vec<_>>().join(" ");
        let row_text = link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|p| p.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_else(|| link_text.clone());

        let signature_text = crate::services::signature::parse(&link_text)
            .or_else(|| crate::services::signature::parse(&row_text))
            .map(|sig| sig.to_string());

        records.push(RawCaseRecord {
            source_id,
            url: url.to_string(),
            signature_text,
            court: parse_court_name(&row_text),
            decision_date: parse_row_date(&row_text),
        });
    }

    ListingPage {
        records,
        next_page: find_next_page(&document, base_url),
    }
}

/// Pull the court name out of row text like "… - Wyrok WSA w Warszawie z …".
fn parse_court_name(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"\b(WSA w \p{L}+|NSA)\b").expect("court regex")
    });
    re.find(text).map(|m| m.as_str().to_string())
}

/// Find the next-page link: textual markers first ("następna", "dalej"),
/// then numbered pagination hrefs.
fn find_next_page(document: &Html, base_url: &Url) -> Option<Url> {
    let anchors = Selector::parse("a[href]").expect("static selector");
    const NEXT_MARKERS: &[&str] = &["następna", "dalej", "next", ">"];

    for link in document.select(&anchors) {
        let text = link
            .text()
            .collect::<String>()
            .trim()
            .to_lowercase();
        if NEXT_MARKERS.iter().any(|marker| text == *marker) {
            if let Some(href) = link.value().attr("href") {
                if let Ok(url) = base_url.join(href) {
                    return Some(url);
                }
            }
        }
    }

    for link in document.select(&anchors) {
        let href = link.value().attr("href")?;
        if href.contains("page=") || href.contains("strona=") {
            if let Ok(url) = base_url.join(href) {
                return Some(url);
            }
        }
    }
    None
}

/// Collect hidden inputs from the search form so the submission mirrors what
/// a browser would send.
fn collect_hidden_inputs(form_html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(form_html);
    let hidden = Selector::parse(r#"form input[type="hidden"]"#).expect("static selector");

    document
        .select(&hidden)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or("");
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Build the search submission matching the source's form structure:
/// browser-default fields, criteria overrides, checkbox "on" values, date
/// bounds, and the submit button value.
fn build_form_data(
    criteria: &SearchCriteria,
    window: DateWindow,
    hidden: &[(String, String)],
) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = hidden.to_vec();

    let mut set = |key: &str, value: String| {
        if let Some(entry) = form.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            form.push((key.to_string(), value));
        }
    };

    // Defaults the browser always sends.
    set("wszystkieSlowa", String::new());
    set("wystepowanie", "gdziekolwiek".into());
    set("sygnatura", String::new());
    set("sad", "dowolny".into());
    set("symbole", String::new());
    set("sedziowie", String::new());
    set("funkcja", "dowolna".into());
    set("rodzaj_organu", String::new());
    set("akty", String::new());
    set("przepisy", String::new());
    set("publikacje", String::new());
    set("glosy", String::new());

    if let Some(keywords) = &criteria.keywords {
        set("wszystkieSlowa", keywords.clone());
    }
    if let Some(court) = &criteria.court {
        set("sad", court.clone());
    }
    if let Some(symbol) = &criteria.case_symbol {
        set("symbole", symbol.clone());
    }
    if let Some(judgment_type) = &criteria.judgment_type {
        set("rodzaj", judgment_type.clone());
    }
    if let Some(tags) = &criteria.thematic_tags {
        // The form expects an exclamation-mark suffix on thematic tags.
        set("hasla", format!("{tags}!"));
    }
    if criteria.final_judgment {
        set("takPrawomocne", "on".into());
    }
    if criteria.with_justification {
        set("takUzasadnienie", "on".into());
    }

    if let Some(from) = window.from {
        set("odDaty", from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = window.to {
        set("doDaty", to.format("%Y-%m-%d").to_string());
    }

    set("submit", "Szukaj".into());
    form
}
