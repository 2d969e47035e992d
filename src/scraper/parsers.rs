use crate::error::{ExtractError, HarvestError};
use crate::models::{
    EXPERIENCE_SENTINEL, GRADE_SENTINEL, REMOTE_WORK_SENTINEL, Vacancy,
};
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};

// ── Structural signatures ─────────────────────────────────────────────────────

const CARD: &str = "div.vacancy-card--z_UXteNo7bRGzxWVcL7y.font-inter";

const PAGER: &str = "div.pager";
// Long result sets collapse the pager and render the last page number in a
// dedicated out-of-range item instead of a button per page.
const PAGER_LAST_PAGE: &str = "div.pager-item-not-in-short-range";
const PAGER_PAGE_LINK: &str = "a.bloko-button";

const DESCRIPTION: &str = r#"div[data-qa="vacancy-description"]"#;

// ── Field specs ───────────────────────────────────────────────────────────────

/// Where a field's value lives once its element is found.
enum ValueSource {
    Text,
    Attr(&'static str),
}

/// One column of the vacancy schema: selector, value source, and whether a
/// missing element is fatal for the card (`sentinel: None`) or substituted.
struct FieldSpec {
    name: &'static str,
    selector: &'static str,
    source: ValueSource,
    sentinel: Option<&'static str>,
}

const TITLE: FieldSpec = FieldSpec {
    name: "title",
    selector: "span.vacancy-name--c1Lay3KouCl7XasYakLk.serp-item__title-link",
    source: ValueSource::Text,
    sentinel: None,
};

const COMPANY: FieldSpec = FieldSpec {
    name: "company",
    selector: "span.company-info-text--vgvZouLtf8jwBmaD1xgp",
    source: ValueSource::Text,
    sentinel: None,
};

const CITY: FieldSpec = FieldSpec {
    name: "city",
    selector: r#"span[data-qa="vacancy-serp__vacancy-address"] span.fake-magritte-primary-text--Hdw8FvkOzzOcoR4xXWni"#,
    source: ValueSource::Text,
    sentinel: None,
};

const LINK: FieldSpec = FieldSpec {
    name: "link",
    selector: r#"a[target="_blank"]"#,
    source: ValueSource::Attr("href"),
    sentinel: None,
};

const EXPERIENCE: FieldSpec = FieldSpec {
    name: "experience",
    selector: r#"span[data-qa="vacancy-serp__vacancy-work-experience"]"#,
    source: ValueSource::Text,
    sentinel: Some(EXPERIENCE_SENTINEL),
};

const REMOTE_WORK: FieldSpec = FieldSpec {
    name: "remote_work",
    selector: r#"span[data-qa="vacancy-label-remote-work-schedule"]"#,
    source: ValueSource::Text,
    sentinel: Some(REMOTE_WORK_SENTINEL),
};

const GRADE: FieldSpec = FieldSpec {
    name: "grade",
    selector: "span.compensation-text--kTJ0_rp54B2vNeZ3CTt2",
    source: ValueSource::Text,
    sentinel: Some(GRADE_SENTINEL),
};

// ── Card extraction ───────────────────────────────────────────────────────────

/// Extract every vacancy card on a listing page. One malformed card yields
/// an `Err` entry without touching its siblings; a page without cards (a
/// valid empty result) yields an empty vec.
pub fn extract_vacancies(html: &str, now: NaiveDateTime) -> Vec<Result<Vacancy, ExtractError>> {
    let doc = Html::parse_document(html);
    let Ok(card_sel) = Selector::parse(CARD) else {
        return Vec::new();
    };

    doc.select(&card_sel)
        .map(|card| extract_card(card, now))
        .collect()
}

fn extract_card(card: ElementRef, now: NaiveDateTime) -> Result<Vacancy, ExtractError> {
    Ok(Vacancy {
        title: resolve_field(card, &TITLE)?,
        company: resolve_field(card, &COMPANY)?,
        experience: resolve_field(card, &EXPERIENCE)?,
        remote_work: resolve_field(card, &REMOTE_WORK)?,
        grade: resolve_field(card, &GRADE)?,
        city: resolve_field(card, &CITY)?,
        link: resolve_field(card, &LINK)?,
        scraped_at: now,
    })
}

fn resolve_field(card: ElementRef, spec: &FieldSpec) -> Result<String, ExtractError> {
    match lookup(card, spec) {
        Some(value) => Ok(value),
        None => spec
            .sentinel
            .map(str::to_string)
            .ok_or(ExtractError::RequiredFieldMissing(spec.name)),
    }
}

fn lookup(card: ElementRef, spec: &FieldSpec) -> Option<String> {
    let sel = Selector::parse(spec.selector).ok()?;
    let el = card.select(&sel).next()?;
    match spec.source {
        ValueSource::Text => {
            let text = el.text().collect::<String>().trim().to_string();
            if text.is_empty() { None } else { Some(text) }
        }
        ValueSource::Attr(attr) => el.value().attr(attr).map(str::to_string),
    }
}

// ── Pagination ────────────────────────────────────────────────────────────────

/// Total result-page count from a page-0 document.
///
/// No pager at all means zero results, which is a valid answer. With a
/// pager, the out-of-range last-page item wins when rendered; otherwise the
/// count of page-link buttons is the answer. A pager that fits neither
/// shape means the markup changed upstream and is reported, not defaulted.
pub fn parse_page_count(html: &str) -> Result<u32, HarvestError> {
    let doc = Html::parse_document(html);

    let pager_sel = Selector::parse(PAGER).map_err(|_| HarvestError::PaginationParse)?;
    let last_page_sel =
        Selector::parse(PAGER_LAST_PAGE).map_err(|_| HarvestError::PaginationParse)?;
    let link_sel = Selector::parse(PAGER_PAGE_LINK).map_err(|_| HarvestError::PaginationParse)?;
    let span_sel = Selector::parse("span").map_err(|_| HarvestError::PaginationParse)?;

    let Some(pager) = doc.select(&pager_sel).next() else {
        return Ok(0);
    };

    if let Some(item) = pager.select(&last_page_sel).next() {
        return item
            .select(&span_sel)
            .next()
            .and_then(|span| span.text().collect::<String>().trim().parse().ok())
            .ok_or(HarvestError::PaginationParse);
    }

    Ok(pager.select(&link_sel).count() as u32)
}

// ── Detail page ───────────────────────────────────────────────────────────────

/// Raw text of the posting description block, if the page has one.
pub fn parse_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(DESCRIPTION).ok()?;
    let block = doc.select(&sel).next()?;
    Some(block.text().collect::<String>())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
