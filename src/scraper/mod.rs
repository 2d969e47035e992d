pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::error::{FetchError, HarvestError};
use crate::models::Vacancy;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use self::http_client::HttpClient;

// ── Source trait ──────────────────────────────────────────────────────────────

/// What one page task produced: the extracted records plus how many cards
/// were dropped for missing required fields.
#[derive(Debug, Default)]
pub struct PageHarvest {
    pub vacancies: Vec<Vacancy>,
    pub skipped: usize,
}

/// Swappable catalog abstraction.
#[async_trait]
pub trait VacancySource: Send + Sync {
    /// Number of result pages for a filter. Costs one probe of page 0.
    async fn page_count(&self, filter_text: &str) -> Result<u32, HarvestError>;

    /// Fetch page `page` and extract every vacancy card on it.
    async fn harvest_page(&self, filter_text: &str, page: u32) -> Result<PageHarvest, FetchError>;
}

// ── hh scraper ────────────────────────────────────────────────────────────────

pub struct HhScraper {
    client: HttpClient,
    endpoint: String,
}

impl HhScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Query string for the listing endpoint. Pages are 0-based.
    fn listing_query(filter_text: &str, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("text", filter_text.to_string()),
            ("page", page.to_string()),
        ]
    }

    /// Fetch one posting's detail page and return its normalized
    /// description text. Single item, never part of a scrape run.
    pub async fn fetch_details(&self, url: &str) -> Result<String, HarvestError> {
        let html = self.client.get_text(url, &[]).await?;
        let raw = parsers::parse_description(&html).ok_or_else(|| {
            HarvestError::DescriptionMissing {
                url: url.to_string(),
            }
        })?;
        Ok(cleaner::normalize_description(&raw))
    }

    /// Cards link with site-relative hrefs; store absolute URLs.
    fn absolutize(&self, href: &str) -> String {
        if Url::parse(href).is_ok() {
            return href.to_string();
        }
        Url::parse(&self.endpoint)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

#[async_trait]
impl VacancySource for HhScraper {
    async fn page_count(&self, filter_text: &str) -> Result<u32, HarvestError> {
        let html = self
            .client
            .get_text(&self.endpoint, &Self::listing_query(filter_text, 0))
            .await?;
        parsers::parse_page_count(&html)
    }

    async fn harvest_page(&self, filter_text: &str, page: u32) -> Result<PageHarvest, FetchError> {
        let html = self
            .client
            .get_text(&self.endpoint, &Self::listing_query(filter_text, page))
            .await?;

        let now = Utc::now().naive_utc();
        let mut harvest = PageHarvest::default();

        for extracted in parsers::extract_vacancies(&html, now) {
            match extracted {
                Ok(mut vacancy) => {
                    vacancy.link = self.absolutize(&vacancy.link);
                    harvest.vacancies.push(vacancy);
                }
                Err(e) => {
                    warn!("Page {}: skipping card: {}", page, e);
                    harvest.skipped += 1;
                }
            }
        }

        debug!(
            "Page {}: {} vacancies, {} skipped",
            page,
            harvest.vacancies.len(),
            harvest.skipped
        );
        Ok(harvest)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn scraper() -> HhScraper {
        HhScraper::new(&AppConfig::default().scraper).unwrap()
    }

    #[test]
    fn relative_links_are_joined_against_the_endpoint() {
        let s = scraper();
        assert_eq!(
            s.absolutize("/vacancy/12345"),
            "https://hh.ru/vacancy/12345"
        );
    }

    #[test]
    fn absolute_links_pass_through() {
        let s = scraper();
        assert_eq!(
            s.absolutize("https://example.org/vacancy/1"),
            "https://example.org/vacancy/1"
        );
    }
}
