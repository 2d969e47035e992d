//! Scrape orchestrator: ties scraper → storage together.
//!
//! One run walks the whole result set for a filter:
//!   1. Probe page 0 for the result-page count (fatal if unreadable)
//!   2. Fan out one bounded task per page; fetch with retry, extract cards
//!   3. Aggregate every record from every page that survived
//!   4. Replace the stored snapshot in a single transaction
//!
//! A failed page or a malformed card only lowers the harvest; it never
//! aborts the run. Only the page-count probe and the final write are fatal.

use crate::config::AppConfig;
use crate::scraper::{HhScraper, PageHarvest, VacancySource};
use crate::storage::Repository;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, filter_text: &str) -> Result<RunStats> {
        let repo = Repository::open(&self.config.storage.db_path)
            .context("Failed to open DuckDB")?;

        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let scraper = Arc::new(
            HhScraper::new(&self.config.scraper).context("Failed to build scraper")?,
        );

        self.run_with(scraper, &repo, filter_text).await
    }

    /// Run against any source/repository pair. The source trait is the
    /// test seam.
    pub async fn run_with(
        &self,
        source: Arc<dyn VacancySource>,
        repo: &Repository,
        filter_text: &str,
    ) -> Result<RunStats> {
        let run_id = repo.begin_scrape_run().unwrap_or(0);

        // ── 1. Resolve page count ─────────────────────────────────────────────
        info!("=== Step 1: Resolving page count for {:?} ===", filter_text);
        let pages = match source.page_count(filter_text).await {
            Ok(n) => n,
            Err(e) => {
                repo.finish_scrape_run(run_id, 0, 0, 0, 0, Some(&e.to_string()))
                    .ok();
                return Err(anyhow::Error::new(e).context("Page count probe failed"));
            }
        };
        info!("{} result pages", pages);

        // ── 2. Fetch + extract every page concurrently ────────────────────────
        info!("=== Step 2: Harvesting {} pages ===", pages);

        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency));
        let mut handles = Vec::new();

        for page in 0..pages {
            let source = Arc::clone(&source);
            let sem = Arc::clone(&sem);
            let filter = filter_text.to_string();
            let retries = self.config.pipeline.max_retries;
            let base = self.config.pipeline.retry_base_ms;

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;

                let strategy = ExponentialBackoff::from_millis(2)
                    .factor(base)
                    .map(jitter)
                    .take(retries);

                let harvest = Retry::spawn(strategy, || source.harvest_page(&filter, page))
                    .await
                    .with_context(|| format!("harvest_page({page})"))?;

                Ok::<PageHarvest, anyhow::Error>(harvest)
            });

            handles.push((page, handle));
        }

        // ── 3. Aggregate ──────────────────────────────────────────────────────
        let mut vacancies = Vec::new();
        let mut pages_failed = 0usize;
        let mut cards_skipped = 0usize;

        for (page, handle) in handles {
            match handle.await {
                Ok(Ok(harvest)) => {
                    cards_skipped += harvest.skipped;
                    vacancies.extend(harvest.vacancies);
                }
                Ok(Err(e)) => {
                    warn!("Page {}: {:#}", page, e);
                    pages_failed += 1;
                }
                Err(e) => {
                    error!("Task panic for page {}: {}", page, e);
                    pages_failed += 1;
                }
            }
        }

        // ── 4. Replace the snapshot ───────────────────────────────────────────
        let persisted = match repo.replace_all_vacancies(&vacancies) {
            Ok(n) => n,
            Err(e) => {
                repo.finish_scrape_run(
                    run_id,
                    pages as usize,
                    pages_failed,
                    cards_skipped,
                    0,
                    Some(&e.to_string()),
                )
                .ok();
                return Err(anyhow::Error::new(e).context("Replace-all write failed"));
            }
        };

        let stats = RunStats {
            pages_total: pages as usize,
            pages_failed,
            cards_skipped,
            records_persisted: persisted,
        };

        repo.finish_scrape_run(
            run_id,
            stats.pages_total,
            stats.pages_failed,
            stats.cards_skipped,
            stats.records_persisted,
            None,
        )
        .ok();

        info!(
            "=== Done: {} pages ({} failed) | {} cards skipped | {} records persisted ===",
            stats.pages_total, stats.pages_failed, stats.cards_skipped, stats.records_persisted,
        );

        Ok(stats)
    }
}

#[derive(Debug)]
pub struct RunStats {
    pub pages_total: usize,
    pub pages_failed: usize,
    pub cards_skipped: usize,
    pub records_persisted: usize,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, HarvestError};
    use crate::models::{GRADE_SENTINEL, Vacancy};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    /// Canned catalog: `pages` pages of two cards each, with selectable
    /// probe/page failures and one card carrying the grade sentinel.
    struct StubSource {
        pages: u32,
        fail_probe: bool,
        fail_pages: Vec<u32>,
        sentinel_card: Option<(u32, usize)>,
    }

    impl StubSource {
        fn vacancy(&self, page: u32, card: usize) -> Vacancy {
            let grade = if self.sentinel_card == Some((page, card)) {
                GRADE_SENTINEL.to_string()
            } else {
                "4000 EUR".to_string()
            };
            Vacancy {
                title: format!("p{page}-c{card}"),
                company: "Initech".to_string(),
                experience: "1-3 years".to_string(),
                remote_work: "remote".to_string(),
                grade,
                city: "Berlin".to_string(),
                link: format!("https://hh.ru/vacancy/{page}{card}"),
                scraped_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            }
        }
    }

    #[async_trait]
    impl VacancySource for StubSource {
        async fn page_count(&self, _filter_text: &str) -> Result<u32, HarvestError> {
            if self.fail_probe {
                return Err(HarvestError::Fetch(FetchError::Status {
                    url: "https://hh.example/search".to_string(),
                    status: reqwest::StatusCode::BAD_GATEWAY,
                }));
            }
            Ok(self.pages)
        }

        async fn harvest_page(
            &self,
            _filter_text: &str,
            page: u32,
        ) -> Result<PageHarvest, FetchError> {
            if self.fail_pages.contains(&page) {
                return Err(FetchError::Status {
                    url: format!("https://hh.example/search?page={page}"),
                    status: reqwest::StatusCode::BAD_GATEWAY,
                });
            }
            Ok(PageHarvest {
                vacancies: vec![self.vacancy(page, 0), self.vacancy(page, 1)],
                skipped: 0,
            })
        }
    }

    fn pipeline() -> Pipeline {
        let mut config = AppConfig::default();
        config.pipeline.concurrency = 3;
        config.pipeline.max_retries = 0;
        config.pipeline.retry_base_ms = 1;
        Pipeline::new(config)
    }

    fn repo() -> Repository {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();
        repo
    }

    #[tokio::test]
    async fn full_run_persists_every_extracted_record() {
        let source = Arc::new(StubSource {
            pages: 3,
            fail_probe: false,
            fail_pages: vec![],
            sentinel_card: Some((1, 0)),
        });
        let repo = repo();

        let stats = pipeline().run_with(source, &repo, "rust").await.unwrap();

        assert_eq!(stats.pages_total, 3);
        assert_eq!(stats.pages_failed, 0);
        assert_eq!(stats.records_persisted, 6);

        let stored = repo.list_vacancies().unwrap();
        assert_eq!(stored.len(), 6);
        let with_sentinel = stored.iter().filter(|v| v.grade == GRADE_SENTINEL).count();
        assert_eq!(with_sentinel, 1);
    }

    #[tokio::test]
    async fn failed_probe_aborts_and_leaves_the_snapshot() {
        let repo = repo();
        repo.replace_all_vacancies(&[StubSource {
            pages: 0,
            fail_probe: false,
            fail_pages: vec![],
            sentinel_card: None,
        }
        .vacancy(9, 9)])
        .unwrap();

        let source = Arc::new(StubSource {
            pages: 3,
            fail_probe: true,
            fail_pages: vec![],
            sentinel_card: None,
        });

        let result = pipeline().run_with(source, &repo, "rust").await;
        assert!(result.is_err());

        // prior snapshot untouched
        let stored = repo.list_vacancies().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].title, "p9-c9");
    }

    #[tokio::test]
    async fn failed_page_lowers_the_harvest_but_not_the_run() {
        let source = Arc::new(StubSource {
            pages: 4,
            fail_probe: false,
            fail_pages: vec![2],
            sentinel_card: None,
        });
        let repo = repo();

        let stats = pipeline().run_with(source, &repo, "rust").await.unwrap();

        assert_eq!(stats.pages_total, 4);
        assert_eq!(stats.pages_failed, 1);
        assert_eq!(stats.records_persisted, 6);
        assert_eq!(repo.list_vacancies().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn rerunning_an_unchanged_source_is_idempotent() {
        let source = Arc::new(StubSource {
            pages: 2,
            fail_probe: false,
            fail_pages: vec![],
            sentinel_card: None,
        });
        let repo = repo();
        let pipeline = pipeline();

        pipeline
            .run_with(Arc::clone(&source) as Arc<dyn VacancySource>, &repo, "rust")
            .await
            .unwrap();
        let mut first = repo.list_vacancies().unwrap();

        pipeline
            .run_with(source, &repo, "rust")
            .await
            .unwrap();
        let mut second = repo.list_vacancies().unwrap();

        // record sets match ignoring ordering
        first.sort_by(|a, b| a.title.cmp(&b.title));
        second.sort_by(|a, b| a.title.cmp(&b.title));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn zero_pages_still_replaces_with_an_empty_snapshot() {
        let repo = repo();
        repo.replace_all_vacancies(&[StubSource {
            pages: 0,
            fail_probe: false,
            fail_pages: vec![],
            sentinel_card: None,
        }
        .vacancy(0, 0)])
        .unwrap();

        let source = Arc::new(StubSource {
            pages: 0,
            fail_probe: false,
            fail_pages: vec![],
            sentinel_card: None,
        });

        let stats = pipeline().run_with(source, &repo, "cobol").await.unwrap();
        assert_eq!(stats.records_persisted, 0);
        assert!(repo.list_vacancies().unwrap().is_empty());
    }
}
