use crate::config::ScraperConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use rand::RngExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Single GET, body as text. No retry here; the pipeline owns retry
    /// policy. A timeout surfaces as a transport error like any other.
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        self.polite_delay().await;
        debug!("GET {} {:?}", url, query);

        let resp = self
            .inner
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        resp.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: e,
        })
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        sleep(Duration::from_millis(self.config.request_delay_ms + jitter)).await;
    }
}
