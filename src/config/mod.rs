use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Vacancy search endpoint. Pages are addressed with `?text=…&page=N`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Filter applied when `scrape` is run without `--text`.
    #[serde(default = "default_filter_text")]
    pub default_filter_text: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Upper bound on simultaneously in-flight page fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_endpoint() -> String {
    "https://hh.ru/search/vacancy".to_string()
}
fn default_filter_text() -> String {
    "developer".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    700
}
fn default_jitter_ms() -> u64 {
    300
}
fn default_user_agent() -> String {
    "vacancy-harvester/0.1 (job market research)".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/vacancies.duckdb")
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    5
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("HH").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                endpoint: default_endpoint(),
                default_filter_text: default_filter_text(),
                timeout_secs: default_timeout_secs(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
                user_agent: default_user_agent(),
            },
            storage: StorageConfig {
                db_path: default_db_path(),
                run_migrations: true,
            },
            pipeline: PipelineConfig {
                concurrency: default_concurrency(),
                max_retries: default_max_retries(),
                retry_base_ms: default_retry_base_ms(),
            },
        }
    }
}
